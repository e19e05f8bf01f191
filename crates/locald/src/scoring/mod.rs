// locald/scoring/mod.rs
// Cheating score derived from a session's violation log

pub mod cheating_score;

pub use cheating_score::CheatingScorer;
