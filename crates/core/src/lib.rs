pub mod error;
pub mod evidence_ref;
pub mod severity;
pub mod signals;
pub mod violation_event;
pub mod violation_kind;

pub use error::{ErrorCode, ErrorReport};
pub use evidence_ref::EvidenceRef;
pub use severity::Severity;
pub use signals::{AudioSignals, FrameSignals};
pub use violation_event::{ViolationEvent, ViolationTally};
pub use violation_kind::{Modality, ViolationKind};
