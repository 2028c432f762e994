// Domain Layer - Pure message and stage types

pub mod error;
pub mod message;
pub mod stage;
pub mod tally;

// Re-exports
pub use error::DomainError;
pub use message::{MessageKind, ScriptMessage};
pub use stage::{Stage, StageReport};
pub use tally::{StageTally, Verdict};
