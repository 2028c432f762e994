// Application Layer - Use Cases

pub mod diagnostic;
pub mod gate;
pub mod panic_guard;
pub mod sink;
pub mod wrapper;

// Re-exports
pub use diagnostic::{
    DiagnosticError, DiagnosticReport, DiagnosticRequest, DiagnosticRunner,
};
pub use gate::MessageGate;
pub use sink::LoggingSink;
pub use wrapper::ScriptWrapper;
