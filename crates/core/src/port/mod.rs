// Port Layer - Interfaces for external dependencies

pub mod instrumentation;
pub mod message_handler;
pub mod process_locator;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use instrumentation::{
    AttachError, DetachError, ExportProbe, InjectError, InjectedSession, InstrumentationRuntime,
};
pub use message_handler::MessageHandler;
pub use process_locator::{select_target, ProcessInfo, ProcessLocator};
pub use time_provider::TimeProvider;
