// Panic isolation for message callbacks
// A panicking handler must not unwind into the runtime's delivery loop.
use std::any::Any;
use std::panic::{catch_unwind, UnwindSafe};
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed successfully
    Success(T),
    /// Execution panicked
    Panicked(String),
}

impl<T> PanicGuardResult<T> {
    pub fn is_panicked(&self) -> bool {
        matches!(self, PanicGuardResult::Panicked(_))
    }
}

/// Execute a closure with panic isolation
///
/// If the closure panics, the panic is caught and returned as
/// `PanicGuardResult::Panicked`.
///
/// # Example
/// ```text
/// let result = execute_guarded(AssertUnwindSafe(|| sink.handle(raw)));
/// if let PanicGuardResult::Panicked(msg) = result {
///     eprintln!("handler panicked: {}", msg);
/// }
/// ```
pub fn execute_guarded<F, T>(f: F) -> PanicGuardResult<T>
where
    F: FnOnce() -> T + UnwindSafe,
{
    catch_unwind(f).map_or_else(
        |payload| {
            let msg = panic_message(payload.as_ref());
            error!(panic_msg = %msg, "Message handler panicked");
            PanicGuardResult::Panicked(msg)
        },
        PanicGuardResult::Success,
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_passes_value_through() {
        match execute_guarded(|| 7) {
            PanicGuardResult::Success(v) => assert_eq!(v, 7),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_panic_is_caught() {
        let result = execute_guarded(|| -> () { panic!("bad payload") });
        match result {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "bad payload"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_formatted_panic_is_caught() {
        let code = 42;
        let result = execute_guarded(move || -> () { panic!("code {}", code) });
        assert!(result.is_panicked());
    }
}
