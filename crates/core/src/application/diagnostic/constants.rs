// Diagnostic constants (ADR: No magic values)

/// Process exit status for a completed run (including the no-op path)
pub const EXIT_SUCCESS: u8 = 0;

/// Process exit status for any failed run
pub const EXIT_FAILURE: u8 = 2;

/// Default message collection window (seconds)
pub const DEFAULT_WAIT_SECS: f64 = 3.0;

/// Default target executable
pub const DEFAULT_PROCESS_NAME: &str = "QQMusic.exe";

/// Default script location, relative to the working directory
pub const DEFAULT_SCRIPT_PATH: &str = "hook_qq_music.js";
