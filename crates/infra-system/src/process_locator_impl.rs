// Process locator implementation
// reason: sysinfo for cross-platform process enumeration
use std::sync::Mutex;
use sysinfo::System;
use tracing::debug;

use scriptprobe_core::port::process_locator::{ProcessInfo, ProcessLocator};

/// Process locator backed by sysinfo
///
/// The process table is refreshed on every lookup.
pub struct SysinfoProcessLocator {
    system: Mutex<System>,
}

impl SysinfoProcessLocator {
    /// Create a new locator
    ///
    /// # Example
    /// ```ignore
    /// let locator = SysinfoProcessLocator::new();
    /// let matches = locator.find_by_name("QQMusic.exe");
    /// ```
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProcessLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Executable names are case-insensitive on Windows only
fn name_matches(candidate: &str, wanted: &str) -> bool {
    if cfg!(windows) {
        candidate.eq_ignore_ascii_case(wanted)
    } else {
        candidate == wanted
    }
}

impl ProcessLocator for SysinfoProcessLocator {
    fn find_by_name(&self, name: &str) -> Vec<ProcessInfo> {
        let mut sys = match self.system.lock() {
            Ok(sys) => sys,
            Err(poisoned) => poisoned.into_inner(),
        };

        sys.refresh_processes();

        let mut matches: Vec<ProcessInfo> = sys
            .processes()
            .values()
            .filter(|p| name_matches(p.name(), name))
            .map(|p| ProcessInfo {
                pid: p.pid().as_u32(),
                name: p.name().to_string(),
            })
            .collect();
        matches.sort_by_key(|p| p.pid);

        debug!(
            name = %name,
            matches = matches.len(),
            "Process lookup completed"
        );

        matches
    }
}
