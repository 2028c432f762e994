// Process Locator Port
// Resolves a process name to running process ids

/// A running process matching a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Process lookup by name
pub trait ProcessLocator: Send + Sync {
    /// Find all running processes whose name matches `name`
    ///
    /// Returns an empty vector when nothing matches.
    fn find_by_name(&self, name: &str) -> Vec<ProcessInfo>;
}

/// Pick the attach target among several matches
///
/// The lowest pid wins: on platforms that list threads alongside processes
/// the owning process always has the smallest id.
pub fn select_target(matches: &[ProcessInfo]) -> Option<&ProcessInfo> {
    matches.iter().min_by_key(|p| p.pid)
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Fixed process table
    pub struct MockProcessLocator {
        processes: Vec<ProcessInfo>,
    }

    impl MockProcessLocator {
        pub fn new(processes: Vec<ProcessInfo>) -> Self {
            Self { processes }
        }

        pub fn empty() -> Self {
            Self::new(Vec::new())
        }

        pub fn single(name: impl Into<String>, pid: u32) -> Self {
            Self::new(vec![ProcessInfo {
                pid,
                name: name.into(),
            }])
        }
    }

    impl ProcessLocator for MockProcessLocator {
        fn find_by_name(&self, name: &str) -> Vec<ProcessInfo> {
            self.processes
                .iter()
                .filter(|p| p.name == name)
                .cloned()
                .collect()
        }
    }
}
