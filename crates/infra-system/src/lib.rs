// scriptprobe Infrastructure - System Adapters
// Implements: ProcessLocator (sysinfo), InstrumentationRuntime (frida-inject)

pub mod frida_inject_runtime;
pub mod process_locator_impl;

pub use frida_inject_runtime::{FridaInjectConfig, FridaInjectRuntime};
pub use process_locator_impl::SysinfoProcessLocator;
