// UI and formatting module

pub mod formatters;

// Re-export commonly used items for cleaner imports
pub use formatters::{print_devices, print_failure, print_outcome, print_report};
