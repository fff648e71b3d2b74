// Platform-specific code module

pub mod gpu;
pub mod process;

// Re-exports para imports limpios
pub use gpu::{query_for, NvidiaSmiQuery, NvmlQuery};
pub use process::{exit_code_of, ProcessWorkload};
