//! Runtime execution of label-resolved IR

mod environment;
mod executor;
pub mod memory;

pub use environment::{CallStack, CodeAddr, Environment};
pub use executor::{ExecOptions, ExecState, Executor};
pub use memory::{Memory, MemoryError};
