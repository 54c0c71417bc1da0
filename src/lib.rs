//! # regir - Register IR Optimizer and Executor
//!
//! Optimization and execution engine for a three-address register IR
//! produced by a small C-like front end.
//!
//! ## Features
//!
//! - **Control flow graphs** over flat instruction arrays
//! - **Generic dataflow solver** with liveness and constant propagation
//! - **Optimizer** iterating slot promotion, dead code elimination and
//!   constant/branch folding to a fixed point, nested functions included
//! - **Stack-machine executor** with byte-addressable memory and calls
//!
//! ## Quick Start
//!
//! ```rust
//! use regir::compiler::ir::{BinaryOp, Instruction, NameGen, Operand};
//! use regir::compiler::{compile, CompileOptions};
//! use regir::runtime::ExecOptions;
//!
//! # fn main() -> regir::Result<()> {
//! let mut names = NameGen::new();
//! let (x, y, sum, out) = (
//!     names.fresh_reg(),
//!     names.fresh_reg(),
//!     names.fresh_reg(),
//!     names.fresh_reg(),
//! );
//! let code = vec![
//!     Instruction::Set { dest: x.clone(), src: Operand::Imm(2) },
//!     Instruction::Set { dest: y.clone(), src: Operand::Imm(3) },
//!     Instruction::BinOp { dest: sum.clone(), op: BinaryOp::Add, lhs: x.into(), rhs: y.into() },
//!     Instruction::Print { dest: out, operand: sum.into() },
//!     Instruction::Halt,
//! ];
//!
//! let program = compile(&code, &CompileOptions::default())?;
//! assert_eq!(program.run_collect(&ExecOptions::default())?, vec!["5"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! IR → CFG → Dataflow → Optimizer ⟲ → Label resolver → Executor
//! ```
//!
//! ### Main Components
//!
//! - [`compiler::ir`] - Instruction set, printer and function registry
//! - [`compiler::cfg`] - Successor and predecessor maps
//! - [`compiler::dataflow`] - Fixed-point solver and its two analyses
//! - [`compiler::optimizer`] - Pass driver
//! - [`runtime`] - Memory model and executor
//!
//! The crate emits [`tracing`] events and never installs a subscriber.

#![allow(clippy::needless_range_loop)] // Index needed for error messages

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod error;
pub mod runtime;

pub use compiler::{compile, CompileOptions, Program};
pub use error::{Error, ErrorSeverity, Result};
pub use runtime::{ExecOptions, ExecState, Executor};
