//! # Register IR
//!
//! Three-address instructions over named virtual registers, with explicit
//! labels and jumps. One `Vec<Instruction>` is one instruction stream: the
//! top-level program, or the body of a `FnDecl`, which may nest further
//! declarations.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── instruction.rs  # Register, Operand, operators, JumpTarget, Instruction
//! ├── names.rs        # NameGen (fresh %rN / .LN names)
//! ├── printer.rs      # Display impls and display_instructions
//! └── program.rs      # FunctionRegistry
//! ```
//!
//! ## Lifecycle
//!
//! The translator emits symbolic labels. Optimization passes replace arrays
//! wholesale; label resolution rewrites targets to indices in place; the
//! executor only reads.

mod instruction;
mod names;
mod printer;
mod program;

pub use instruction::{
    BinaryOp, FnDecl, Instruction, JumpTarget, Operand, Register, UnaryOp, TEMP_PREFIX,
};
pub use names::NameGen;
pub use printer::display_instructions;
pub use program::FunctionRegistry;
