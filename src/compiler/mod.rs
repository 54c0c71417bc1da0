//! # IR Compiler Pipeline
//!
//! Optimizes translator-produced IR and prepares it for execution.
//!
//! ## Architecture
//!
//! ```text
//! IR (labels) → Optimize → Resolve labels → Registry → Program
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use regir::compiler::{compile, CompileOptions};
//! use regir::runtime::ExecOptions;
//!
//! let program = compile(&code, &CompileOptions::default())?;
//! let printed = program.run_collect(&ExecOptions::default())?;
//! ```

pub mod cfg;
pub mod dataflow;
pub mod ir;
pub mod label_resolver;
pub mod optimizer;

pub use cfg::ControlFlowGraph;
pub use dataflow::{Analysis, DataflowResult, Direction};
pub use ir::{FunctionRegistry, Instruction};
pub use label_resolver::resolve_labels;
pub use optimizer::Optimizer;

use crate::error::Result;
use crate::runtime::{ExecOptions, Executor};

/// Compilation options
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Optimization level (0-2)
    pub opt_level: u8,
    /// Cap on optimizer driver iterations; `None` runs to convergence
    pub max_iterations: Option<usize>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: 2,
            max_iterations: None,
        }
    }
}

/// Optimized, label-resolved code with its function registry
#[derive(Debug, Clone)]
pub struct Program {
    /// Top-level instructions; every jump target is an index
    pub code: Vec<Instruction>,
    /// All function declarations, nested ones included
    pub registry: FunctionRegistry,
}

impl Program {
    /// Resolve labels in already optimized code and build the registry
    pub fn from_optimized(mut code: Vec<Instruction>) -> Result<Self> {
        resolve_labels(&mut code)?;
        let registry = FunctionRegistry::build(&code)?;
        Ok(Self { code, registry })
    }

    /// Executor over this program, not yet started
    pub fn executor(&self) -> Executor<'_> {
        Executor::new(&self.code, &self.registry)
    }

    /// Run to `halt`, handing every printed value to `on_print`
    pub fn run<'p>(&'p self, options: &ExecOptions, on_print: impl FnMut(&str) + 'p) -> Result<()> {
        self.executor()
            .with_options(options.clone())
            .with_output(on_print)
            .execute()
    }

    /// Run to `halt` and return the printed values in order
    pub fn run_collect(&self, options: &ExecOptions) -> Result<Vec<String>> {
        let mut printed = Vec::new();
        self.run(options, |value| printed.push(value.to_string()))?;
        Ok(printed)
    }
}

/// Optimize `code`, resolve its labels and build the function registry
pub fn compile(code: &[Instruction], options: &CompileOptions) -> Result<Program> {
    let mut optimizer = Optimizer::new(options.opt_level);
    if let Some(limit) = options.max_iterations {
        optimizer = optimizer.with_max_iterations(limit);
    }

    let optimized = optimizer.optimize(code)?;
    tracing::debug!(
        before = code.len(),
        after = optimized.len(),
        opt_level = options.opt_level,
        "optimized top-level code"
    );
    Program::from_optimized(optimized)
}
