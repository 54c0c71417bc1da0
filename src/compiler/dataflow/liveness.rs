//! Live variable analysis (backward, may)
//!
//! `IN[n] = (OUT[n] \ DEF[n]) ∪ USE[n]`, joined by union.

use super::{Analysis, DataflowResult, Direction};
use crate::compiler::cfg::ControlFlowGraph;
use crate::compiler::ir::{Instruction, Register};
use crate::error::Result;
use std::collections::BTreeSet;

/// Set of live register names
pub type LiveSet = BTreeSet<Register>;

/// Registers defined by `instr`
pub fn defs(instr: &Instruction) -> LiveSet {
    instr.def().cloned().into_iter().collect()
}

/// Registers read by `instr`
pub fn uses(instr: &Instruction) -> LiveSet {
    instr.uses().into_iter().cloned().collect()
}

/// Liveness over one CFG
pub struct Liveness<'a, 'c> {
    cfg: &'c ControlFlowGraph<'a>,
}

impl<'a, 'c> Liveness<'a, 'c> {
    /// Liveness problem for `cfg`
    pub fn new(cfg: &'c ControlFlowGraph<'a>) -> Self {
        Self { cfg }
    }

    /// Solve to the fixed point
    pub fn run(&self) -> Result<DataflowResult<LiveSet>> {
        super::solve(self.cfg, self)
    }
}

impl Analysis for Liveness<'_, '_> {
    type Value = LiveSet;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn initial(&self) -> LiveSet {
        LiveSet::new()
    }

    fn join(&self, a: &LiveSet, b: &LiveSet) -> Result<LiveSet> {
        Ok(a.union(b).cloned().collect())
    }

    fn transfer(&self, node: usize, out: &LiveSet) -> Result<LiveSet> {
        let instr = self.cfg.instruction(node);
        let mut live = out.clone();
        if let Some(def) = instr.def() {
            live.remove(def);
        }
        live.extend(instr.uses().into_iter().cloned());
        Ok(live)
    }
}
