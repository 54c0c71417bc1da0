//! # Dataflow Framework
//!
//! Generic round-robin fixed-point solver over a [`ControlFlowGraph`].
//!
//! An analysis supplies a direction, an initial (bottom) value, a join and a
//! per-node transfer function. Every node's IN and OUT start at the initial
//! value; the solver then sweeps all nodes (highest index first for backward
//! analyses, lowest first for forward ones) until a full sweep changes
//! nothing. Termination relies on finite lattice height and monotone
//! join/transfer functions.
//!
//! ```text
//! backward:  OUT[n] = ⊔ IN[s]  for s in succ(n);   IN[n]  = transfer(n, OUT[n])
//! forward:   IN[n]  = ⊔ OUT[p] for p in pred(n);   OUT[n] = transfer(n, IN[n])
//! ```
//!
//! A node without neighbours in the flow direction (entry for forward,
//! `Halt`/`Ret` for backward) receives the initial value as its boundary.
//! The forward entry node joins the initial value even when a back edge
//! reaches it.

pub mod constant_propagation;
pub mod liveness;

pub use constant_propagation::{ConstState, ConstValue, ConstantPropagation};
pub use liveness::{LiveSet, Liveness};

use super::cfg::ControlFlowGraph;
use crate::error::{Error, Result};

/// Direction of information flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From predecessors to successors
    Forward,
    /// From successors to predecessors
    Backward,
}

/// A dataflow problem over one CFG
pub trait Analysis {
    /// Lattice element stored per node
    type Value: Clone + PartialEq;

    /// Direction of the analysis
    fn direction(&self) -> Direction;

    /// Initial value of every IN/OUT, also used as the boundary input
    fn initial(&self) -> Self::Value;

    /// Least upper bound of two lattice elements
    fn join(&self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value>;

    /// Node transfer function: input value at `node` to output value
    fn transfer(&self, node: usize, input: &Self::Value) -> Result<Self::Value>;
}

/// Converged IN/OUT values, one per CFG node
#[derive(Debug, Clone, PartialEq)]
pub struct DataflowResult<V> {
    /// Value before each node (in program order)
    pub ins: Vec<V>,
    /// Value after each node (in program order)
    pub outs: Vec<V>,
    /// Number of full sweeps until nothing changed
    pub sweeps: usize,
}

/// Run `analysis` over `cfg` to its fixed point
pub fn solve<A: Analysis>(cfg: &ControlFlowGraph<'_>, analysis: &A) -> Result<DataflowResult<A::Value>> {
    let seed = DataflowResult {
        ins: vec![analysis.initial(); cfg.len()],
        outs: vec![analysis.initial(); cfg.len()],
        sweeps: 0,
    };
    solve_from(cfg, analysis, seed)
}

/// Continue solving from `seed` instead of the initial values
///
/// Seeding with a converged result of the same analysis finishes after one
/// sweep and returns the same IN/OUT values. `seed` must hold one value per
/// node; `sweeps` of the result counts only the sweeps run here.
pub fn solve_from<A: Analysis>(
    cfg: &ControlFlowGraph<'_>,
    analysis: &A,
    seed: DataflowResult<A::Value>,
) -> Result<DataflowResult<A::Value>> {
    let direction = analysis.direction();
    let DataflowResult { mut ins, mut outs, .. } = seed;
    if ins.len() != cfg.len() || outs.len() != cfg.len() {
        return Err(Error::lattice(format!(
            "Seed holds {}/{} values for a graph of {} nodes",
            ins.len(),
            outs.len(),
            cfg.len()
        )));
    }
    let mut sweeps = 0;

    loop {
        sweeps += 1;
        let mut changed = false;

        match direction {
            Direction::Backward => {
                for node in (0..cfg.len()).rev() {
                    let out = merge(analysis, cfg.successors(node), &ins)?;
                    let input = analysis.transfer(node, &out)?;
                    changed |= out != outs[node] || input != ins[node];
                    outs[node] = out;
                    ins[node] = input;
                }
            }
            Direction::Forward => {
                for node in 0..cfg.len() {
                    let mut input = merge(analysis, cfg.predecessors(node), &outs)?;
                    if node == 0 && !cfg.predecessors(node).is_empty() {
                        // Entry is also a loop head
                        input = analysis.join(&analysis.initial(), &input)?;
                    }
                    let out = analysis.transfer(node, &input)?;
                    changed |= input != ins[node] || out != outs[node];
                    ins[node] = input;
                    outs[node] = out;
                }
            }
        }

        tracing::trace!(?direction, sweep = sweeps, changed, "dataflow sweep");
        if !changed {
            break;
        }
    }

    Ok(DataflowResult { ins, outs, sweeps })
}

/// Join of `values[n]` over `neighbours`, or the boundary value if there are none
fn merge<A: Analysis>(analysis: &A, neighbours: &[usize], values: &[A::Value]) -> Result<A::Value> {
    let mut iter = neighbours.iter();
    let Some(&first) = iter.next() else {
        return Ok(analysis.initial());
    };
    let mut acc = values[first].clone();
    for &n in iter {
        acc = analysis.join(&acc, &values[n])?;
    }
    Ok(acc)
}

/// Closure-backed analysis used by [`solve_with`]
struct FnAnalysis<V, J, T> {
    direction: Direction,
    initial: V,
    join: J,
    transfer: T,
}

impl<V, J, T> Analysis for FnAnalysis<V, J, T>
where
    V: Clone + PartialEq,
    J: Fn(&V, &V) -> Result<V>,
    T: Fn(usize, &V) -> Result<V>,
{
    type Value = V;

    fn direction(&self) -> Direction {
        self.direction
    }

    fn initial(&self) -> V {
        self.initial.clone()
    }

    fn join(&self, a: &V, b: &V) -> Result<V> {
        (self.join)(a, b)
    }

    fn transfer(&self, node: usize, input: &V) -> Result<V> {
        (self.transfer)(node, input)
    }
}

/// Run an ad-hoc analysis given as a direction, a bottom value and closures
pub fn solve_with<V, J, T>(
    cfg: &ControlFlowGraph<'_>,
    direction: Direction,
    bottom: V,
    join: J,
    transfer: T,
) -> Result<DataflowResult<V>>
where
    V: Clone + PartialEq,
    J: Fn(&V, &V) -> Result<V>,
    T: Fn(usize, &V) -> Result<V>,
{
    let analysis = FnAnalysis {
        direction,
        initial: bottom,
        join,
        transfer,
    };
    solve(cfg, &analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{Instruction, JumpTarget, Operand, Register};

    /// Forward reachability: true once control can reach the node from entry
    #[test]
    fn test_solve_with_reachability() {
        let code = vec![
            Instruction::Goto(JumpTarget::label("end")),
            Instruction::Set {
                dest: Register::from("%r0"),
                src: Operand::Imm(1),
            },
            Instruction::Label("end".into()),
            Instruction::Halt,
        ];
        let cfg = ControlFlowGraph::build(&code).unwrap();
        let result = solve_with(
            &cfg,
            Direction::Forward,
            false,
            |a: &bool, b: &bool| Ok(*a || *b),
            |node, input: &bool| Ok(node == 0 || *input),
        )
        .unwrap();

        assert_eq!(result.outs, vec![true, false, true, true]);
    }

    /// Backward distance-to-halt count saturating at a small bound
    #[test]
    fn test_backward_sweeps_terminate() {
        let code = vec![
            Instruction::Label("l".into()),
            Instruction::GotoT {
                cond: Operand::reg("c"),
                target: JumpTarget::label("l"),
            },
            Instruction::Halt,
        ];
        let cfg = ControlFlowGraph::build(&code).unwrap();
        let result = solve_with(
            &cfg,
            Direction::Backward,
            0u32,
            |a: &u32, b: &u32| Ok(*a.max(b)),
            |_, input: &u32| Ok((*input + 1).min(5)),
        )
        .unwrap();

        assert_eq!(result.ins[2], 1);
        assert_eq!(result.ins[0], 5);
        assert!(result.sweeps >= 2);
    }

    #[test]
    fn test_converged_seed_needs_one_sweep() {
        let code = vec![
            Instruction::Label("l".into()),
            Instruction::GotoT {
                cond: Operand::reg("c"),
                target: JumpTarget::label("l"),
            },
            Instruction::Halt,
        ];
        let cfg = ControlFlowGraph::build(&code).unwrap();
        let analysis = FnAnalysis {
            direction: Direction::Backward,
            initial: 0u32,
            join: |a: &u32, b: &u32| -> Result<u32> { Ok(*a.max(b)) },
            transfer: |_: usize, input: &u32| -> Result<u32> { Ok((*input + 1).min(5)) },
        };
        let first = solve(&cfg, &analysis).unwrap();
        let again = solve_from(&cfg, &analysis, first.clone()).unwrap();

        assert_eq!(again.sweeps, 1);
        assert_eq!(again.ins, first.ins);
        assert_eq!(again.outs, first.outs);

        let short = DataflowResult {
            ins: vec![0],
            outs: vec![0],
            sweeps: 0,
        };
        assert!(matches!(
            solve_from(&cfg, &analysis, short),
            Err(Error::Lattice { .. })
        ));
    }
}
