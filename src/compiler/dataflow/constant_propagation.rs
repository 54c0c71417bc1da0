//! Constant propagation (forward, must)
//!
//! Each register maps to a flat lattice element:
//!
//! ```text
//!            Nac
//!     /   /   |   \   \
//!   ... C(-1) C(0) C(1) ...
//!     \   \   |   /   /
//!           Undef
//! ```
//!
//! Formal parameters (names without the `%` prefix) start at `Nac` because
//! their values come from the caller; every other register starts at `Undef`.

use super::{Analysis, DataflowResult, Direction};
use crate::compiler::cfg::ControlFlowGraph;
use crate::compiler::ir::{Instruction, Operand, Register};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Abstract value of one register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstValue {
    /// No information yet (bottom)
    Undef,
    /// Always this value
    Constant(i32),
    /// Not a constant (top)
    Nac,
}

impl ConstValue {
    /// Least upper bound
    pub fn join(self, other: ConstValue) -> ConstValue {
        match (self, other) {
            (ConstValue::Nac, _) | (_, ConstValue::Nac) => ConstValue::Nac,
            (ConstValue::Undef, x) | (x, ConstValue::Undef) => x,
            (ConstValue::Constant(a), ConstValue::Constant(b)) => {
                if a == b {
                    ConstValue::Constant(a)
                } else {
                    ConstValue::Nac
                }
            }
        }
    }

    /// The constant, if known
    pub fn as_constant(self) -> Option<i32> {
        match self {
            ConstValue::Constant(value) => Some(value),
            ConstValue::Undef | ConstValue::Nac => None,
        }
    }
}

/// Register → abstract value map at one program point.
///
/// Cloning shares the underlying map; the first write to a shared copy
/// copies it, so a stored IN/OUT never changes behind the solver's back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstState {
    values: Rc<BTreeMap<Register, ConstValue>>,
}

impl ConstState {
    /// State over `universe`, parameters at `Nac` and temporaries at `Undef`
    pub fn seeded(universe: &BTreeSet<Register>) -> Self {
        let values = universe
            .iter()
            .map(|reg| {
                let value = if reg.is_temporary() {
                    ConstValue::Undef
                } else {
                    ConstValue::Nac
                };
                (reg.clone(), value)
            })
            .collect();
        Self {
            values: Rc::new(values),
        }
    }

    /// Abstract value of `reg`
    pub fn get(&self, reg: &Register) -> Option<ConstValue> {
        self.values.get(reg).copied()
    }

    /// Overwrite the abstract value of `reg`
    pub fn set(&mut self, reg: Register, value: ConstValue) {
        Rc::make_mut(&mut self.values).insert(reg, value);
    }

    /// Abstract value of an operand; immediates are constants
    pub fn eval(&self, operand: &Operand) -> Result<ConstValue> {
        match operand {
            Operand::Imm(value) => Ok(ConstValue::Constant(*value)),
            Operand::Reg(reg) => self
                .get(reg)
                .ok_or_else(|| Error::lattice(format!("Cannot access value of {}", reg))),
        }
    }

    /// Registers tracked by this state
    pub fn registers(&self) -> impl Iterator<Item = &Register> {
        self.values.keys()
    }

    /// Pointwise join; both states must track the same registers
    pub fn join(&self, other: &ConstState) -> Result<ConstState> {
        if self.values.len() != other.values.len() {
            return Err(Error::lattice(format!(
                "cannot join states over {} and {} registers",
                self.values.len(),
                other.values.len()
            )));
        }
        let mut joined = BTreeMap::new();
        for (reg, value) in self.values.iter() {
            let Some(other_value) = other.values.get(reg) else {
                return Err(Error::lattice(format!("cannot find register {} to join", reg)));
            };
            joined.insert(reg.clone(), value.join(*other_value));
        }
        Ok(ConstState {
            values: Rc::new(joined),
        })
    }
}

/// Every register named in one instruction array (nested bodies excluded)
pub fn register_universe(code: &[Instruction]) -> BTreeSet<Register> {
    let mut universe = BTreeSet::new();
    for instr in code {
        universe.extend(instr.def().cloned());
        universe.extend(instr.uses().into_iter().cloned());
    }
    universe
}

/// Abstract binary operator evaluation; division by a constant zero is `Nac`
fn binary(op: crate::compiler::ir::BinaryOp, lhs: ConstValue, rhs: ConstValue) -> ConstValue {
    match (lhs, rhs) {
        (ConstValue::Nac, _) | (_, ConstValue::Nac) => ConstValue::Nac,
        (ConstValue::Undef, _) | (_, ConstValue::Undef) => ConstValue::Undef,
        (ConstValue::Constant(a), ConstValue::Constant(b)) => match op.apply(a, b) {
            Some(value) => ConstValue::Constant(value),
            None => ConstValue::Nac,
        },
    }
}

/// Constant propagation over one CFG
pub struct ConstantPropagation<'a, 'c> {
    cfg: &'c ControlFlowGraph<'a>,
    seed: ConstState,
}

impl<'a, 'c> ConstantPropagation<'a, 'c> {
    /// Constant propagation problem for `cfg`
    pub fn new(cfg: &'c ControlFlowGraph<'a>) -> Self {
        let seed = ConstState::seeded(&register_universe(cfg.code()));
        Self { cfg, seed }
    }

    /// Solve to the fixed point
    pub fn run(&self) -> Result<DataflowResult<ConstState>> {
        super::solve(self.cfg, self)
    }
}

impl Analysis for ConstantPropagation<'_, '_> {
    type Value = ConstState;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn initial(&self) -> ConstState {
        self.seed.clone()
    }

    fn join(&self, a: &ConstState, b: &ConstState) -> Result<ConstState> {
        a.join(b)
    }

    fn transfer(&self, node: usize, input: &ConstState) -> Result<ConstState> {
        let mut state = input.clone();
        match self.cfg.instruction(node) {
            Instruction::Alloc { dest, .. }
            | Instruction::LoadByte { dest, .. }
            | Instruction::LoadWord { dest, .. }
            | Instruction::Call { dest, .. } => {
                state.set(dest.clone(), ConstValue::Nac);
            }
            Instruction::Set { dest, src: value }
            | Instruction::Print {
                dest,
                operand: value,
            } => {
                let value = input.eval(value)?;
                state.set(dest.clone(), value);
            }
            Instruction::BinOp { dest, op, lhs, rhs } => {
                let value = binary(*op, input.eval(lhs)?, input.eval(rhs)?);
                state.set(dest.clone(), value);
            }
            Instruction::UnOp { dest, op, operand } => {
                let value = match input.eval(operand)? {
                    ConstValue::Constant(v) => ConstValue::Constant(op.apply(v)),
                    other => other,
                };
                state.set(dest.clone(), value);
            }
            Instruction::StoreByte { .. }
            | Instruction::StoreWord { .. }
            | Instruction::Label(_)
            | Instruction::Goto(_)
            | Instruction::GotoT { .. }
            | Instruction::GotoF { .. }
            | Instruction::Ret(_)
            | Instruction::FnDecl(_)
            | Instruction::Halt => {}
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{BinaryOp, JumpTarget};

    fn reg(name: &str) -> Register {
        Register::from(name)
    }

    #[test]
    fn test_join_table() {
        use ConstValue::*;
        assert_eq!(Undef.join(Constant(3)), Constant(3));
        assert_eq!(Constant(3).join(Undef), Constant(3));
        assert_eq!(Constant(3).join(Constant(3)), Constant(3));
        assert_eq!(Constant(3).join(Constant(4)), Nac);
        assert_eq!(Nac.join(Undef), Nac);
        assert_eq!(Undef.join(Undef), Undef);
    }

    #[test]
    fn test_state_join_rejects_mismatched_universe() {
        let a = ConstState::seeded(&[reg("%r0")].into_iter().collect());
        let b = ConstState::seeded(&[reg("%r1")].into_iter().collect());
        assert!(matches!(a.join(&b), Err(Error::Lattice { .. })));
    }

    #[test]
    fn test_straight_line_folding_values() {
        let code = vec![
            Instruction::Set {
                dest: reg("%r0"),
                src: Operand::Imm(2),
            },
            Instruction::BinOp {
                dest: reg("%r1"),
                op: BinaryOp::Mul,
                lhs: Operand::reg("%r0"),
                rhs: Operand::Imm(21),
            },
            Instruction::BinOp {
                dest: reg("%r2"),
                op: BinaryOp::Add,
                lhs: Operand::reg("%r1"),
                rhs: Operand::reg("n"),
            },
            Instruction::Ret(Operand::reg("%r2")),
        ];
        let cfg = ControlFlowGraph::build(&code).unwrap();
        let result = ConstantPropagation::new(&cfg).run().unwrap();

        assert_eq!(result.ins[0].get(&reg("n")), Some(ConstValue::Nac));
        assert_eq!(result.ins[0].get(&reg("%r0")), Some(ConstValue::Undef));
        assert_eq!(result.outs[1].get(&reg("%r1")), Some(ConstValue::Constant(42)));
        assert_eq!(result.outs[2].get(&reg("%r2")), Some(ConstValue::Nac));
    }

    #[test]
    fn test_loop_counter_becomes_nac() {
        // 0: %r0 = 0
        // 1: label top
        // 2: %r1 = %r0 < 5
        // 3: $if not %r1 goto done
        // 4: %r0 = %r0 + 1
        // 5: goto top
        // 6: label done
        // 7: %r2 = 7
        // 8: halt
        let code = vec![
            Instruction::Set {
                dest: reg("%r0"),
                src: Operand::Imm(0),
            },
            Instruction::Label("top".into()),
            Instruction::BinOp {
                dest: reg("%r1"),
                op: BinaryOp::Lt,
                lhs: Operand::reg("%r0"),
                rhs: Operand::Imm(5),
            },
            Instruction::GotoF {
                cond: Operand::reg("%r1"),
                target: JumpTarget::label("done"),
            },
            Instruction::BinOp {
                dest: reg("%r0"),
                op: BinaryOp::Add,
                lhs: Operand::reg("%r0"),
                rhs: Operand::Imm(1),
            },
            Instruction::Goto(JumpTarget::label("top")),
            Instruction::Label("done".into()),
            Instruction::Set {
                dest: reg("%r2"),
                src: Operand::Imm(7),
            },
            Instruction::Halt,
        ];
        let cfg = ControlFlowGraph::build(&code).unwrap();
        let result = ConstantPropagation::new(&cfg).run().unwrap();

        assert_eq!(result.ins[2].get(&reg("%r0")), Some(ConstValue::Nac));
        assert_eq!(result.outs[7].get(&reg("%r2")), Some(ConstValue::Constant(7)));
    }

    #[test]
    fn test_division_by_zero_is_not_folded() {
        let code = vec![Instruction::BinOp {
            dest: reg("%r0"),
            op: BinaryOp::Div,
            lhs: Operand::Imm(1),
            rhs: Operand::Imm(0),
        }];
        let cfg = ControlFlowGraph::build(&code).unwrap();
        let result = ConstantPropagation::new(&cfg).run().unwrap();
        assert_eq!(result.outs[0].get(&reg("%r0")), Some(ConstValue::Nac));
    }
}
