//! # IR Optimizer
//!
//! Optimization passes over one instruction array, driven by the dataflow
//! analyses:
//! - Slot promotion (non-escaping `alloc` slots become registers)
//! - Dead code elimination (liveness)
//! - Constant folding and branch simplification (constant propagation)
//!
//! The driver runs the passes in that order and repeats the whole sequence
//! until an iteration returns the array it was given. Nested function
//! bodies are optimized as self-contained arrays first. Every pass returns
//! a new array; the input is never patched.

use super::cfg::ControlFlowGraph;
use super::dataflow::{ConstValue, ConstantPropagation, Liveness};
use super::ir::{FnDecl, Instruction, Operand, Register};
use crate::error::Result;
use std::collections::HashSet;

/// Optimizer with configurable optimization level
#[derive(Debug, Clone)]
pub struct Optimizer {
    level: u8,
    max_iterations: Option<usize>,
}

impl Optimizer {
    /// Create a new optimizer with the specified optimization level (0-2)
    ///
    /// Level 0 leaves code untouched, level 1 promotes slots and removes
    /// dead code, level 2 also folds constants and branches.
    pub fn new(level: u8) -> Self {
        Self {
            level,
            max_iterations: None,
        }
    }

    /// Stop after `limit` driver iterations even if not converged
    pub fn with_max_iterations(mut self, limit: usize) -> Self {
        self.max_iterations = Some(limit);
        self
    }

    /// Optimization level
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Optimize `code` and all nested function bodies to a fixed point
    pub fn optimize(&self, code: &[Instruction]) -> Result<Vec<Instruction>> {
        if self.level == 0 {
            return Ok(code.to_vec());
        }

        let mut current = self.optimize_nested(code)?;
        let mut iteration = 0;

        loop {
            iteration += 1;
            let next = self.run_passes(&current)?;
            tracing::debug!(
                iteration,
                before = current.len(),
                after = next.len(),
                "optimizer iteration"
            );

            if next == current {
                tracing::debug!(iteration, "optimizer converged");
                return Ok(next);
            }
            current = next;

            if self.max_iterations.is_some_and(|limit| iteration >= limit) {
                tracing::warn!(iteration, "optimizer stopped before reaching a fixed point");
                return Ok(current);
            }
        }
    }

    /// One pass sequence over a single array
    fn run_passes(&self, code: &[Instruction]) -> Result<Vec<Instruction>> {
        let code = promote_slots(code);
        let code = eliminate_dead_code(&code)?;
        if self.level >= 2 {
            fold_constants(&code)
        } else {
            Ok(code)
        }
    }

    /// Replace every `FnDecl` body with its optimized form
    fn optimize_nested(&self, code: &[Instruction]) -> Result<Vec<Instruction>> {
        code.iter()
            .map(|instr| match instr {
                Instruction::FnDecl(decl) => Ok(Instruction::FnDecl(FnDecl {
                    name: decl.name.clone(),
                    params: decl.params.clone(),
                    body: self.optimize(&decl.body)?,
                })),
                other => Ok(other.clone()),
            })
            .collect()
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Slots whose address never escapes: `alloc` destinations that appear
/// nowhere except as the address of a load or store and are defined only by
/// their `alloc`
pub fn promotable_slots(code: &[Instruction]) -> HashSet<Register> {
    let mut slots: HashSet<Register> = code
        .iter()
        .filter_map(|instr| match instr {
            Instruction::Alloc { dest, .. } => Some(dest.clone()),
            _ => None,
        })
        .collect();

    for instr in code {
        match instr {
            // The address operand of a memory access is not an escape
            Instruction::LoadByte { dest, .. } | Instruction::LoadWord { dest, .. } => {
                slots.remove(dest);
            }
            Instruction::StoreByte { src, .. } | Instruction::StoreWord { src, .. } => {
                if let Some(reg) = src.as_register() {
                    slots.remove(reg);
                }
            }
            Instruction::Alloc { size, .. } => {
                if let Some(reg) = size.as_register() {
                    slots.remove(reg);
                }
            }
            other => {
                if let Some(dest) = other.def() {
                    slots.remove(dest);
                }
                for reg in other.uses() {
                    slots.remove(reg);
                }
            }
        }
    }

    slots
}

/// Slot promotion: turn loads and stores of promotable slots into register
/// copies
///
/// A promoted `alloc` becomes `slot = 0`, matching the zero-filled memory a
/// load before the first store would have read. Dead code elimination drops
/// it when a store comes first.
pub fn promote_slots(code: &[Instruction]) -> Vec<Instruction> {
    let slots = promotable_slots(code);
    let mut promoted = Vec::with_capacity(code.len());

    for instr in code {
        match instr {
            Instruction::Alloc { dest, .. } if slots.contains(dest) => {
                promoted.push(Instruction::Set {
                    dest: dest.clone(),
                    src: Operand::Imm(0),
                });
            }
            Instruction::StoreByte { src, addr } | Instruction::StoreWord { src, addr }
                if slots.contains(addr) =>
            {
                promoted.push(Instruction::Set {
                    dest: addr.clone(),
                    src: src.clone(),
                });
            }
            Instruction::LoadByte { dest, addr } | Instruction::LoadWord { dest, addr }
                if slots.contains(addr) =>
            {
                promoted.push(Instruction::Set {
                    dest: dest.clone(),
                    src: Operand::Reg(addr.clone()),
                });
            }
            other => promoted.push(other.clone()),
        }
    }

    promoted
}

/// Dead code elimination: drop definitions whose register is not live
/// afterwards. `Print` and `Call` always stay.
pub fn eliminate_dead_code(code: &[Instruction]) -> Result<Vec<Instruction>> {
    let cfg = ControlFlowGraph::build(code)?;
    let liveness = Liveness::new(&cfg).run()?;

    Ok(code
        .iter()
        .zip(&liveness.outs)
        .filter(|(instr, live_out)| match instr {
            Instruction::Print { .. } | Instruction::Call { .. } => true,
            other => other.def().map_or(true, |dest| live_out.contains(dest)),
        })
        .map(|(instr, _)| instr.clone())
        .collect())
}

/// Constant folding and branch simplification
///
/// Register operands known constant on entry become immediates; register
/// computations with a constant result become `Set`s; conditional branches
/// on a known condition become a `Goto` or disappear.
pub fn fold_constants(code: &[Instruction]) -> Result<Vec<Instruction>> {
    let cfg = ControlFlowGraph::build(code)?;
    let constants = ConstantPropagation::new(&cfg).run()?;
    let mut folded = Vec::with_capacity(code.len());

    for (node, instr) in code.iter().enumerate() {
        let state_in = &constants.ins[node];
        let state_out = &constants.outs[node];

        let instr = instr.map_operands(|operand| match operand {
            Operand::Reg(reg) => match state_in.get(reg) {
                Some(ConstValue::Constant(value)) => Operand::Imm(value),
                _ => operand.clone(),
            },
            Operand::Imm(_) => operand.clone(),
        });

        let known = match &instr {
            Instruction::Set { dest, .. }
            | Instruction::BinOp { dest, .. }
            | Instruction::UnOp { dest, .. } => state_out
                .get(dest)
                .and_then(ConstValue::as_constant)
                .map(|value| (dest.clone(), value)),
            _ => None,
        };
        if let Some((dest, value)) = known {
            folded.push(Instruction::Set {
                dest,
                src: Operand::Imm(value),
            });
            continue;
        }

        match instr {
            Instruction::GotoT {
                cond: Operand::Imm(value),
                target,
            } => {
                if value != 0 {
                    folded.push(Instruction::Goto(target));
                }
            }
            Instruction::GotoF {
                cond: Operand::Imm(value),
                target,
            } => {
                if value == 0 {
                    folded.push(Instruction::Goto(target));
                }
            }
            other => folded.push(other),
        }
    }

    Ok(folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{BinaryOp, JumpTarget};

    fn reg(name: &str) -> Register {
        Register::from(name)
    }

    fn set(dest: &str, src: Operand) -> Instruction {
        Instruction::Set {
            dest: reg(dest),
            src,
        }
    }

    #[test]
    fn test_optimizer_creation() {
        let optimizer = Optimizer::new(1);
        assert_eq!(optimizer.level(), 1);
        assert_eq!(Optimizer::default().level(), 2);
    }

    #[test]
    fn test_escaping_slot_is_not_promoted() {
        // %r0 = alloc(4); *(%r0) = 1; %r1 = %r0 + 4; ...
        let code = vec![
            Instruction::Alloc {
                dest: reg("%r0"),
                size: Operand::Imm(4),
            },
            Instruction::StoreWord {
                src: Operand::Imm(1),
                addr: reg("%r0"),
            },
            Instruction::Alloc {
                dest: reg("%r2"),
                size: Operand::Imm(4),
            },
            Instruction::BinOp {
                dest: reg("%r1"),
                op: BinaryOp::Add,
                lhs: Operand::reg("%r0"),
                rhs: Operand::Imm(4),
            },
            Instruction::LoadWord {
                dest: reg("%r3"),
                addr: reg("%r2"),
            },
        ];
        let slots = promotable_slots(&code);
        assert!(!slots.contains(&reg("%r0")));
        assert!(slots.contains(&reg("%r2")));

        let promoted = promote_slots(&code);
        assert_eq!(promoted.len(), 5);
        assert_eq!(promoted[0], code[0]);
        assert_eq!(promoted[2], set("%r2", Operand::Imm(0)));
        assert_eq!(promoted[4], set("%r3", Operand::reg("%r2")));
    }

    #[test]
    fn test_load_before_store_reads_zero() {
        // %s = alloc(4); %r0 = *(%s) [word]; %r1 = print %r0; halt
        let code = vec![
            Instruction::Alloc {
                dest: reg("%s"),
                size: Operand::Imm(4),
            },
            Instruction::LoadWord {
                dest: reg("%r0"),
                addr: reg("%s"),
            },
            Instruction::Print {
                dest: reg("%r1"),
                operand: Operand::reg("%r0"),
            },
            Instruction::Halt,
        ];

        let promoted = Optimizer::new(1).optimize(&code).unwrap();
        assert!(promoted.contains(&set("%s", Operand::Imm(0))));
        assert!(!promoted.iter().any(|i| matches!(i, Instruction::Alloc { .. })));

        let folded = Optimizer::new(2).optimize(&code).unwrap();
        assert_eq!(
            folded,
            vec![
                Instruction::Print {
                    dest: reg("%r1"),
                    operand: Operand::Imm(0),
                },
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn test_store_first_drops_zero_fill() {
        let code = vec![
            Instruction::Alloc {
                dest: reg("%s"),
                size: Operand::Imm(4),
            },
            Instruction::StoreWord {
                src: Operand::reg("x"),
                addr: reg("%s"),
            },
            Instruction::LoadWord {
                dest: reg("%r0"),
                addr: reg("%s"),
            },
            Instruction::Print {
                dest: reg("%r1"),
                operand: Operand::reg("%r0"),
            },
            Instruction::Halt,
        ];
        let out = Optimizer::new(1).optimize(&code).unwrap();
        assert!(!out.contains(&set("%s", Operand::Imm(0))));
        assert!(out.contains(&set("%s", Operand::reg("x"))));
    }

    #[test]
    fn test_dead_set_removed_print_kept() {
        let code = vec![
            set("%r0", Operand::Imm(5)),
            set("%r1", Operand::Imm(10)),
            Instruction::Print {
                dest: reg("%r2"),
                operand: Operand::reg("%r0"),
            },
            Instruction::Halt,
        ];
        let out = eliminate_dead_code(&code).unwrap();
        assert_eq!(out.len(), 3);
        assert!(!out.contains(&code[1]));
    }

    #[test]
    fn test_dead_alloc_removed_live_alloc_kept() {
        // %a = alloc(4); %b = alloc(4); %p = print %b
        let code = vec![
            Instruction::Alloc {
                dest: reg("%a"),
                size: Operand::Imm(4),
            },
            Instruction::Alloc {
                dest: reg("%b"),
                size: Operand::Imm(4),
            },
            Instruction::Print {
                dest: reg("%p"),
                operand: Operand::reg("%b"),
            },
            Instruction::Halt,
        ];
        // %b escapes into the print, so only the dead %a goes
        let out = Optimizer::new(1).optimize(&code).unwrap();
        assert_eq!(out, code[1..].to_vec());
    }

    #[test]
    fn test_branch_folding() {
        let code = vec![
            set("%r0", Operand::Imm(1)),
            Instruction::GotoF {
                cond: Operand::reg("%r0"),
                target: JumpTarget::label(".L0"),
            },
            Instruction::GotoT {
                cond: Operand::reg("%r0"),
                target: JumpTarget::label(".L0"),
            },
            Instruction::Label(".L0".into()),
            Instruction::Halt,
        ];
        let out = fold_constants(&code).unwrap();
        assert_eq!(
            out,
            vec![
                set("%r0", Operand::Imm(1)),
                Instruction::Goto(JumpTarget::label(".L0")),
                Instruction::Label(".L0".into()),
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn test_level_zero_is_identity() {
        let code = vec![set("%r0", Operand::Imm(1)), Instruction::Halt];
        assert_eq!(Optimizer::new(0).optimize(&code).unwrap(), code);
    }
}
