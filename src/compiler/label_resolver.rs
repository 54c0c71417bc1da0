//! Label resolution: symbolic jump targets → instruction indices
//!
//! Runs once, after optimization. Each array (top-level or function body)
//! resolves against its own labels; indices are local to that array.

use super::cfg::label_table;
use super::ir::{Instruction, JumpTarget};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Rewrite every `Goto`/`GotoT`/`GotoF` target in `code` and in all nested
/// function bodies from a label name to that label's index
pub fn resolve_labels(code: &mut [Instruction]) -> Result<()> {
    let labels: HashMap<String, usize> = label_table(code)?
        .into_iter()
        .map(|(name, index)| (name.to_string(), index))
        .collect();

    for (i, instr) in code.iter_mut().enumerate() {
        if let Instruction::FnDecl(decl) = instr {
            resolve_labels(&mut decl.body)?;
            continue;
        }
        let Some(target) = instr.jump_target_mut() else {
            continue;
        };
        let index = match target {
            JumpTarget::Label(name) => *labels.get(name.as_str()).ok_or_else(|| {
                Error::structural(i, format!("Destination label {} not resolved", name))
            })?,
            JumpTarget::Index(index) => {
                return Err(Error::structural(
                    i,
                    format!("Jump target @{} is already resolved", index),
                ))
            }
        };
        *target = JumpTarget::Index(index);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{FnDecl, Operand, Register};

    #[test]
    fn test_resolves_local_indices() {
        let mut code = vec![
            Instruction::FnDecl(FnDecl {
                name: "f".into(),
                params: vec![Register::from("x")],
                body: vec![
                    Instruction::GotoT {
                        cond: Operand::reg("x"),
                        target: JumpTarget::label(".L0"),
                    },
                    Instruction::Ret(Operand::Imm(0)),
                    Instruction::Label(".L0".into()),
                    Instruction::Ret(Operand::Imm(1)),
                ],
            }),
            Instruction::Goto(JumpTarget::label(".L1")),
            Instruction::Label(".L1".into()),
            Instruction::Halt,
        ];
        resolve_labels(&mut code).unwrap();

        assert_eq!(code[1], Instruction::Goto(JumpTarget::Index(2)));
        let Instruction::FnDecl(decl) = &code[0] else {
            panic!("expected FnDecl");
        };
        assert_eq!(decl.body[0].jump_target(), Some(&JumpTarget::Index(2)));
    }

    #[test]
    fn test_unknown_label_fails() {
        let mut code = vec![Instruction::Halt, Instruction::Goto(JumpTarget::label("nowhere"))];
        let err = resolve_labels(&mut code).unwrap_err();
        assert_eq!(err.index(), Some(1));
    }

    #[test]
    fn test_label_out_of_scope_fails() {
        // Labels inside a function body are not visible at top level
        let mut code = vec![
            Instruction::FnDecl(FnDecl {
                name: "f".into(),
                params: vec![],
                body: vec![Instruction::Label("inner".into()), Instruction::Ret(Operand::Imm(0))],
            }),
            Instruction::Goto(JumpTarget::label("inner")),
        ];
        assert!(resolve_labels(&mut code).is_err());
    }

    #[test]
    fn test_second_resolution_fails() {
        let mut code = vec![
            Instruction::Label("a".into()),
            Instruction::Goto(JumpTarget::label("a")),
        ];
        resolve_labels(&mut code).unwrap();
        assert!(matches!(
            resolve_labels(&mut code),
            Err(Error::Structural { index: 1, .. })
        ));
    }
}
