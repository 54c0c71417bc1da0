//! Function registry: every declaration in a module, keyed by name

use super::instruction::{FnDecl, Instruction};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Flat name → declaration table built from the (possibly nested) module
///
/// Nested declarations are registered under their own name, so switching
/// frames at run time is a single lookup.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FnDecl>,
}

impl FunctionRegistry {
    /// Scans `instrs` and every nested body once and registers each `FnDecl`.
    ///
    /// Build it from resolved code: the registry keeps its own copy of each
    /// body.
    pub fn build(instrs: &[Instruction]) -> Result<Self> {
        let mut registry = FunctionRegistry::default();
        registry.collect(instrs)?;
        Ok(registry)
    }

    fn collect(&mut self, instrs: &[Instruction]) -> Result<()> {
        for (index, instr) in instrs.iter().enumerate() {
            if let Instruction::FnDecl(decl) = instr {
                if self.functions.contains_key(&decl.name) {
                    return Err(Error::structural(
                        index,
                        format!("Function {} declared more than once", decl.name),
                    ));
                }
                self.functions.insert(decl.name.clone(), decl.clone());
                self.collect(&decl.body)?;
            }
        }
        Ok(())
    }

    /// Declaration by name
    pub fn get(&self, name: &str) -> Option<&FnDecl> {
        self.functions.get(name)
    }

    /// True if a function with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True when the module declares no functions
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{Operand, Register};

    fn decl(name: &str, body: Vec<Instruction>) -> Instruction {
        Instruction::FnDecl(FnDecl {
            name: name.into(),
            params: vec![Register::from("x")],
            body,
        })
    }

    #[test]
    fn test_nested_functions_are_flattened() {
        let code = vec![
            decl(
                "outer",
                vec![
                    decl("inner", vec![Instruction::Ret(Operand::reg("x"))]),
                    Instruction::Ret(Operand::Imm(0)),
                ],
            ),
            Instruction::Halt,
        ];
        let registry = FunctionRegistry::build(&code).unwrap();
        assert_eq!(registry.names(), vec!["inner", "outer"]);
        assert_eq!(registry.get("inner").unwrap().body.len(), 1);
    }

    #[test]
    fn test_duplicate_function_rejected() {
        let code = vec![
            decl("f", vec![Instruction::Ret(Operand::Imm(0))]),
            decl("f", vec![Instruction::Ret(Operand::Imm(1))]),
        ];
        let err = FunctionRegistry::build(&code).unwrap_err();
        assert_eq!(err.index(), Some(1));
    }
}
