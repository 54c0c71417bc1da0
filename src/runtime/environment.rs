use std::collections::HashMap;

use crate::compiler::ir::Register;

/// Register bindings of one activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    registers: HashMap<Register, i32>,
}

impl Environment {
    /// Creates an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds or overwrites a register
    pub fn define(&mut self, reg: Register, value: i32) {
        self.registers.insert(reg, value);
    }

    /// Current value of a register
    pub fn get(&self, reg: &Register) -> Option<i32> {
        self.registers.get(reg).copied()
    }

    /// Number of bound registers
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// True if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

/// Code address: function (`None` for top-level code) and local index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeAddr<'p> {
    /// Function whose body is executing
    pub function: Option<&'p str>,
    /// Index into that body (or the top-level array)
    pub index: usize,
}

impl<'p> CodeAddr<'p> {
    /// Address in top-level code
    pub fn top_level(index: usize) -> Self {
        Self {
            function: None,
            index,
        }
    }
}

/// Saved caller state, pushed on `Call` and popped on `Ret`
///
/// The three stacks always move together; a frame is only ever observed
/// whole.
#[derive(Debug, Default)]
pub struct CallStack<'p> {
    environments: Vec<Environment>,
    return_addrs: Vec<CodeAddr<'p>>,
    return_regs: Vec<Register>,
}

impl<'p> CallStack<'p> {
    /// Creates an empty call stack
    pub fn new() -> Self {
        Self {
            environments: Vec::new(),
            return_addrs: Vec::new(),
            return_regs: Vec::new(),
        }
    }

    /// Saves the caller's environment, resume address and result register
    pub fn push(&mut self, env: Environment, return_addr: CodeAddr<'p>, return_reg: Register) {
        self.environments.push(env);
        self.return_addrs.push(return_addr);
        self.return_regs.push(return_reg);
    }

    /// Pops one frame; `None` on underflow of any of the stacks
    pub fn pop(&mut self) -> Option<(Environment, CodeAddr<'p>, Register)> {
        let env = self.environments.pop();
        let addr = self.return_addrs.pop();
        let reg = self.return_regs.pop();
        match (env, addr, reg) {
            (Some(env), Some(addr), Some(reg)) => Some((env, addr, reg)),
            _ => None,
        }
    }

    /// Number of active calls
    pub fn depth(&self) -> usize {
        self.environments.len()
    }

    /// True when all three stacks are empty
    pub fn is_empty(&self) -> bool {
        self.environments.is_empty() && self.return_addrs.is_empty() && self.return_regs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_stack_balance() {
        let mut stack = CallStack::new();
        let mut env = Environment::new();
        env.define(Register::from("%r0"), 3);
        stack.push(env.clone(), CodeAddr::top_level(4), Register::from("%r1"));
        assert_eq!(stack.depth(), 1);

        let (saved, addr, reg) = stack.pop().unwrap();
        assert_eq!(saved, env);
        assert_eq!(addr, CodeAddr::top_level(4));
        assert_eq!(reg.name(), "%r1");
        assert!(stack.is_empty());
        assert!(stack.pop().is_none());
    }
}
