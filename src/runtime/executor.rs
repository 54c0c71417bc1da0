//! # IR Executor
//!
//! Fetch-execute loop over label-resolved IR. The program counter is a
//! [`CodeAddr`]: top-level code when `function` is `None`, otherwise the
//! body of that function in the [`FunctionRegistry`].
//!
//! ```text
//!   Running ──halt──▶ Halted
//!      │
//!      └──fault / step limit──▶ Faulted
//! ```

use super::environment::{CallStack, CodeAddr, Environment};
use super::memory::Memory;
use crate::compiler::ir::{FunctionRegistry, Instruction, JumpTarget, Operand, Register};
use crate::error::{Error, Result};

/// Executor lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecState {
    /// Ready to fetch the next instruction
    Running,
    /// Reached `halt`
    Halted,
    /// Stopped on an error
    Faulted {
        /// Instruction index that failed
        index: usize,
        /// Fault description
        message: String,
    },
}

/// Executor configuration
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Maximum number of instructions to execute; `None` runs until `halt`
    pub step_limit: Option<u64>,
}

type PrintHook<'p> = Box<dyn FnMut(&str) + 'p>;

/// Stack-machine interpreter for one program run
pub struct Executor<'p> {
    code: &'p [Instruction],
    registry: &'p FunctionRegistry,
    options: ExecOptions,
    on_print: Option<PrintHook<'p>>,
    memory: Memory,
    pc: CodeAddr<'p>,
    env: Environment,
    calls: CallStack<'p>,
    state: ExecState,
    last_error: Option<Error>,
    steps: u64,
}

impl<'p> Executor<'p> {
    /// Executor positioned at the first top-level instruction
    pub fn new(code: &'p [Instruction], registry: &'p FunctionRegistry) -> Self {
        Self {
            code,
            registry,
            options: ExecOptions::default(),
            on_print: None,
            memory: Memory::new(),
            pc: CodeAddr::top_level(0),
            env: Environment::new(),
            calls: CallStack::new(),
            state: ExecState::Running,
            last_error: None,
            steps: 0,
        }
    }

    /// Use these options
    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }

    /// Send printed values to `hook` instead of stdout
    pub fn with_output(mut self, hook: impl FnMut(&str) + 'p) -> Self {
        self.on_print = Some(Box::new(hook));
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> &ExecState {
        &self.state
    }

    /// Instructions executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Number of active calls
    pub fn call_depth(&self) -> usize {
        self.calls.depth()
    }

    /// True when no call frame is pending
    pub fn call_stack_is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Memory of this run
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Value of a register in the active environment
    pub fn register(&self, name: &str) -> Option<i32> {
        self.env.get(&Register::from(name))
    }

    /// Run until `halt` or a fault
    pub fn execute(&mut self) -> Result<()> {
        match &self.state {
            ExecState::Running => {}
            ExecState::Halted => return Ok(()),
            ExecState::Faulted { index, message } => {
                return Err(self
                    .last_error
                    .clone()
                    .unwrap_or_else(|| Error::runtime(*index, message.clone())))
            }
        }

        loop {
            if let Some(limit) = self.options.step_limit {
                if self.steps >= limit {
                    tracing::warn!(limit, "executor step limit exhausted");
                    self.state = ExecState::Faulted {
                        index: self.pc.index,
                        message: format!("step limit of {} exhausted", limit),
                    };
                    let err = Error::StepLimitExceeded { limit };
                    self.last_error = Some(err.clone());
                    return Err(err);
                }
            }

            match self.step() {
                Ok(true) => {}
                Ok(false) => {
                    self.state = ExecState::Halted;
                    tracing::debug!(steps = self.steps, "executor halted");
                    return Ok(());
                }
                Err(err) => {
                    let message = match &err {
                        Error::Runtime { message, .. } => message.clone(),
                        other => other.to_string(),
                    };
                    self.state = ExecState::Faulted {
                        index: err.index().unwrap_or(self.pc.index),
                        message,
                    };
                    self.last_error = Some(err.clone());
                    return Err(err);
                }
            }
        }
    }

    fn fault(&self, msg: impl Into<String>) -> Error {
        Error::runtime(self.pc.index, msg)
    }

    fn fetch(&self) -> Result<&'p Instruction> {
        let index = self.pc.index;
        let code = match self.pc.function {
            None => self.code,
            Some(name) => {
                let decl = self
                    .registry
                    .get(name)
                    .ok_or_else(|| self.fault(format!("Function {} not in registry", name)))?;
                decl.body.as_slice()
            }
        };
        code.get(index)
            .ok_or_else(|| self.fault("Program counter ran past the end of the code"))
    }

    fn lookup(&self, reg: &Register) -> Result<i32> {
        self.env
            .get(reg)
            .ok_or_else(|| self.fault(format!("Failed to get value of register {}", reg)))
    }

    fn operand(&self, operand: &Operand) -> Result<i32> {
        match operand {
            Operand::Imm(value) => Ok(*value),
            Operand::Reg(reg) => self.lookup(reg),
        }
    }

    fn jump(&mut self, target: &JumpTarget) -> Result<()> {
        match target {
            JumpTarget::Index(index) => {
                self.pc.index = *index;
                Ok(())
            }
            JumpTarget::Label(name) => Err(self.fault(format!("Label {} was not resolved", name))),
        }
    }

    fn print(&mut self, value: i32) {
        let text = value.to_string();
        match self.on_print.as_mut() {
            Some(hook) => hook(&text),
            None => println!("{}", text),
        }
    }

    /// Execute one instruction; `Ok(false)` on `halt`
    fn step(&mut self) -> Result<bool> {
        let instr = self.fetch()?;
        self.steps += 1;

        match instr {
            Instruction::Set { dest, src } => {
                let value = self.operand(src)?;
                self.env.define(dest.clone(), value);
                self.pc.index += 1;
            }
            Instruction::Alloc { dest, size } => {
                let size = self.operand(size)?;
                let addr = self
                    .memory
                    .allocate(size)
                    .map_err(|e| self.fault(e.to_string()))?;
                self.env.define(dest.clone(), addr);
                self.pc.index += 1;
            }
            Instruction::BinOp { dest, op, lhs, rhs } => {
                let lhs = self.operand(lhs)?;
                let rhs = self.operand(rhs)?;
                let value = op
                    .apply(lhs, rhs)
                    .ok_or_else(|| self.fault("Division by zero"))?;
                self.env.define(dest.clone(), value);
                self.pc.index += 1;
            }
            Instruction::UnOp { dest, op, operand } => {
                let value = op.apply(self.operand(operand)?);
                self.env.define(dest.clone(), value);
                self.pc.index += 1;
            }
            Instruction::LoadByte { dest, addr } => {
                let value = self
                    .memory
                    .load_byte(self.lookup(addr)?)
                    .map_err(|e| self.fault(e.to_string()))?;
                self.env.define(dest.clone(), value);
                self.pc.index += 1;
            }
            Instruction::LoadWord { dest, addr } => {
                let value = self
                    .memory
                    .load_word(self.lookup(addr)?)
                    .map_err(|e| self.fault(e.to_string()))?;
                self.env.define(dest.clone(), value);
                self.pc.index += 1;
            }
            Instruction::StoreByte { src, addr } => {
                let value = self.operand(src)?;
                let addr = self.lookup(addr)?;
                let stored = self.memory.store_byte(addr, value);
                stored.map_err(|e| self.fault(e.to_string()))?;
                self.pc.index += 1;
            }
            Instruction::StoreWord { src, addr } => {
                let value = self.operand(src)?;
                let addr = self.lookup(addr)?;
                let stored = self.memory.store_word(addr, value);
                stored.map_err(|e| self.fault(e.to_string()))?;
                self.pc.index += 1;
            }
            Instruction::Goto(target) => self.jump(target)?,
            Instruction::GotoT { cond, target } => {
                if self.operand(cond)? != 0 {
                    self.jump(target)?;
                } else {
                    self.pc.index += 1;
                }
            }
            Instruction::GotoF { cond, target } => {
                if self.operand(cond)? == 0 {
                    self.jump(target)?;
                } else {
                    self.pc.index += 1;
                }
            }
            Instruction::Print { dest, operand } => {
                let value = self.operand(operand)?;
                self.env.define(dest.clone(), value);
                self.print(value);
                self.pc.index += 1;
            }
            Instruction::Call { dest, callee, args } => {
                let decl = self
                    .registry
                    .get(callee)
                    .ok_or_else(|| self.fault(format!("Cannot find function {} in registry", callee)))?;
                if decl.params.len() != args.len() {
                    return Err(self.fault(format!(
                        "Function {} expects {} argument(s), got {}",
                        callee,
                        decl.params.len(),
                        args.len()
                    )));
                }

                let mut callee_env = Environment::new();
                for (param, arg) in decl.params.iter().zip(args) {
                    callee_env.define(param.clone(), self.operand(arg)?);
                }

                let caller_env = std::mem::replace(&mut self.env, callee_env);
                let return_addr = CodeAddr {
                    function: self.pc.function,
                    index: self.pc.index + 1,
                };
                self.calls.push(caller_env, return_addr, dest.clone());
                self.pc = CodeAddr {
                    function: Some(decl.name.as_str()),
                    index: 0,
                };
                tracing::trace!(callee = %callee, depth = self.calls.depth(), "call");
            }
            Instruction::Ret(operand) => {
                let value = self.operand(operand)?;
                let (env, return_addr, return_reg) = self
                    .calls
                    .pop()
                    .ok_or_else(|| self.fault("Tried to return outside any function"))?;
                self.env = env;
                self.env.define(return_reg, value);
                self.pc = return_addr;
                tracing::trace!(depth = self.calls.depth(), "return");
            }
            Instruction::Halt => return Ok(false),
            Instruction::FnDecl(_) | Instruction::Label(_) => self.pc.index += 1,
        }

        Ok(true)
    }
}
