//! IR instruction definitions

use serde::{Deserialize, Serialize};

/// Prefix reserved for compiler-generated registers (`%r0`, `%r1`, ...)
pub const TEMP_PREFIX: char = '%';

/// Named virtual register
///
/// Registers created by [`NameGen`](super::NameGen) start with `%`; any other
/// name is a formal parameter of the enclosing function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Register(pub String);

impl Register {
    /// Creates a register with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Register name
    pub fn name(&self) -> &str {
        &self.0
    }

    /// True for compiler-generated registers, false for formal parameters
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }
}

impl From<&str> for Register {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Instruction operand: a register or a 32-bit immediate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    /// Value held in a register
    Reg(Register),
    /// Literal value
    Imm(i32),
}

impl Operand {
    /// Register operand from a name
    pub fn reg(name: impl Into<String>) -> Self {
        Operand::Reg(Register::new(name))
    }

    /// The register, if this operand reads one
    pub fn as_register(&self) -> Option<&Register> {
        match self {
            Operand::Reg(reg) => Some(reg),
            Operand::Imm(_) => None,
        }
    }
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Operand::Reg(reg)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Imm(value)
    }
}

/// Binary operators. Comparisons produce 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Wrapping addition
    Add,
    /// Wrapping subtraction
    Sub,
    /// Wrapping multiplication
    Mul,
    /// Floor division
    Div,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl BinaryOp {
    /// Source-level symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }

    /// Evaluates the operator with 32-bit two's-complement semantics.
    ///
    /// Returns `None` only for division by zero. The executor and the
    /// constant folder both go through this function.
    pub fn apply(&self, lhs: i32, rhs: i32) -> Option<i32> {
        let value = match self {
            BinaryOp::Add => lhs.wrapping_add(rhs),
            BinaryOp::Sub => lhs.wrapping_sub(rhs),
            BinaryOp::Mul => lhs.wrapping_mul(rhs),
            BinaryOp::Div => return floor_div(lhs, rhs),
            BinaryOp::Lt => (lhs < rhs) as i32,
            BinaryOp::Le => (lhs <= rhs) as i32,
            BinaryOp::Gt => (lhs > rhs) as i32,
            BinaryOp::Ge => (lhs >= rhs) as i32,
            BinaryOp::Eq => (lhs == rhs) as i32,
            BinaryOp::Ne => (lhs != rhs) as i32,
        };
        Some(value)
    }
}

/// Division rounding toward negative infinity; `i32::MIN / -1` wraps.
fn floor_div(lhs: i32, rhs: i32) -> Option<i32> {
    if rhs == 0 {
        return None;
    }
    let quotient = lhs.wrapping_div(rhs);
    let remainder = lhs.wrapping_rem(rhs);
    if remainder != 0 && ((remainder < 0) != (rhs < 0)) {
        Some(quotient.wrapping_sub(1))
    } else {
        Some(quotient)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Wrapping negation
    Neg,
    /// Identity
    Plus,
    /// Logical not: 1 if the operand is zero, else 0
    Not,
}

impl UnaryOp {
    /// Source-level symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
        }
    }

    /// Evaluates the operator with 32-bit two's-complement semantics
    pub fn apply(&self, value: i32) -> i32 {
        match self {
            UnaryOp::Neg => value.wrapping_neg(),
            UnaryOp::Plus => value,
            UnaryOp::Not => (value == 0) as i32,
        }
    }
}

/// Jump target: symbolic before label resolution, an index after it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpTarget {
    /// Label name, as emitted by the translator
    Label(String),
    /// Index into the enclosing instruction array
    Index(usize),
}

impl JumpTarget {
    /// Symbolic target
    pub fn label(name: impl Into<String>) -> Self {
        JumpTarget::Label(name.into())
    }
}

/// Function declaration: name, formal parameters and body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FnDecl {
    /// Function name (unique across the module)
    pub name: String,
    /// Formal parameter registers, bound positionally on call
    pub params: Vec<Register>,
    /// Function body; may contain nested declarations
    pub body: Vec<Instruction>,
}

/// IR instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // Memory
    /// dest = alloc(size); `dest` receives the address of `size` zero bytes
    Alloc {
        /// Register receiving the address
        dest: Register,
        /// Byte count
        size: Operand,
    },
    /// dest = *(addr), one byte, sign-extended
    LoadByte {
        /// Destination register
        dest: Register,
        /// Register holding the address
        addr: Register,
    },
    /// dest = *(addr), four bytes little-endian
    LoadWord {
        /// Destination register
        dest: Register,
        /// Register holding the address
        addr: Register,
    },
    /// *(addr) = src, low byte only
    StoreByte {
        /// Value to store
        src: Operand,
        /// Register holding the address
        addr: Register,
    },
    /// *(addr) = src, four bytes little-endian
    StoreWord {
        /// Value to store
        src: Operand,
        /// Register holding the address
        addr: Register,
    },

    // Register operations
    /// dest = src
    Set {
        /// Destination register
        dest: Register,
        /// Source value
        src: Operand,
    },
    /// dest = lhs op rhs
    BinOp {
        /// Destination register
        dest: Register,
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Operand,
        /// Right operand
        rhs: Operand,
    },
    /// dest = op operand
    UnOp {
        /// Destination register
        dest: Register,
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Operand,
    },

    // Control flow
    /// Jump target definition
    Label(String),
    /// Unconditional jump
    Goto(JumpTarget),
    /// Jump if `cond` is non-zero
    GotoT {
        /// Condition
        cond: Operand,
        /// Taken target
        target: JumpTarget,
    },
    /// Jump if `cond` is zero
    GotoF {
        /// Condition
        cond: Operand,
        /// Taken target
        target: JumpTarget,
    },

    // Functions
    /// dest = callee(args...)
    Call {
        /// Register receiving the return value
        dest: Register,
        /// Function name
        callee: String,
        /// Actual arguments
        args: Vec<Operand>,
    },
    /// Return from the current function
    Ret(Operand),
    /// Nested function declaration; skipped when reached by fallthrough
    FnDecl(FnDecl),

    // Misc
    /// dest = operand, then hand the value to the print callback
    Print {
        /// Destination register
        dest: Register,
        /// Printed value
        operand: Operand,
    },
    /// Stop execution
    Halt,
}

impl Instruction {
    /// Register defined by this instruction, if any
    pub fn def(&self) -> Option<&Register> {
        match self {
            Instruction::Alloc { dest, .. }
            | Instruction::LoadByte { dest, .. }
            | Instruction::LoadWord { dest, .. }
            | Instruction::Set { dest, .. }
            | Instruction::BinOp { dest, .. }
            | Instruction::UnOp { dest, .. }
            | Instruction::Call { dest, .. }
            | Instruction::Print { dest, .. } => Some(dest),

            Instruction::StoreByte { .. }
            | Instruction::StoreWord { .. }
            | Instruction::Label(_)
            | Instruction::Goto(_)
            | Instruction::GotoT { .. }
            | Instruction::GotoF { .. }
            | Instruction::Ret(_)
            | Instruction::FnDecl(_)
            | Instruction::Halt => None,
        }
    }

    /// Registers read by this instruction, in operand order
    pub fn uses(&self) -> Vec<&Register> {
        match self {
            Instruction::Alloc { size: op, .. }
            | Instruction::Set { src: op, .. }
            | Instruction::UnOp { operand: op, .. }
            | Instruction::GotoT { cond: op, .. }
            | Instruction::GotoF { cond: op, .. }
            | Instruction::Ret(op)
            | Instruction::Print { operand: op, .. } => op.as_register().into_iter().collect(),

            Instruction::BinOp { lhs, rhs, .. } => {
                lhs.as_register().into_iter().chain(rhs.as_register()).collect()
            }

            Instruction::LoadByte { addr, .. } | Instruction::LoadWord { addr, .. } => vec![addr],

            Instruction::StoreByte { src, addr } | Instruction::StoreWord { src, addr } => {
                std::iter::once(addr).chain(src.as_register()).collect()
            }

            Instruction::Call { args, .. } => args.iter().filter_map(Operand::as_register).collect(),

            Instruction::Label(_)
            | Instruction::Goto(_)
            | Instruction::FnDecl(_)
            | Instruction::Halt => Vec::new(),
        }
    }

    /// Jump target of `Goto`, `GotoT` and `GotoF`
    pub fn jump_target(&self) -> Option<&JumpTarget> {
        match self {
            Instruction::Goto(target)
            | Instruction::GotoT { target, .. }
            | Instruction::GotoF { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Mutable jump target of `Goto`, `GotoT` and `GotoF`
    pub fn jump_target_mut(&mut self) -> Option<&mut JumpTarget> {
        match self {
            Instruction::Goto(target)
            | Instruction::GotoT { target, .. }
            | Instruction::GotoF { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Copy of this instruction with every value operand passed through `f`.
    ///
    /// Address registers of loads and stores are not operands and stay as
    /// they are; so do `FnDecl` bodies.
    pub fn map_operands(&self, mut f: impl FnMut(&Operand) -> Operand) -> Instruction {
        match self {
            Instruction::Alloc { dest, size } => Instruction::Alloc {
                dest: dest.clone(),
                size: f(size),
            },
            Instruction::Set { dest, src } => Instruction::Set {
                dest: dest.clone(),
                src: f(src),
            },
            Instruction::BinOp { dest, op, lhs, rhs } => Instruction::BinOp {
                dest: dest.clone(),
                op: *op,
                lhs: f(lhs),
                rhs: f(rhs),
            },
            Instruction::UnOp { dest, op, operand } => Instruction::UnOp {
                dest: dest.clone(),
                op: *op,
                operand: f(operand),
            },
            Instruction::StoreByte { src, addr } => Instruction::StoreByte {
                src: f(src),
                addr: addr.clone(),
            },
            Instruction::StoreWord { src, addr } => Instruction::StoreWord {
                src: f(src),
                addr: addr.clone(),
            },
            Instruction::GotoT { cond, target } => Instruction::GotoT {
                cond: f(cond),
                target: target.clone(),
            },
            Instruction::GotoF { cond, target } => Instruction::GotoF {
                cond: f(cond),
                target: target.clone(),
            },
            Instruction::Call { dest, callee, args } => Instruction::Call {
                dest: dest.clone(),
                callee: callee.clone(),
                args: args.iter().map(&mut f).collect(),
            },
            Instruction::Ret(op) => Instruction::Ret(f(op)),
            Instruction::Print { dest, operand } => Instruction::Print {
                dest: dest.clone(),
                operand: f(operand),
            },
            Instruction::LoadByte { .. }
            | Instruction::LoadWord { .. }
            | Instruction::Label(_)
            | Instruction::Goto(_)
            | Instruction::FnDecl(_)
            | Instruction::Halt => self.clone(),
        }
    }
}
