//! Textual IR dump

use super::instruction::{Instruction, JumpTarget, Operand, Register};
use std::fmt::{self, Write};

const INDENT: &str = "    ";

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{}", reg),
            Operand::Imm(value) => write!(f, "{}", value),
        }
    }
}

impl fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpTarget::Label(name) => f.write_str(name),
            JumpTarget::Index(index) => write!(f, "@{}", index),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_instruction(f, self, "")
    }
}

fn write_instruction(out: &mut impl Write, instr: &Instruction, padding: &str) -> fmt::Result {
    match instr {
        Instruction::Alloc { dest, size } => write!(out, "{} = alloc({})", dest, size),
        Instruction::Set { dest, src } => write!(out, "{} = {}", dest, src),
        Instruction::BinOp { dest, op, lhs, rhs } => {
            write!(out, "{} = {} {} {}", dest, lhs, op.symbol(), rhs)
        }
        Instruction::UnOp { dest, op, operand } => {
            write!(out, "{} = {} {}", dest, op.symbol(), operand)
        }
        Instruction::LoadByte { dest, addr } => write!(out, "{} = *({}) [byte]", dest, addr),
        Instruction::LoadWord { dest, addr } => write!(out, "{} = *({}) [word]", dest, addr),
        Instruction::StoreByte { src, addr } => write!(out, "*({}) = {} [byte]", addr, src),
        Instruction::StoreWord { src, addr } => write!(out, "*({}) = {} [word]", addr, src),
        Instruction::Label(name) => write!(out, "label {}", name),
        Instruction::Goto(target) => write!(out, "goto {}", target),
        Instruction::GotoT { cond, target } => write!(out, "$if {} goto {}", cond, target),
        Instruction::GotoF { cond, target } => write!(out, "$if not {} goto {}", cond, target),
        Instruction::Call { dest, callee, args } => {
            let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            write!(out, "{} = call {}({})", dest, callee, args.join(", "))
        }
        Instruction::Ret(op) => write!(out, "ret {}", op),
        Instruction::Print { dest, operand } => write!(out, "{} = print {}", dest, operand),
        Instruction::Halt => write!(out, "halt"),
        Instruction::FnDecl(decl) => {
            let params: Vec<&str> = decl.params.iter().map(|p| p.name()).collect();
            write!(out, "fn {} [{}]:", decl.name, params.join(", "))?;
            let inner = format!("{}{}", padding, INDENT);
            for body_instr in &decl.body {
                write!(out, "\n{}", inner)?;
                write_instruction(out, body_instr, &inner)?;
            }
            Ok(())
        }
    }
}

/// Renders an instruction array one instruction per line, nested function
/// bodies indented under their declaration.
pub fn display_instructions(instrs: &[Instruction]) -> String {
    let mut out = String::new();
    for instr in instrs {
        // Writing into a String cannot fail
        let _ = write_instruction(&mut out, instr, "");
        out.push('\n');
    }
    out
}
