//! # Control Flow Graph
//!
//! One node per instruction of a single instruction array (top-level code or
//! one function body; nested `FnDecl` bodies get their own graph). Edges
//! follow from the instruction kind alone:
//!
//! | Instruction | Successors |
//! |-------------|------------|
//! | `Goto l` | `{index(l)}` |
//! | `GotoT`/`GotoF c, l` | `{i+1 (if in range), index(l)}` |
//! | `Halt`, `Ret` | `{}` |
//! | anything else | `{i+1}` if in range |
//!
//! The graph is built over symbolic labels; it owns the label lookup for the
//! analyses and rejects code whose targets were already resolved.

use super::ir::{Instruction, JumpTarget};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Instruction-level control flow graph
#[derive(Debug, Clone)]
pub struct ControlFlowGraph<'a> {
    code: &'a [Instruction],
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl<'a> ControlFlowGraph<'a> {
    /// Build the CFG of one instruction array
    pub fn build(code: &'a [Instruction]) -> Result<Self> {
        let labels = label_table(code)?;
        let mut cfg = ControlFlowGraph {
            code,
            successors: vec![Vec::new(); code.len()],
            predecessors: vec![Vec::new(); code.len()],
        };

        for (i, instr) in code.iter().enumerate() {
            let fallthrough = (i + 1 < code.len()).then_some(i + 1);
            match instr {
                Instruction::Goto(target) => {
                    let dest = lookup(&labels, target, i)?;
                    cfg.add_edge(i, dest);
                }
                Instruction::GotoT { target, .. } | Instruction::GotoF { target, .. } => {
                    let dest = lookup(&labels, target, i)?;
                    if let Some(next) = fallthrough {
                        cfg.add_edge(i, next);
                    }
                    cfg.add_edge(i, dest);
                }
                Instruction::Halt | Instruction::Ret(_) => {}
                _ => {
                    if let Some(next) = fallthrough {
                        cfg.add_edge(i, next);
                    }
                }
            }
        }

        Ok(cfg)
    }

    /// Add an edge between nodes
    fn add_edge(&mut self, from: usize, to: usize) {
        if !self.successors[from].contains(&to) {
            self.successors[from].push(to);
        }
        if !self.predecessors[to].contains(&from) {
            self.predecessors[to].push(from);
        }
    }

    /// Successor nodes of `node`
    pub fn successors(&self, node: usize) -> &[usize] {
        &self.successors[node]
    }

    /// Predecessor nodes of `node`
    pub fn predecessors(&self, node: usize) -> &[usize] {
        &self.predecessors[node]
    }

    /// Instruction at `node`
    pub fn instruction(&self, node: usize) -> &'a Instruction {
        &self.code[node]
    }

    /// The instruction array this graph was built from
    pub fn code(&self) -> &'a [Instruction] {
        self.code
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// True for an empty instruction array
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// Label name → index table of one instruction array
pub(crate) fn label_table(code: &[Instruction]) -> Result<HashMap<&str, usize>> {
    let mut labels = HashMap::new();
    for (i, instr) in code.iter().enumerate() {
        if let Instruction::Label(name) = instr {
            if labels.insert(name.as_str(), i).is_some() {
                return Err(Error::structural(i, format!("Label {} defined twice", name)));
            }
        }
    }
    Ok(labels)
}

fn lookup(labels: &HashMap<&str, usize>, target: &JumpTarget, index: usize) -> Result<usize> {
    match target {
        JumpTarget::Label(name) => labels
            .get(name.as_str())
            .copied()
            .ok_or_else(|| Error::structural(index, format!("Label {} is not defined", name))),
        JumpTarget::Index(dest) => Err(Error::structural(
            index,
            format!("Jump target @{} was resolved before CFG construction", dest),
        )),
    }
}

fn write_map(f: &mut fmt::Formatter<'_>, map: &[Vec<usize>]) -> fmt::Result {
    for (node, edges) in map.iter().enumerate() {
        let edges: Vec<String> = edges.iter().map(|e| e.to_string()).collect();
        writeln!(f, "{} -> [{}]", node, edges.join(","))?;
    }
    Ok(())
}

impl fmt::Display for ControlFlowGraph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<predecessor map>")?;
        write_map(f, &self.predecessors)?;
        writeln!(f, "<successor map>")?;
        write_map(f, &self.successors)
    }
}
