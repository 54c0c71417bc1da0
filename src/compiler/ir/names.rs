//! Fresh register and label names

use super::instruction::{Register, TEMP_PREFIX};

/// Issues fresh register (`%r0`, `%r1`, ...) and label (`.L0`, `.L1`, ...)
/// names from counters owned by one compilation.
///
/// Two generators never share state, so independent compilations can run
/// side by side without a reset step.
#[derive(Debug, Clone, Default)]
pub struct NameGen {
    next_reg: usize,
    next_label: usize,
}

impl NameGen {
    /// Creates a generator starting at `%r0` and `.L0`
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused temporary register
    pub fn fresh_reg(&mut self) -> Register {
        let reg = Register::new(format!("{}r{}", TEMP_PREFIX, self.next_reg));
        self.next_reg += 1;
        reg
    }

    /// Next unused label name
    pub fn fresh_label(&mut self) -> String {
        let label = format!(".L{}", self.next_label);
        self.next_label += 1;
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_generators() {
        let mut a = NameGen::new();
        let mut b = NameGen::new();
        assert_eq!(a.fresh_reg().name(), "%r0");
        assert_eq!(a.fresh_reg().name(), "%r1");
        assert_eq!(a.fresh_label(), ".L0");
        assert_eq!(b.fresh_reg().name(), "%r0");
        assert_eq!(b.fresh_label(), ".L0");
        assert!(a.fresh_reg().is_temporary());
    }
}
