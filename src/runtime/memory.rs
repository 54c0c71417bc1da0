//! Byte-addressable memory backing `alloc`, loads and stores
//!
//! A flat, append-only byte store. `allocate(n)` appends `n` zero bytes and
//! returns the address of the first; addresses are never reused within a
//! run. Words are 4 bytes, little-endian, two's complement.

use thiserror::Error;

/// Memory access errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Access touches bytes that were never allocated
    #[error("Out of bounds access: {size} byte(s) at address {addr} (memory size {len})")]
    OutOfBounds {
        /// Address of the access
        addr: i32,
        /// Size of the access in bytes
        size: usize,
        /// Bytes allocated so far
        len: usize,
    },

    /// `alloc` with a negative size
    #[error("Invalid allocation size {0}")]
    InvalidSize(i32),

    /// Total allocation no longer addressable with a 32-bit address
    #[error("Address space exhausted")]
    AddressSpaceExhausted,
}

/// Flat byte store
#[derive(Debug, Clone, Default)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Creates an empty memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes allocated so far
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True before the first allocation
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Appends `size` zero bytes and returns the address of the first one
    pub fn allocate(&mut self, size: i32) -> Result<i32, MemoryError> {
        let count = usize::try_from(size).map_err(|_| MemoryError::InvalidSize(size))?;
        let addr = i32::try_from(self.bytes.len()).map_err(|_| MemoryError::AddressSpaceExhausted)?;
        if self.bytes.len() + count > i32::MAX as usize {
            return Err(MemoryError::AddressSpaceExhausted);
        }
        self.bytes.resize(self.bytes.len() + count, 0);
        Ok(addr)
    }

    /// Validated byte range of an access
    fn range(&self, addr: i32, size: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let out_of_bounds = MemoryError::OutOfBounds {
            addr,
            size,
            len: self.bytes.len(),
        };
        let start = usize::try_from(addr).map_err(|_| out_of_bounds.clone())?;
        if start + size > self.bytes.len() {
            return Err(out_of_bounds);
        }
        Ok(start..start + size)
    }

    /// Stores the low 8 bits of `value`
    pub fn store_byte(&mut self, addr: i32, value: i32) -> Result<(), MemoryError> {
        let range = self.range(addr, 1)?;
        self.bytes[range.start] = value as u8;
        Ok(())
    }

    /// Loads one byte, sign-extended to 32 bits
    pub fn load_byte(&self, addr: i32) -> Result<i32, MemoryError> {
        let range = self.range(addr, 1)?;
        Ok(self.bytes[range.start] as i8 as i32)
    }

    /// Stores `value` as 4 little-endian bytes
    pub fn store_word(&mut self, addr: i32, value: i32) -> Result<(), MemoryError> {
        let range = self.range(addr, 4)?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Loads 4 little-endian bytes as a signed 32-bit value
    pub fn load_word(&self, addr: i32) -> Result<i32, MemoryError> {
        let range = self.range(addr, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[range]);
        Ok(i32::from_le_bytes(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_do_not_overlap() {
        let mut mem = Memory::new();
        assert_eq!(mem.allocate(4), Ok(0));
        assert_eq!(mem.allocate(1), Ok(4));
        assert_eq!(mem.allocate(0), Ok(5));
        assert_eq!(mem.allocate(4), Ok(5));
        assert_eq!(mem.len(), 9);
        assert_eq!(mem.load_word(5), Ok(0));
    }

    #[test]
    fn test_word_little_endian() {
        let mut mem = Memory::new();
        let addr = mem.allocate(4).unwrap();
        mem.store_word(addr, 0x1234_5678).unwrap();
        assert_eq!(mem.load_byte(addr), Ok(0x78));
        assert_eq!(mem.load_byte(addr + 3), Ok(0x12));
        mem.store_word(addr, -2).unwrap();
        assert_eq!(mem.load_word(addr), Ok(-2));
    }

    #[test]
    fn test_byte_sign_extension() {
        let mut mem = Memory::new();
        let addr = mem.allocate(1).unwrap();
        mem.store_byte(addr, 0xff).unwrap();
        assert_eq!(mem.load_byte(addr), Ok(-1));
        mem.store_byte(addr, 300).unwrap();
        assert_eq!(mem.load_byte(addr), Ok(44));
    }

    #[test]
    fn test_out_of_bounds() {
        let mut mem = Memory::new();
        let addr = mem.allocate(2).unwrap();
        assert!(matches!(mem.load_word(addr), Err(MemoryError::OutOfBounds { .. })));
        assert!(mem.store_byte(-1, 0).is_err());
        assert_eq!(mem.allocate(-4), Err(MemoryError::InvalidSize(-4)));
    }
}
