//! Fixed-length bit registers.  Every shift in the crate moves one of these:
//! instruction opcodes, data register contents, boundary-scan patterns and
//! transient scratch buffers.
//!
//! Bit index 0 is the first bit clocked onto TDI (and the first bit captured
//! from TDO), and is the first character of the string form.  The string form
//! is derived on demand; it is never stored.

use bitvec::prelude::*;
use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Eq)]
pub struct BitRegister {
    bits: BitVec<u8, Lsb0>,
}

impl BitRegister {
    /// A register of `len` zero bits.
    pub fn new(len: usize) -> Self {
        Self {
            bits: bitvec![u8, Lsb0; 0; len],
        }
    }

    /// Parse a register directly from its string form.
    pub fn from_str_value(s: &str) -> Result<Self> {
        let mut reg = Self::new(s.len());
        reg.set_from_str(s)?;
        Ok(reg)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Set every bit to `value`.
    pub fn fill(&mut self, value: bool) {
        self.bits.fill(value);
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).map(|b| *b)
    }

    /// Panics if `index` is out of range, like slice indexing.
    pub fn set(&mut self, index: usize, value: bool) {
        self.bits.set(index, value);
    }

    /// Overwrite the register from a string of `0`, `1` and `x` characters.
    /// `x` is a write-time don't-care and is stored as 0; it is not a runtime
    /// tri-state.  The string length must match the register length exactly.
    pub fn set_from_str(&mut self, s: &str) -> Result<()> {
        if s.len() != self.bits.len() {
            return Err(Error::InvalidFormat {
                value: s.to_string(),
                len: self.bits.len(),
            });
        }
        for (i, c) in s.chars().enumerate() {
            let bit = match c {
                '0' | 'x' | 'X' => false,
                '1' => true,
                _ => {
                    return Err(Error::InvalidFormat {
                        value: s.to_string(),
                        len: self.bits.len(),
                    })
                }
            };
            self.bits.set(i, bit);
        }
        Ok(())
    }

    /// Iterate bits from index 0 upward (clock order).
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().by_vals()
    }

    /// Copy the contents of `other` into this register.  Lengths must match.
    pub fn copy_from(&mut self, other: &BitRegister) {
        debug_assert_eq!(self.bits.len(), other.bits.len());
        self.bits.copy_from_bitslice(&other.bits);
    }
}

impl FromStr for BitRegister {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_value(s)
    }
}

impl fmt::Display for BitRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.bits.iter().by_vals() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitRegister({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let reg: BitRegister = "1010".parse().unwrap();
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.to_string(), "1010");
    }

    #[test]
    fn dont_care_stored_as_zero() {
        let reg: BitRegister = "1x0X".parse().unwrap();
        assert_eq!(reg.to_string(), "1000");
    }

    #[test]
    fn rejects_bad_characters_and_lengths() {
        assert!("10a1".parse::<BitRegister>().is_err());
        let mut reg = BitRegister::new(4);
        assert!(reg.set_from_str("101").is_err());
        assert!(reg.set_from_str("10101").is_err());
    }

    #[test]
    fn compare_is_exact() {
        let a: BitRegister = "1010".parse().unwrap();
        let b: BitRegister = "1010".parse().unwrap();
        let c: BitRegister = "1011".parse().unwrap();
        let d: BitRegister = "10100".parse().unwrap();
        assert_eq!(a, a);
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_ne!(a, c);
        // Lengths differ, so unequal even though the common prefix matches.
        assert_ne!(a, d);
    }

    #[test]
    fn fill_and_set() {
        let mut reg = BitRegister::new(3);
        reg.fill(true);
        assert_eq!(reg.to_string(), "111");
        reg.set(1, false);
        assert_eq!(reg.to_string(), "101");
        assert_eq!(reg.get(1), Some(false));
        assert_eq!(reg.get(3), None);
    }
}
