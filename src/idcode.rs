//! IDCODE decoding.  Every 1149.1-compliant TAP preloads its 32-bit device
//! identification register after Test-Logic-Reset; detection walks these out
//! of the chain and matches them against a part catalog.

use bitfield::bitfield;

bitfield! {
    /// A JTAG device identification code.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct IdCode(u32);
    impl Debug;

    u8;
    /// Design stepping / revision.
    pub version, set_version: 31, 28;

    u16;
    /// Manufacturer-assigned part number.
    pub part_number, set_part_number: 27, 12;

    /// The JEDEC JEP-106 manufacturer ID (continuation count + identity).
    pub manufacturer, set_manufacturer: 11, 1;

    u8;
    pub manufacturer_continuation, set_manufacturer_continuation: 11, 8;
    pub manufacturer_identity, set_manufacturer_identity: 7, 1;

    bool;
    /// Always 1 for a real IDCODE; a captured 0 here marks a BYPASS device.
    pub marker, set_marker: 0;
}

impl IdCode {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    /// A compliant IDCODE has the marker bit set and a manufacturer ID that
    /// is neither reserved value.
    pub fn valid(&self) -> bool {
        self.marker() && self.manufacturer() != 0 && self.manufacturer() != 127
    }

    /// JEP-106 manufacturer name, when the code is known.
    pub fn manufacturer_name(&self) -> Option<&'static str> {
        let cc = self.manufacturer_continuation();
        let id = self.manufacturer_identity();
        jep106::JEP106Code::new(cc, id).get()
    }

    /// True when `self` and `other` agree outside the version nibble.  One
    /// catalog entry normally covers every stepping of a part.
    pub fn matches_ignoring_version(&self, other: IdCode) -> bool {
        const VERSION_MASK: u32 = 0xF000_0000;
        (self.0 & !VERSION_MASK) == (other.0 & !VERSION_MASK)
    }
}

impl std::fmt::Display for IdCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.manufacturer_name() {
            Some(name) => write!(f, "0x{:08X} ({name})", self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARM_TAP: IdCode = IdCode(0x4BA00477);

    #[test]
    fn field_extraction() {
        assert!(ARM_TAP.valid());
        assert_eq!(ARM_TAP.version(), 0x4);
        assert_eq!(ARM_TAP.part_number(), 0xBA00);
        assert_eq!(ARM_TAP.manufacturer_name(), Some("ARM Ltd"));
    }

    #[test]
    fn display_includes_manufacturer() {
        assert_eq!(format!("{ARM_TAP}"), "0x4BA00477 (ARM Ltd)");
    }

    #[test]
    fn all_ones_is_invalid() {
        assert!(!IdCode(0xFFFF_FFFF).valid());
        assert!(!IdCode(0x0000_0000).valid());
    }

    #[test]
    fn version_nibble_is_masked() {
        assert!(ARM_TAP.matches_ignoring_version(IdCode(0x0BA00477)));
        assert!(!ARM_TAP.matches_ignoring_version(IdCode(0x4BA00478)));
    }
}
