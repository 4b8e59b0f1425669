//! Bit flags carried in the first byte of an RTP header.

use bitflags::bitflags;

bitflags! {
    /// Option bits of RTP header byte 0 (below the 2-bit version).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RtpFlags: u8 {
        /// The payload ends with padding; its last byte is the pad count.
        const PADDING   = 0b0010_0000;
        /// A header extension follows the CSRC list.
        const EXTENSION = 0b0001_0000;
    }
}

/// Mask for the CSRC count in header byte 0.
pub const CSRC_COUNT_MASK: u8 = 0b0000_1111;

/// Marker bit in header byte 1.
pub const MARKER_BIT: u8 = 0b1000_0000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_stay_clear_of_version_and_count() {
        let all = RtpFlags::all().bits();
        assert_eq!(all & 0b1100_0000, 0);
        assert_eq!(all & CSRC_COUNT_MASK, 0);
        assert_eq!(RtpFlags::from_bits_truncate(0xBF), RtpFlags::all());
    }
}
