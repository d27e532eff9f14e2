//! CPU status register (P) flags.
//!
//! ```text
//! 7  6  5  4  3  2  1  0
//! N  V  U  B  D  I  Z  C
//! ```
//!
//! Bit 5 (U) reads as 1 at all times. The B bit only exists on the stack:
//! PHP and BRK push it set, IRQ and NMI push it clear, and PLP/RTI discard
//! it on the way back in. D is decoded but has no effect on ADC/SBC (the
//! 2A03 drops the BCD circuitry).

use bitflags::bitflags;

bitflags! {
    /// 6502 processor status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Status: u8 {
        /// Carry.
        const C = 1 << 0;
        /// Zero.
        const Z = 1 << 1;
        /// Interrupt disable. Masks IRQ; NMI is unaffected.
        const I = 1 << 2;
        /// Decimal mode. Latched but ignored by ADC/SBC.
        const D = 1 << 3;
        /// Break. Only meaningful in the stacked copy of P.
        const B = 1 << 4;
        /// Unused; always 1.
        const U = 1 << 5;
        /// Overflow.
        const V = 1 << 6;
        /// Negative (bit 7 of the last result).
        const N = 1 << 7;
    }
}

impl Status {
    /// Power-on value: I and U set.
    pub const POWER_ON: Self = Self::I.union(Self::U);

    /// Create the power-on status.
    #[must_use]
    pub const fn new() -> Self {
        Self::POWER_ON
    }

    /// Update Z and N from a result byte.
    #[inline]
    pub fn set_zn(&mut self, value: u8) {
        self.set(Self::Z, value == 0);
        self.set(Self::N, value & 0x80 != 0);
    }

    /// Byte image for pushing onto the stack. U is forced on; B reflects
    /// whether the push came from software (PHP/BRK) or an interrupt.
    #[inline]
    #[must_use]
    pub const fn to_pushed(self, software: bool) -> u8 {
        let mut bits = self.bits() | Self::U.bits();
        if software {
            bits |= Self::B.bits();
        }
        bits
    }

    /// Rebuild status from a byte pulled off the stack. B is dropped, U is
    /// forced on.
    #[inline]
    #[must_use]
    pub fn from_pulled(value: u8) -> Self {
        Self::from_bits_truncate((value & !Self::B.bits()) | Self::U.bits())
    }
}
