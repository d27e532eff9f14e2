//! 32-byte palette RAM.
//!
//! The sprite sub-palettes' transparent entries ($3F10/$14/$18/$1C) are
//! mirrors of the background entries, so writes through either address are
//! visible at both.

/// Palette RAM with hardware mirroring.
#[derive(Debug, Clone)]
pub struct PaletteRam {
    data: [u8; 32],
}

impl PaletteRam {
    /// Create zeroed palette RAM.
    #[must_use]
    pub fn new() -> Self {
        Self { data: [0; 32] }
    }

    fn index(addr: u16) -> usize {
        let i = (addr & 0x1F) as usize;
        // $3F10/$14/$18/$1C alias the background entries.
        if i >= 0x10 && i & 0x03 == 0 {
            i - 0x10
        } else {
            i
        }
    }

    /// Read via a $3F00-$3FFF address.
    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        self.data[Self::index(addr)] & 0x3F
    }

    /// Write via a $3F00-$3FFF address.
    pub fn write(&mut self, addr: u16, value: u8) {
        self.data[Self::index(addr)] = value & 0x3F;
    }

    /// Rendering-path lookup by 5-bit palette index. Indices 4/8/12 of the
    /// transparent column fall through to the universal background color.
    #[must_use]
    pub fn entry(&self, index: u8) -> u8 {
        let index = if index & 0x03 == 0 { 0 } else { index };
        self.data[Self::index(u16::from(index))] & 0x3F
    }
}

impl Default for PaletteRam {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_transparent_mirrors_background() {
        let mut p = PaletteRam::new();
        p.write(0x3F10, 0x2A);
        assert_eq!(p.read(0x3F00), 0x2A);
        p.write(0x3F04, 0x11);
        assert_eq!(p.read(0x3F14), 0x11);
        p.write(0x3F18, 0x22);
        assert_eq!(p.read(0x3F08), 0x22);
        p.write(0x3F1C, 0x33);
        assert_eq!(p.read(0x3F0C), 0x33);
    }

    #[test]
    fn non_transparent_entries_are_distinct() {
        let mut p = PaletteRam::new();
        p.write(0x3F01, 0x01);
        p.write(0x3F11, 0x21);
        assert_eq!(p.read(0x3F01), 0x01);
        assert_eq!(p.read(0x3F11), 0x21);
    }

    #[test]
    fn transparent_pixels_use_universal_color() {
        let mut p = PaletteRam::new();
        p.write(0x3F00, 0x0F);
        p.write(0x3F08, 0x15); // sub-palette 2 transparent slot
        assert_eq!(p.entry(8), 0x0F);
        assert_eq!(p.entry(0), 0x0F);
    }

    #[test]
    fn six_bit_values_only() {
        let mut p = PaletteRam::new();
        p.write(0x3F01, 0xFF);
        assert_eq!(p.read(0x3F01), 0x3F);
    }
}
