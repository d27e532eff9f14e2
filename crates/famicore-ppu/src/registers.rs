//! CPU-visible PPU registers: PPUCTRL, PPUMASK, PPUSTATUS.

use bitflags::bitflags;

bitflags! {
    /// $2000 PPUCTRL.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuCtrl: u8 {
        /// Base nametable select, bit 0.
        const NAMETABLE_X = 1 << 0;
        /// Base nametable select, bit 1.
        const NAMETABLE_Y = 1 << 1;
        /// VRAM increment: 0 adds 1 (across), 1 adds 32 (down).
        const VRAM_INCREMENT = 1 << 2;
        /// Sprite pattern table select for 8x8 sprites.
        const SPRITE_TABLE = 1 << 3;
        /// Background pattern table select.
        const BG_TABLE = 1 << 4;
        /// Sprite size: 0 = 8x8, 1 = 8x16.
        const SPRITE_SIZE = 1 << 5;
        /// Master/slave select; ignored.
        const MASTER_SLAVE = 1 << 6;
        /// NMI at VBlank start.
        const NMI_ENABLE = 1 << 7;
    }
}

impl PpuCtrl {
    /// $2007 address increment.
    #[must_use]
    pub fn vram_increment(self) -> u16 {
        if self.contains(Self::VRAM_INCREMENT) {
            32
        } else {
            1
        }
    }

    /// Background pattern table base ($0000 or $1000).
    #[must_use]
    pub fn bg_table(self) -> u16 {
        if self.contains(Self::BG_TABLE) {
            0x1000
        } else {
            0x0000
        }
    }

    /// Sprite pattern table base for 8x8 sprites.
    #[must_use]
    pub fn sprite_table(self) -> u16 {
        if self.contains(Self::SPRITE_TABLE) {
            0x1000
        } else {
            0x0000
        }
    }

    /// Sprite height in lines (8 or 16).
    #[must_use]
    pub fn sprite_height(self) -> u16 {
        if self.contains(Self::SPRITE_SIZE) {
            16
        } else {
            8
        }
    }

    /// NMI enable bit.
    #[must_use]
    pub fn nmi_enabled(self) -> bool {
        self.contains(Self::NMI_ENABLE)
    }
}

bitflags! {
    /// $2001 PPUMASK.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuMask: u8 {
        /// Grayscale: palette reads are masked to $30.
        const GRAYSCALE = 1 << 0;
        /// Show background in the left 8 pixels.
        const BG_LEFT = 1 << 1;
        /// Show sprites in the left 8 pixels.
        const SPRITE_LEFT = 1 << 2;
        /// Background rendering enable.
        const BG_ENABLE = 1 << 3;
        /// Sprite rendering enable.
        const SPRITE_ENABLE = 1 << 4;
        /// Emphasize red (green on PAL).
        const EMPHASIS_RED = 1 << 5;
        /// Emphasize green (red on PAL).
        const EMPHASIS_GREEN = 1 << 6;
        /// Emphasize blue.
        const EMPHASIS_BLUE = 1 << 7;
    }
}

impl PpuMask {
    /// True when background or sprite rendering is on; gates all scroll
    /// arithmetic and the odd-frame skip.
    #[must_use]
    pub fn rendering_enabled(self) -> bool {
        self.intersects(Self::BG_ENABLE | Self::SPRITE_ENABLE)
    }

    /// The three emphasis bits, right-aligned.
    #[must_use]
    pub fn emphasis(self) -> u8 {
        self.bits() >> 5
    }
}

bitflags! {
    /// $2002 PPUSTATUS; only the top three bits are driven.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuStatus: u8 {
        /// Sprite overflow: more than 8 sprites evaluated on a line.
        const SPRITE_OVERFLOW = 1 << 5;
        /// Sprite 0 hit.
        const SPRITE_ZERO_HIT = 1 << 6;
        /// VBlank flag.
        const VBLANK = 1 << 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_decodes_tables() {
        let ctrl = PpuCtrl::from_bits_truncate(0x18);
        assert_eq!(ctrl.bg_table(), 0x1000);
        assert_eq!(ctrl.sprite_table(), 0x1000);
        assert_eq!(ctrl.vram_increment(), 1);
        let ctrl = PpuCtrl::from_bits_truncate(0x24);
        assert_eq!(ctrl.vram_increment(), 32);
        assert_eq!(ctrl.sprite_height(), 16);
    }

    #[test]
    fn mask_rendering_gate() {
        assert!(!PpuMask::empty().rendering_enabled());
        assert!(PpuMask::BG_ENABLE.rendering_enabled());
        assert!(PpuMask::SPRITE_ENABLE.rendering_enabled());
    }

    #[test]
    fn emphasis_bits_align() {
        let mask = PpuMask::EMPHASIS_RED | PpuMask::EMPHASIS_BLUE;
        assert_eq!(mask.emphasis(), 0b101);
    }
}
