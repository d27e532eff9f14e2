//! Cartridge ROM record and iNES / NES 2.0 header parsing.

use crate::Mirroring;

/// Errors from ROM image parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RomError {
    /// File shorter than the 16-byte header.
    #[error("ROM image too small: {0} bytes")]
    TooSmall(usize),

    /// Bad magic number.
    #[error("invalid iNES magic: {0:02X?}")]
    BadMagic([u8; 4]),

    /// Declared PRG/CHR sizes exceed the file.
    #[error("ROM data truncated: header declares {expected} bytes, file has {actual}")]
    Truncated {
        /// Bytes the header declares.
        expected: usize,
        /// Bytes actually present after the header.
        actual: usize,
    },

    /// NES 2.0 exponent-encoded size too large to represent.
    #[error("unrepresentable NES 2.0 ROM size field {0:#04x}")]
    BadSizeField(u8),
}

/// CPU/PPU timing region declared by the cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingRegion {
    /// NTSC NES (RP2C02).
    #[default]
    Ntsc,
    /// PAL NES (RP2C07).
    Pal,
    /// Region-free / multi-region.
    Multi,
    /// Dendy clones (UA6538).
    Dendy,
}

/// Parsed cartridge image: the structured record the system consumes.
#[derive(Debug, Clone)]
pub struct Rom {
    /// iNES mapper number.
    pub mapper: u16,
    /// NES 2.0 submapper.
    pub submapper: u8,
    /// PRG ROM payload.
    pub prg_rom: Vec<u8>,
    /// CHR ROM payload; empty means the board carries CHR RAM.
    pub chr_rom: Vec<u8>,
    /// Volatile PRG RAM size in bytes.
    pub prg_ram_size: usize,
    /// Battery-backed PRG NVRAM size in bytes.
    pub prg_nvram_size: usize,
    /// CHR RAM size in bytes (used when `chr_rom` is empty).
    pub chr_ram_size: usize,
    /// Battery-backed CHR NVRAM size in bytes.
    pub chr_nvram_size: usize,
    /// Header-declared nametable mirroring.
    pub mirroring: Mirroring,
    /// Battery-backed RAM present.
    pub has_battery: bool,
    /// 512-byte trainer block, loaded into WRAM at CPU $7000.
    pub trainer: Option<Vec<u8>>,
    /// Timing region.
    pub timing: TimingRegion,
}

impl Rom {
    const MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

    /// Parse an iNES or NES 2.0 image.
    ///
    /// # Errors
    ///
    /// Returns [`RomError`] for short files, bad magic, truncated payloads,
    /// or unrepresentable NES 2.0 size fields.
    pub fn parse(data: &[u8]) -> Result<Self, RomError> {
        if data.len() < 16 {
            return Err(RomError::TooSmall(data.len()));
        }
        let magic = [data[0], data[1], data[2], data[3]];
        if magic != Self::MAGIC {
            return Err(RomError::BadMagic(magic));
        }

        let nes2 = data[7] & 0x0C == 0x08;

        let (mapper, submapper) = if nes2 {
            let mapper = u16::from(data[6] >> 4)
                | (u16::from(data[7]) & 0xF0)
                | (u16::from(data[8] & 0x0F) << 8);
            (mapper, data[8] >> 4)
        } else {
            (u16::from(data[6] >> 4) | (u16::from(data[7]) & 0xF0), 0)
        };

        let prg_rom_size = if nes2 {
            nes2_rom_size(data[4], data[9] & 0x0F, 16 * 1024)?
        } else {
            usize::from(data[4]) * 16 * 1024
        };
        let chr_rom_size = if nes2 {
            nes2_rom_size(data[5], data[9] >> 4, 8 * 1024)?
        } else {
            usize::from(data[5]) * 8 * 1024
        };

        let has_battery = data[6] & 0x02 != 0;
        let has_trainer = data[6] & 0x04 != 0;
        let mirroring = if data[6] & 0x08 != 0 {
            Mirroring::FourScreen
        } else if data[6] & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let (prg_ram_size, prg_nvram_size, chr_ram_size, chr_nvram_size) = if nes2 {
            (
                nes2_ram_size(data[10] & 0x0F),
                nes2_ram_size(data[10] >> 4),
                nes2_ram_size(data[11] & 0x0F),
                nes2_ram_size(data[11] >> 4),
            )
        } else {
            // Legacy images: assume 8 KiB work RAM, CHR RAM when no CHR ROM.
            let prg_ram = usize::from(data[8].max(1)) * 8 * 1024;
            let chr_ram = if chr_rom_size == 0 { 8 * 1024 } else { 0 };
            if has_battery {
                (0, prg_ram, chr_ram, 0)
            } else {
                (prg_ram, 0, chr_ram, 0)
            }
        };

        let timing = if nes2 {
            match data[12] & 0x03 {
                0 => TimingRegion::Ntsc,
                1 => TimingRegion::Pal,
                2 => TimingRegion::Multi,
                _ => TimingRegion::Dendy,
            }
        } else {
            TimingRegion::Ntsc
        };

        let mut offset = 16;
        let mut trainer = None;
        if has_trainer {
            if data.len() < offset + 512 {
                return Err(RomError::Truncated {
                    expected: 512,
                    actual: data.len() - offset,
                });
            }
            trainer = Some(data[offset..offset + 512].to_vec());
            offset += 512;
        }
        let expected = prg_rom_size + chr_rom_size;
        if data.len() < offset + expected {
            return Err(RomError::Truncated {
                expected,
                actual: data.len().saturating_sub(offset),
            });
        }

        let prg_rom = data[offset..offset + prg_rom_size].to_vec();
        let chr_rom = data[offset + prg_rom_size..offset + expected].to_vec();

        Ok(Self {
            mapper,
            submapper,
            prg_rom,
            chr_rom,
            prg_ram_size,
            prg_nvram_size,
            chr_ram_size,
            chr_nvram_size,
            mirroring,
            has_battery,
            trainer,
            timing,
        })
    }

    /// Effective CHR RAM size: the declared field, defaulting to 8 KiB
    /// when the board has no CHR ROM and no declared RAM.
    #[must_use]
    pub fn effective_chr_ram(&self) -> usize {
        if self.chr_rom.is_empty() && self.chr_ram_size == 0 && self.chr_nvram_size == 0 {
            8 * 1024
        } else {
            self.chr_ram_size + self.chr_nvram_size
        }
    }

    /// Effective PRG RAM size (volatile + battery), defaulting to 8 KiB.
    #[must_use]
    pub fn effective_prg_ram(&self) -> usize {
        let declared = self.prg_ram_size + self.prg_nvram_size;
        if declared == 0 {
            8 * 1024
        } else {
            declared
        }
    }
}

/// NES 2.0 ROM size: either `msb:lsb` in units, or the exponent form when
/// the high nibble is $F.
fn nes2_rom_size(lsb: u8, msb: u8, unit: usize) -> Result<usize, RomError> {
    if msb == 0x0F {
        let exponent = u32::from(lsb >> 2);
        let multiplier = usize::from(lsb & 0x03) * 2 + 1;
        if exponent > 40 {
            return Err(RomError::BadSizeField(lsb));
        }
        Ok((1usize << exponent) * multiplier)
    } else {
        Ok(((usize::from(msb) << 8) | usize::from(lsb)) * unit)
    }
}

/// NES 2.0 RAM size nibble: 0 means none, otherwise 64 << n bytes.
fn nes2_ram_size(nibble: u8) -> usize {
    if nibble == 0 {
        0
    } else {
        64 << usize::from(nibble)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal iNES image: 1x16K PRG, 1x8K CHR.
    fn ines_image(flags6: u8, flags7: u8) -> Vec<u8> {
        let mut data = vec![0u8; 16 + 16 * 1024 + 8 * 1024];
        data[0..4].copy_from_slice(&Rom::MAGIC);
        data[4] = 1;
        data[5] = 1;
        data[6] = flags6;
        data[7] = flags7;
        data
    }

    #[test]
    fn parses_legacy_ines() {
        let rom = Rom::parse(&ines_image(0x01, 0x00)).unwrap();
        assert_eq!(rom.mapper, 0);
        assert_eq!(rom.prg_rom.len(), 16 * 1024);
        assert_eq!(rom.chr_rom.len(), 8 * 1024);
        assert_eq!(rom.mirroring, Mirroring::Vertical);
        assert!(!rom.has_battery);
    }

    #[test]
    fn mapper_nibbles_combine() {
        let rom = Rom::parse(&ines_image(0x40, 0x00)).unwrap();
        assert_eq!(rom.mapper, 4);
        let rom = Rom::parse(&ines_image(0x00, 0x40)).unwrap();
        assert_eq!(rom.mapper, 64);
    }

    #[test]
    fn nes2_mapper_and_submapper() {
        let mut data = ines_image(0x40, 0x08);
        data[8] = 0x10; // submapper 1
        let rom = Rom::parse(&data).unwrap();
        assert_eq!(rom.mapper, 4);
        assert_eq!(rom.submapper, 1);
    }

    #[test]
    fn nes2_ram_nibbles() {
        let mut data = ines_image(0x02, 0x08);
        data[10] = 0x70; // 8 KiB NVRAM, no volatile RAM
        let rom = Rom::parse(&data).unwrap();
        assert_eq!(rom.prg_nvram_size, 8 * 1024);
        assert_eq!(rom.prg_ram_size, 0);
        assert!(rom.has_battery);
    }

    #[test]
    fn four_screen_flag_wins() {
        let rom = Rom::parse(&ines_image(0x09, 0x00)).unwrap();
        assert_eq!(rom.mirroring, Mirroring::FourScreen);
    }

    #[test]
    fn trainer_block_is_captured() {
        let mut data = ines_image(0x04, 0x00);
        // Insert 512 trainer bytes between the header and PRG.
        let mut trainer = vec![0xAB; 512];
        trainer[511] = 0xCD;
        data.splice(16..16, trainer);
        let rom = Rom::parse(&data).unwrap();
        let captured = rom.trainer.unwrap();
        assert_eq!(captured.len(), 512);
        assert_eq!(captured[0], 0xAB);
        assert_eq!(captured[511], 0xCD);
        assert_eq!(rom.prg_rom.len(), 16 * 1024);
    }

    #[test]
    fn missing_trainer_is_none() {
        let rom = Rom::parse(&ines_image(0x00, 0x00)).unwrap();
        assert!(rom.trainer.is_none());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = ines_image(0, 0);
        data[0] = b'X';
        assert!(matches!(Rom::parse(&data), Err(RomError::BadMagic(_))));
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut data = ines_image(0, 0);
        data.truncate(16 + 1024);
        assert!(matches!(Rom::parse(&data), Err(RomError::Truncated { .. })));
    }

    #[test]
    fn chr_ram_default_when_no_chr_rom() {
        let mut data = ines_image(0, 0);
        data[5] = 0;
        data.truncate(16 + 16 * 1024);
        let rom = Rom::parse(&data).unwrap();
        assert!(rom.chr_rom.is_empty());
        assert_eq!(rom.effective_chr_ram(), 8 * 1024);
    }

    #[test]
    fn nes2_timing_region() {
        let mut data = ines_image(0x00, 0x08);
        data[12] = 0x01;
        assert_eq!(Rom::parse(&data).unwrap().timing, TimingRegion::Pal);
    }
}
