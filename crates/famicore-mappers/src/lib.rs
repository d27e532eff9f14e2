//! famicore-mappers: cartridge boards and the ROM record.
//!
//! Boards are dispatched through a closed enum rather than trait objects:
//! the set of supported mappers is small and fixed, and the hot paths
//! (`cpu_read`, `ppu_read`, `notify_a12_rise`) inline cleanly under match
//! dispatch.
//!
//! # Supported boards
//!
//! | Mapper | Board |
//! |--------|-------|
//! | 0 | NROM |
//! | 1 | MMC1 |
//! | 2 | UxROM |
//! | 3 | CNROM |
//! | 4 | MMC3 / MMC6 (submapper 1), rev-A IRQ (submapper 4) |
//! | 5 | MMC5 |
//! | 7 | AxROM |
//! | 9 | MMC2 |
//! | 21/22/23/25 | VRC2 / VRC4 |
//! | 66 | GNROM |
//! | 69 | FME-7 |

mod axrom;
mod cnrom;
mod common;
mod fme7;
mod gnrom;
mod mmc1;
mod mmc2;
mod mmc3;
mod mmc5;
mod nrom;
mod rom;
mod uxrom;
mod vrc;
mod wram;

pub use axrom::Axrom;
pub use cnrom::Cnrom;
pub use fme7::Fme7;
pub use gnrom::Gnrom;
pub use mmc1::Mmc1;
pub use mmc2::Mmc2;
pub use mmc3::{Mmc3, Mmc3IrqPolicy};
pub use mmc5::Mmc5;
pub use nrom::Nrom;
pub use rom::{Rom, RomError, TimingRegion};
pub use uxrom::Uxrom;
pub use vrc::{Vrc, VrcVariant};
pub use wram::Wram;

/// Nametable mirroring arrangements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mirroring {
    /// $2000/$2400 share CIRAM page 0, $2800/$2C00 page 1.
    #[default]
    Horizontal,
    /// $2000/$2800 share page 0, $2400/$2C00 page 1.
    Vertical,
    /// Everything maps to page 0.
    SingleScreen0,
    /// Everything maps to page 1.
    SingleScreen1,
    /// Four distinct nametables; the cartridge supplies the other 2 KiB.
    FourScreen,
}

impl Mirroring {
    /// CIRAM page (0 or 1) for a nametable address. Four-screen resolves
    /// the lower two quadrants; the upper two live on the cartridge.
    #[must_use]
    pub fn ciram_page(self, addr: u16) -> u8 {
        match self {
            Self::Horizontal => ((addr >> 11) & 1) as u8,
            Self::Vertical => ((addr >> 10) & 1) as u8,
            Self::SingleScreen0 => 0,
            Self::SingleScreen1 => 1,
            Self::FourScreen => ((addr >> 10) & 1) as u8,
        }
    }
}

/// Where a nametable access resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NtAccess {
    /// CIRAM page 0 or 1; the caller applies `addr & 0x3FF`.
    Ciram(u8),
    /// Serviced inside the mapper (ExRAM, fill mode, four-screen RAM).
    Internal(u8),
}

/// Mapper construction failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapperError {
    /// The mapper/submapper combination is not implemented.
    #[error("unsupported mapper {id} (submapper {submapper})")]
    Unsupported {
        /// iNES mapper id.
        id: u16,
        /// NES 2.0 submapper.
        submapper: u8,
    },
}

/// Battery RAM import failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BatteryError {
    /// The provided buffer does not match the declared NVRAM size.
    #[error("battery RAM size mismatch: expected {expected}, got {got}")]
    SizeMismatch {
        /// Declared NVRAM size in bytes.
        expected: usize,
        /// Provided buffer size in bytes.
        got: usize,
    },
    /// The cartridge has no battery-backed RAM.
    #[error("cartridge has no battery-backed RAM")]
    NoBattery,
}

/// The board inside a [`Mapper`].
#[derive(Debug, Clone)]
enum Board {
    Nrom(Nrom),
    Mmc1(Mmc1),
    Uxrom(Uxrom),
    Cnrom(Cnrom),
    Mmc3(Box<Mmc3>),
    Mmc5(Box<Mmc5>),
    Axrom(Axrom),
    Mmc2(Mmc2),
    Vrc(Vrc),
    Gnrom(Gnrom),
    Fme7(Fme7),
}

/// Expand `$body` once per board variant with `$b` bound to the board.
macro_rules! each_board {
    ($self:expr, $b:ident => $body:expr) => {
        match $self {
            Board::Nrom($b) => $body,
            Board::Mmc1($b) => $body,
            Board::Uxrom($b) => $body,
            Board::Cnrom($b) => $body,
            Board::Mmc3($b) => $body,
            Board::Mmc5($b) => $body,
            Board::Axrom($b) => $body,
            Board::Mmc2($b) => $body,
            Board::Vrc($b) => $body,
            Board::Gnrom($b) => $body,
            Board::Fme7($b) => $body,
        }
    };
}

/// A cartridge mapper: the board plus optional four-screen VRAM.
#[derive(Debug, Clone)]
pub struct Mapper {
    board: Board,
    id: u16,
    submapper: u8,
    /// Extra 2 KiB for four-screen boards.
    four_screen_ram: Option<Box<[u8; 0x800]>>,
}

impl Mapper {
    /// Build the board for a ROM record.
    ///
    /// # Errors
    ///
    /// [`MapperError::Unsupported`] for mapper ids outside the supported
    /// set.
    pub fn new(rom: &Rom) -> Result<Self, MapperError> {
        let board = match rom.mapper {
            0 => Board::Nrom(Nrom::new(rom)),
            1 => Board::Mmc1(Mmc1::new(rom)),
            2 => Board::Uxrom(Uxrom::new(rom)),
            3 => Board::Cnrom(Cnrom::new(rom)),
            4 => Board::Mmc3(Box::new(Mmc3::new(rom))),
            5 => Board::Mmc5(Box::new(Mmc5::new(rom))),
            7 => Board::Axrom(Axrom::new(rom)),
            9 => Board::Mmc2(Mmc2::new(rom)),
            21 | 22 | 23 | 25 => Board::Vrc(Vrc::new(rom)),
            66 => Board::Gnrom(Gnrom::new(rom)),
            69 => Board::Fme7(Fme7::new(rom)),
            id => {
                return Err(MapperError::Unsupported {
                    id,
                    submapper: rom.submapper,
                })
            }
        };
        let four_screen_ram = (rom.mirroring == Mirroring::FourScreen)
            .then(|| Box::new([0u8; 0x800]));
        Ok(Self {
            board,
            id: rom.mapper,
            submapper: rom.submapper,
            four_screen_ram,
        })
    }

    /// iNES mapper id.
    #[must_use]
    pub fn id(&self) -> u16 {
        self.id
    }

    /// NES 2.0 submapper.
    #[must_use]
    pub fn submapper(&self) -> u8 {
        self.submapper
    }

    /// CPU read in $4020-$FFFF.
    #[inline]
    pub fn cpu_read(&mut self, addr: u16) -> u8 {
        each_board!(&mut self.board, b => b.cpu_read(addr))
    }

    /// CPU write in $4020-$FFFF.
    #[inline]
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        each_board!(&mut self.board, b => b.cpu_write(addr, value));
    }

    /// PPU pattern read ($0000-$1FFF).
    #[inline]
    pub fn ppu_read(&mut self, addr: u16) -> u8 {
        each_board!(&mut self.board, b => b.ppu_read(addr))
    }

    /// PPU pattern write; only CHR RAM boards accept it.
    #[inline]
    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        each_board!(&mut self.board, b => b.ppu_write(addr, value));
    }

    /// Nametable read routing. `addr` is the offset within nametable
    /// space ($2000-relative, 0x0000-0x0FFF).
    pub fn nt_read(&mut self, addr: u16) -> NtAccess {
        if let Board::Mmc5(m) = &mut self.board {
            return m.nt_read(addr);
        }
        let mirroring = self.mirroring();
        if mirroring == Mirroring::FourScreen {
            let quadrant = (addr >> 10) & 0x03;
            if quadrant >= 2 {
                if let Some(ram) = &self.four_screen_ram {
                    let offset = usize::from(addr & 0x03FF) + usize::from(quadrant - 2) * 0x400;
                    return NtAccess::Internal(ram[offset]);
                }
            }
        }
        NtAccess::Ciram(mirroring.ciram_page(addr))
    }

    /// Nametable write routing: `Some(page)` targets CIRAM. `addr` is the
    /// nametable-space offset (0x0000-0x0FFF).
    pub fn nt_write(&mut self, addr: u16, value: u8) -> Option<u8> {
        if let Board::Mmc5(m) = &mut self.board {
            return m.nt_write(addr, value);
        }
        let mirroring = self.mirroring();
        if mirroring == Mirroring::FourScreen {
            let quadrant = (addr >> 10) & 0x03;
            if quadrant >= 2 {
                if let Some(ram) = &mut self.four_screen_ram {
                    let offset = usize::from(addr & 0x03FF) + usize::from(quadrant - 2) * 0x400;
                    ram[offset] = value;
                    return None;
                }
            }
        }
        Some(mirroring.ciram_page(addr))
    }

    /// Current mirroring mode.
    #[must_use]
    pub fn mirroring(&self) -> Mirroring {
        each_board!(&self.board, b => b.mirroring())
    }

    /// CPU-cycle tick for boards with cycle counters (FME-7).
    pub fn tick(&mut self, cpu_cycles: u32) {
        if let Board::Fme7(m) = &mut self.board {
            m.tick(cpu_cycles);
        }
    }

    /// Accepted A12 rising edge from the PPU (MMC3/MMC6 IRQ clock).
    #[inline]
    pub fn notify_a12_rise(&mut self) {
        if let Board::Mmc3(m) = &mut self.board {
            m.notify_a12_rise();
        }
    }

    /// Scanline notification for scanline-compare IRQs (MMC5).
    pub fn on_scanline(&mut self, scanline: u16, rendering: bool) {
        if let Board::Mmc5(m) = &mut self.board {
            m.on_scanline(scanline, rendering);
        }
    }

    /// Whether the mapper is asserting its IRQ line.
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        match &self.board {
            Board::Mmc3(m) => m.irq_pending(),
            Board::Mmc5(m) => m.irq_pending(),
            Board::Fme7(m) => m.irq_pending(),
            _ => false,
        }
    }

    /// Acknowledge the mapper IRQ.
    pub fn clear_irq(&mut self) {
        match &mut self.board {
            Board::Mmc3(m) => m.clear_irq(),
            Board::Mmc5(m) => m.clear_irq(),
            Board::Fme7(m) => m.clear_irq(),
            _ => {}
        }
    }

    /// Reset the board's registers.
    pub fn reset(&mut self) {
        each_board!(&mut self.board, b => b.reset());
    }

    fn wram(&self) -> Option<&Wram> {
        match &self.board {
            Board::Nrom(b) => b.wram(),
            Board::Mmc1(b) => b.wram(),
            Board::Mmc3(b) => b.wram(),
            Board::Mmc5(b) => b.wram(),
            Board::Mmc2(b) => b.wram(),
            Board::Vrc(b) => b.wram(),
            Board::Fme7(b) => b.wram(),
            _ => None,
        }
    }

    fn wram_mut(&mut self) -> Option<&mut Wram> {
        match &mut self.board {
            Board::Nrom(b) => b.wram_mut(),
            Board::Mmc1(b) => b.wram_mut(),
            Board::Mmc3(b) => b.wram_mut(),
            Board::Mmc5(b) => b.wram_mut(),
            Board::Mmc2(b) => b.wram_mut(),
            Board::Vrc(b) => b.wram_mut(),
            Board::Fme7(b) => b.wram_mut(),
            _ => None,
        }
    }

    /// Export a copy of battery-backed RAM, if the board has one.
    #[must_use]
    pub fn export_battery(&self) -> Option<Vec<u8>> {
        self.wram().and_then(Wram::export)
    }

    /// Import battery-backed RAM.
    ///
    /// # Errors
    ///
    /// [`BatteryError::NoBattery`] when the board has no NVRAM;
    /// [`BatteryError::SizeMismatch`] when the buffer size differs (the
    /// current contents are kept).
    pub fn import_battery(&mut self, data: &[u8]) -> Result<(), BatteryError> {
        match self.wram_mut() {
            Some(wram) => wram.import(data),
            None => Err(BatteryError::NoBattery),
        }
    }

    /// Direct access to the MMC3 board, for tests that exercise the IRQ
    /// policies.
    #[must_use]
    pub fn as_mmc3_mut(&mut self) -> Option<&mut Mmc3> {
        if let Board::Mmc3(m) = &mut self.board {
            Some(m.as_mut())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::TimingRegion;

    fn rom(mapper: u16) -> Rom {
        Rom {
            mapper,
            submapper: 0,
            prg_rom: vec![0; 0x8000],
            chr_rom: vec![0; 0x2000],
            prg_ram_size: 0,
            prg_nvram_size: 0x2000,
            chr_ram_size: 0,
            chr_nvram_size: 0,
            mirroring: Mirroring::Vertical,
            has_battery: true,
            trainer: None,
            timing: TimingRegion::Ntsc,
        }
    }

    #[test]
    fn supported_set_constructs() {
        for id in [0u16, 1, 2, 3, 4, 5, 7, 9, 21, 22, 23, 25, 66, 69] {
            assert!(Mapper::new(&rom(id)).is_ok(), "mapper {id}");
        }
    }

    #[test]
    fn unsupported_mapper_rejected() {
        let err = Mapper::new(&rom(210)).unwrap_err();
        assert_eq!(
            err,
            MapperError::Unsupported {
                id: 210,
                submapper: 0
            }
        );
    }

    #[test]
    fn mirroring_pages() {
        assert_eq!(Mirroring::Horizontal.ciram_page(0x2000 & 0x0FFF), 0);
        assert_eq!(Mirroring::Horizontal.ciram_page(0x0400), 0);
        assert_eq!(Mirroring::Horizontal.ciram_page(0x0800), 1);
        assert_eq!(Mirroring::Vertical.ciram_page(0x0400), 1);
        assert_eq!(Mirroring::Vertical.ciram_page(0x0800), 0);
        assert_eq!(Mirroring::SingleScreen1.ciram_page(0x0000), 1);
    }

    #[test]
    fn battery_roundtrip_through_mapper() {
        let mut m = Mapper::new(&rom(0)).unwrap();
        m.cpu_write(0x6000, 0x42);
        let saved = m.export_battery().unwrap();
        assert_eq!(saved[0], 0x42);

        let mut fresh = Mapper::new(&rom(0)).unwrap();
        fresh.import_battery(&saved).unwrap();
        assert_eq!(fresh.cpu_read(0x6000), 0x42);
    }

    #[test]
    fn battery_import_size_mismatch_keeps_contents() {
        let mut m = Mapper::new(&rom(0)).unwrap();
        m.cpu_write(0x6000, 0x55);
        let err = m.import_battery(&[0; 16]).unwrap_err();
        assert!(matches!(err, BatteryError::SizeMismatch { .. }));
        assert_eq!(m.cpu_read(0x6000), 0x55);
    }

    #[test]
    fn four_screen_ram_services_upper_quadrants() {
        let mut r = rom(0);
        r.mirroring = Mirroring::FourScreen;
        let mut m = Mapper::new(&r).unwrap();
        assert!(m.nt_write(0x0800, 0x99).is_none());
        assert_eq!(m.nt_read(0x0800), NtAccess::Internal(0x99));
        // Lower quadrants still hit CIRAM.
        assert!(matches!(m.nt_read(0x0000), NtAccess::Ciram(0)));
    }
}
