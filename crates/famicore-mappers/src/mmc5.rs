//! MMC5 (mapper 5): flexible PRG/CHR windows, ExRAM nametables, fill mode,
//! a scanline-compare IRQ, and the 8x8 multiplier.
//!
//! Nametable routing is fully mapper-controlled: $5105 assigns each
//! quadrant to a CIRAM page, to ExRAM, or to the fill tile/attribute
//! registers. The scanline IRQ compares against a target line and raises
//! at the start of that line while the frame is being rendered.

use crate::common::{prg_banks, prg_read, Chr};
use crate::rom::Rom;
use crate::wram::Wram;
use crate::{Mirroring, NtAccess};

/// MMC5 board.
#[derive(Debug, Clone)]
pub struct Mmc5 {
    prg: Vec<u8>,
    chr: Chr,
    wram: Wram,

    /// $5100: PRG window mode 0-3.
    prg_mode: u8,
    /// $5101: CHR window mode 0-3.
    chr_mode: u8,
    /// $5113-$5117: RAM bank plus four ROM/RAM window registers.
    prg_regs: [u8; 5],
    /// $5120-$5127.
    chr_regs: [u8; 8],

    /// 1 KiB ExRAM ($5C00-$5FFF).
    exram: Box<[u8; 0x400]>,
    /// $5104: nametable / extended-attribute / CPU RW / CPU RO.
    exram_mode: u8,
    /// $5105: per-quadrant nametable source.
    nt_mapping: u8,
    /// $5106 / $5107.
    fill_tile: u8,
    fill_attr: u8,
    /// Offset of the last plain nametable fetch, for extended attributes.
    last_nt_offset: u16,

    /// $5203 / $5204.
    irq_target: u8,
    irq_enabled: bool,
    irq_pending: bool,
    in_frame: bool,

    /// $5205 / $5206 multiplier factors.
    mult_a: u8,
    mult_b: u8,

    mirroring: Mirroring,
}

impl Mmc5 {
    /// Build from a ROM record. Power-on maps the last bank everywhere.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        Self {
            prg: rom.prg_rom.clone(),
            chr: Chr::from_rom(rom),
            wram: Wram::from_rom(rom),
            prg_mode: 3,
            chr_mode: 3,
            prg_regs: [0, 0xFF, 0xFF, 0xFF, 0xFF],
            chr_regs: [0; 8],
            exram: Box::new([0; 0x400]),
            exram_mode: 0,
            nt_mapping: 0,
            fill_tile: 0,
            fill_attr: 0,
            last_nt_offset: 0,
            irq_target: 0,
            irq_enabled: false,
            irq_pending: false,
            in_frame: false,
            mult_a: 0xFF,
            mult_b: 0xFF,
            mirroring: rom.mirroring,
        }
    }

    /// CPU read: control registers, ExRAM, WRAM, banked PRG.
    #[must_use]
    pub fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x5204 => {
                let status =
                    (u8::from(self.irq_pending) << 7) | (u8::from(self.in_frame) << 6);
                self.irq_pending = false;
                status
            }
            0x5205 => (u16::from(self.mult_a) * u16::from(self.mult_b)) as u8,
            0x5206 => ((u16::from(self.mult_a) * u16::from(self.mult_b)) >> 8) as u8,
            0x5C00..=0x5FFF => {
                if self.exram_mode >= 2 {
                    self.exram[usize::from(addr - 0x5C00)]
                } else {
                    0
                }
            }
            0x6000..=0x7FFF => self.wram.read(
                usize::from(self.prg_regs[0] & 0x0F) * 0x2000 + usize::from(addr - 0x6000),
            ),
            0x8000..=0xFFFF => self.read_prg_window(addr),
            _ => 0,
        }
    }

    /// 8 KiB window view of the current PRG mode.
    fn read_prg_window(&self, addr: u16) -> u8 {
        let slot = usize::from((addr - 0x8000) >> 13); // 0-3
        let offset = usize::from(addr & 0x1FFF);
        let rom_bank = |reg: u8| usize::from(reg & 0x7F);

        let bank = match self.prg_mode {
            0 => rom_bank(self.prg_regs[4] & 0x7C) + slot,
            1 => {
                if slot < 2 {
                    rom_bank(self.prg_regs[2] & 0x7E) + slot
                } else {
                    rom_bank(self.prg_regs[4] & 0x7E) + (slot - 2)
                }
            }
            2 => match slot {
                0 | 1 => rom_bank(self.prg_regs[2] & 0x7E) + slot,
                2 => rom_bank(self.prg_regs[3]),
                _ => rom_bank(self.prg_regs[4]),
            },
            _ => rom_bank(self.prg_regs[1 + slot]),
        };
        prg_read(&self.prg, bank % prg_banks(&self.prg, 0x2000), 0x2000, offset)
    }

    /// CPU write.
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x5100 => self.prg_mode = value & 0x03,
            0x5101 => self.chr_mode = value & 0x03,
            0x5104 => self.exram_mode = value & 0x03,
            0x5105 => self.nt_mapping = value,
            0x5106 => self.fill_tile = value,
            0x5107 => self.fill_attr = value & 0x03,
            0x5113..=0x5117 => self.prg_regs[usize::from(addr - 0x5113)] = value,
            0x5120..=0x5127 => self.chr_regs[usize::from(addr - 0x5120)] = value,
            0x5203 => self.irq_target = value,
            0x5204 => self.irq_enabled = value & 0x80 != 0,
            0x5205 => self.mult_a = value,
            0x5206 => self.mult_b = value,
            0x5C00..=0x5FFF => {
                // ExRAM is CPU-writable except in read-only mode 3.
                if self.exram_mode != 3 {
                    self.exram[usize::from(addr - 0x5C00)] = value;
                }
            }
            0x6000..=0x7FFF => {
                let offset = usize::from(self.prg_regs[0] & 0x0F) * 0x2000
                    + usize::from(addr - 0x6000);
                self.wram.write(offset, value);
            }
            _ => log::debug!("unhandled MMC5 write {addr:#06x} = {value:#04x}"),
        }
    }

    /// 1 KiB-granular CHR slot decode for the current mode.
    fn chr_slot(&self, addr: u16) -> (usize, usize) {
        let addr = addr & 0x1FFF;
        let slot_1k = usize::from(addr >> 10); // 0-7
        match self.chr_mode {
            0 => (usize::from(self.chr_regs[7]) * 8 + slot_1k, 0x2000),
            1 => {
                let reg = if slot_1k < 4 { 3 } else { 7 };
                (
                    usize::from(self.chr_regs[reg]) * 4 + (slot_1k & 3),
                    0x1000,
                )
            }
            2 => {
                let reg = slot_1k / 2 * 2 + 1;
                (
                    usize::from(self.chr_regs[reg]) * 2 + (slot_1k & 1),
                    0x800,
                )
            }
            _ => (usize::from(self.chr_regs[slot_1k]), 0x400),
        }
    }

    /// Banked CHR read.
    #[must_use]
    pub fn ppu_read(&mut self, addr: u16) -> u8 {
        let (bank_1k, _) = self.chr_slot(addr);
        self.chr
            .read_banked(bank_1k, 0x400, usize::from(addr & 0x03FF))
    }

    /// Banked CHR write.
    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        let (bank_1k, _) = self.chr_slot(addr);
        self.chr
            .write_banked(bank_1k, 0x400, usize::from(addr & 0x03FF), value);
    }

    /// Nametable access routing per $5105.
    pub fn nt_read(&mut self, addr: u16) -> NtAccess {
        let offset = addr & 0x03FF;
        let quadrant = (addr >> 10) & 0x03;
        let source = (self.nt_mapping >> (quadrant * 2)) & 0x03;

        // Extended attribute mode substitutes the attribute fetch with the
        // top bits of the ExRAM byte for the last tile fetched.
        if self.exram_mode == 1 && offset >= 0x3C0 {
            let attr = self.exram[usize::from(self.last_nt_offset & 0x3FF)] >> 6;
            return NtAccess::Internal(attr * 0x55);
        }
        if offset < 0x3C0 {
            self.last_nt_offset = offset;
        }

        match source {
            0 | 1 => NtAccess::Ciram(source),
            2 => {
                if self.exram_mode < 2 {
                    NtAccess::Internal(self.exram[usize::from(offset)])
                } else {
                    NtAccess::Internal(0)
                }
            }
            _ => {
                if offset >= 0x3C0 {
                    NtAccess::Internal(self.fill_attr * 0x55)
                } else {
                    NtAccess::Internal(self.fill_tile)
                }
            }
        }
    }

    /// Nametable write routing: `Some(page)` for CIRAM, `None` when
    /// handled internally.
    pub fn nt_write(&mut self, addr: u16, value: u8) -> Option<u8> {
        let offset = addr & 0x03FF;
        let quadrant = (addr >> 10) & 0x03;
        let source = (self.nt_mapping >> (quadrant * 2)) & 0x03;
        match source {
            0 | 1 => Some(source),
            2 => {
                if self.exram_mode < 2 {
                    self.exram[usize::from(offset)] = value;
                }
                None
            }
            _ => None, // fill mode ignores writes
        }
    }

    /// Scanline notification from the scheduler (dot 0 of each line).
    /// Any rendered visible line marks the frame as in progress; VBlank or
    /// disabled rendering ends it.
    pub fn on_scanline(&mut self, scanline: u16, rendering: bool) {
        if !rendering || scanline >= 240 {
            self.in_frame = false;
            return;
        }
        self.in_frame = true;
        if scanline != 0 && u16::from(self.irq_target) == scanline {
            self.irq_pending = true;
        }
    }

    /// IRQ line: pending and enabled.
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.irq_pending && self.irq_enabled
    }

    /// Acknowledge the IRQ.
    pub fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    /// Header mirroring; nametable routing normally goes through
    /// [`Mmc5::nt_read`] instead.
    #[must_use]
    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    /// Reset restores power-on register state; ExRAM survives.
    pub fn reset(&mut self) {
        self.prg_mode = 3;
        self.chr_mode = 3;
        self.prg_regs = [0, 0xFF, 0xFF, 0xFF, 0xFF];
        self.chr_regs = [0; 8];
        self.exram_mode = 0;
        self.nt_mapping = 0;
        self.fill_tile = 0;
        self.fill_attr = 0;
        self.irq_target = 0;
        self.irq_enabled = false;
        self.irq_pending = false;
        self.in_frame = false;
    }

    /// Work RAM for battery handling.
    #[must_use]
    pub fn wram(&self) -> Option<&Wram> {
        Some(&self.wram)
    }

    /// Mutable work RAM.
    pub fn wram_mut(&mut self) -> Option<&mut Wram> {
        Some(&mut self.wram)
    }
}
