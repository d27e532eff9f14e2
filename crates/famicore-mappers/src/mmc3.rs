//! MMC3 / MMC6 (mapper 4): fine-grained banking and the A12 scanline IRQ.
//!
//! Eight bank registers are selected through $8000 and loaded through
//! $8001. The IRQ counter is clocked exclusively by accepted A12 rising
//! edges delivered from the PPU's deglitch filter via
//! [`Mmc3::notify_a12_rise`].

use crate::common::{prg_banks, prg_read, Chr};
use crate::rom::Rom;
use crate::wram::Wram;
use crate::Mirroring;

/// IRQ counter policy, selected by submapper.
///
/// `Standard` asserts only on a decrement that reaches zero. `RevA`
/// (submapper 4, "1-clocking") additionally asserts on a reload that lands
/// on zero when the latch itself is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mmc3IrqPolicy {
    /// MMC3 rev B and later: assert on decrement-to-zero.
    #[default]
    Standard,
    /// MMC3 rev A: also assert on reload-to-zero with a zero latch.
    RevA,
}

/// MMC3/MMC6 board.
#[derive(Debug, Clone)]
pub struct Mmc3 {
    prg: Vec<u8>,
    chr: Chr,
    wram: Wram,
    /// MMC6 (submapper 1) gates a 1 KiB WRAM instead of 8 KiB.
    mmc6: bool,

    /// Bank register select (0-7).
    bank_select: u8,
    /// R0-R7.
    banks: [u8; 8],
    /// PRG mode: swaps the $8000/$C000 slots.
    prg_swap: bool,
    /// CHR mode: swaps the 2x2K and 4x1K halves.
    chr_invert: bool,

    mirroring: Mirroring,
    /// Header four-screen overrides the $A000 register.
    four_screen: bool,

    /// IRQ state per the A12-clocked counter.
    irq_latch: u8,
    irq_counter: u8,
    irq_reload_pending: bool,
    irq_enabled: bool,
    irq_pending: bool,
    policy: Mmc3IrqPolicy,
}

impl Mmc3 {
    /// Build from a ROM record; submapper 1 selects MMC6, submapper 4 the
    /// rev-A IRQ policy.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let mmc6 = rom.submapper == 1;
        let policy = if rom.submapper == 4 {
            Mmc3IrqPolicy::RevA
        } else {
            Mmc3IrqPolicy::Standard
        };
        Self {
            prg: rom.prg_rom.clone(),
            chr: Chr::from_rom(rom),
            wram: if mmc6 {
                Wram::with_size(0x400, rom.has_battery)
            } else {
                Wram::from_rom(rom)
            },
            mmc6,
            bank_select: 0,
            banks: [0; 8],
            prg_swap: false,
            chr_invert: false,
            mirroring: rom.mirroring,
            four_screen: rom.mirroring == Mirroring::FourScreen,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload_pending: false,
            irq_enabled: false,
            irq_pending: false,
            policy,
        }
    }

    /// Override the IRQ policy (testing hook).
    pub fn set_irq_policy(&mut self, policy: Mmc3IrqPolicy) {
        self.policy = policy;
    }

    /// CPU read.
    #[must_use]
    pub fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.wram.read(usize::from(addr - 0x6000)),
            0x8000..=0xFFFF => {
                let offset = usize::from(addr & 0x1FFF);
                prg_read(&self.prg, self.prg_slot(addr), 0x2000, offset)
            }
            _ => 0,
        }
    }

    fn prg_slot(&self, addr: u16) -> usize {
        let last = prg_banks(&self.prg, 0x2000) - 1;
        match (addr >> 13) & 0x03 {
            0 => {
                if self.prg_swap {
                    last - 1
                } else {
                    usize::from(self.banks[6])
                }
            }
            1 => usize::from(self.banks[7]),
            2 => {
                if self.prg_swap {
                    usize::from(self.banks[6])
                } else {
                    last - 1
                }
            }
            _ => last,
        }
    }

    /// CPU write: registers are paired on even/odd addresses.
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        match (addr, addr & 1) {
            (0x6000..=0x7FFF, _) => self.wram.write(usize::from(addr - 0x6000), value),
            (0x8000..=0x9FFF, 0) => {
                self.bank_select = value & 0x07;
                self.prg_swap = value & 0x40 != 0;
                self.chr_invert = value & 0x80 != 0;
            }
            (0x8000..=0x9FFF, _) => {
                self.banks[usize::from(self.bank_select)] = value;
            }
            (0xA000..=0xBFFF, 0) => {
                if !self.four_screen {
                    self.mirroring = if value & 0x01 != 0 {
                        Mirroring::Horizontal
                    } else {
                        Mirroring::Vertical
                    };
                }
            }
            (0xA000..=0xBFFF, _) => {
                // PRG-RAM protect: bit 7 chip enable, bit 6 write protect.
                // MMC6 uses the same bits to gate its 1 KiB RAM.
                self.wram.set_enabled(value & 0x80 != 0);
                self.wram.set_write_protected(value & 0x40 != 0);
            }
            (0xC000..=0xDFFF, 0) => self.irq_latch = value,
            (0xC000..=0xDFFF, _) => {
                self.irq_counter = 0;
                self.irq_reload_pending = true;
            }
            (0xE000..=0xFFFF, 0) => {
                self.irq_enabled = false;
                self.irq_pending = false;
            }
            (0xE000..=0xFFFF, _) => self.irq_enabled = true,
            _ => {}
        }
    }

    /// Banked CHR read.
    #[must_use]
    pub fn ppu_read(&mut self, addr: u16) -> u8 {
        let (bank, offset) = self.chr_slot(addr);
        self.chr.read_banked(bank, 0x400, offset)
    }

    /// Banked CHR write (CHR RAM boards).
    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        let (bank, offset) = self.chr_slot(addr);
        self.chr.write_banked(bank, 0x400, offset, value);
    }

    /// 1 KiB CHR bank and offset for a PPU address, honoring inversion.
    fn chr_slot(&self, addr: u16) -> (usize, usize) {
        let addr = if self.chr_invert {
            addr ^ 0x1000
        } else {
            addr
        } & 0x1FFF;
        let offset = usize::from(addr & 0x03FF);
        let bank = match addr {
            // 2 KiB regions: R0/R1 with bit 0 forced clear.
            0x0000..=0x07FF => usize::from(self.banks[0] & 0xFE) + usize::from((addr >> 10) & 1),
            0x0800..=0x0FFF => usize::from(self.banks[1] & 0xFE) + usize::from((addr >> 10) & 1),
            // 1 KiB regions: R2-R5.
            _ => usize::from(self.banks[2 + usize::from((addr - 0x1000) >> 10)]),
        };
        (bank, offset)
    }

    /// Accepted A12 rising edge from the PPU filter: clock the IRQ counter
    /// per the active policy.
    pub fn notify_a12_rise(&mut self) {
        let reloaded = self.irq_counter == 0 || self.irq_reload_pending;
        if reloaded {
            self.irq_counter = self.irq_latch;
            self.irq_reload_pending = false;
        } else {
            self.irq_counter -= 1;
        }

        let zero = self.irq_counter == 0;
        let assert = match self.policy {
            Mmc3IrqPolicy::Standard => zero && !reloaded,
            Mmc3IrqPolicy::RevA => (zero && !reloaded) || (zero && reloaded && self.irq_latch == 0),
        };
        if assert && self.irq_enabled {
            self.irq_pending = true;
        }
    }

    /// IRQ line state.
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    /// Acknowledge the IRQ without touching the enable bit.
    pub fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    /// Mirroring, register- or header-controlled.
    #[must_use]
    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    /// Whether this board is an MMC6.
    #[must_use]
    pub fn is_mmc6(&self) -> bool {
        self.mmc6
    }

    /// Reset clears banking and IRQ state.
    pub fn reset(&mut self) {
        self.bank_select = 0;
        self.banks = [0; 8];
        self.prg_swap = false;
        self.chr_invert = false;
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_reload_pending = false;
        self.irq_enabled = false;
        self.irq_pending = false;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::TimingRegion;

    fn mmc3_rom(submapper: u8) -> Rom {
        let mut prg = vec![0; 0x2000 * 8];
        for bank in 0..8 {
            prg[bank * 0x2000] = bank as u8;
        }
        let mut chr = vec![0; 0x400 * 16];
        for bank in 0..16 {
            chr[bank * 0x400] = 0x80 + bank as u8;
        }
        Rom {
            mapper: 4,
            submapper,
            prg_rom: prg,
            chr_rom: chr,
            prg_ram_size: 0x2000,
            prg_nvram_size: 0,
            chr_ram_size: 0,
            chr_nvram_size: 0,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
            trainer: None,
            timing: TimingRegion::Ntsc,
        }
    }

    fn mmc3() -> Mmc3 {
        Mmc3::new(&mmc3_rom(0))
    }

    fn set_bank(m: &mut Mmc3, reg: u8, value: u8) {
        m.cpu_write(0x8000, reg);
        m.cpu_write(0x8001, value);
    }

    #[test]
    fn prg_modes_swap_slots() {
        let mut m = mmc3();
        set_bank(&mut m, 6, 2);
        set_bank(&mut m, 7, 3);
        assert_eq!(m.cpu_read(0x8000), 2);
        assert_eq!(m.cpu_read(0xA000), 3);
        assert_eq!(m.cpu_read(0xC000), 6); // second-to-last
        assert_eq!(m.cpu_read(0xE000), 7); // last

        // PRG swap mode: $8000 and $C000 trade places.
        m.cpu_write(0x8000, 0x46);
        m.cpu_write(0x8001, 2);
        assert_eq!(m.cpu_read(0x8000), 6);
        assert_eq!(m.cpu_read(0xC000), 2);
        assert_eq!(m.cpu_read(0xE000), 7);
    }

    #[test]
    fn chr_banking_and_inversion() {
        let mut m = mmc3();
        set_bank(&mut m, 0, 4); // 2K at $0000 -> banks 4,5
        set_bank(&mut m, 2, 8); // 1K at $1000
        assert_eq!(m.ppu_read(0x0000), 0x84);
        assert_eq!(m.ppu_read(0x0400), 0x85);
        assert_eq!(m.ppu_read(0x1000), 0x88);

        // Inversion swaps the halves.
        m.cpu_write(0x8000, 0x80);
        assert_eq!(m.ppu_read(0x1000), 0x84);
        assert_eq!(m.ppu_read(0x0000), 0x88);
    }

    #[test]
    fn irq_counts_down_from_latch() {
        let mut m = mmc3();
        m.cpu_write(0xC000, 3); // latch
        m.cpu_write(0xC001, 0); // reload pending
        m.cpu_write(0xE001, 0); // enable

        m.notify_a12_rise(); // reload -> 3
        m.notify_a12_rise(); // 2
        m.notify_a12_rise(); // 1
        assert!(!m.irq_pending());
        m.notify_a12_rise(); // 0 -> assert
        assert!(m.irq_pending());
        m.clear_irq();
        assert!(!m.irq_pending());
    }

    #[test]
    fn single_reload_for_multiple_c001_writes() {
        let mut m = mmc3();
        m.cpu_write(0xC000, 2);
        m.cpu_write(0xC001, 0);
        m.cpu_write(0xC001, 0);
        m.cpu_write(0xC001, 0);
        m.cpu_write(0xE001, 0);

        m.notify_a12_rise(); // one reload, C=2
        m.notify_a12_rise(); // C=1
        m.notify_a12_rise(); // C=0 -> assert
        assert!(m.irq_pending());
    }

    #[test]
    fn latch_change_applies_on_next_reload() {
        let mut m = mmc3();
        m.cpu_write(0xC000, 5);
        m.cpu_write(0xC001, 0);
        m.cpu_write(0xE001, 0);
        m.notify_a12_rise(); // C=5
        m.cpu_write(0xC000, 1); // new latch, counter unaffected
        m.notify_a12_rise(); // C=4
        assert!(!m.irq_pending());
        for _ in 0..4 {
            m.notify_a12_rise();
        }
        assert!(m.irq_pending()); // counted down from 5, not 1
    }

    #[test]
    fn e000_disables_and_acks() {
        let mut m = mmc3();
        m.cpu_write(0xC000, 1);
        m.cpu_write(0xC001, 0);
        m.cpu_write(0xE001, 0);
        m.notify_a12_rise(); // reload 1
        m.notify_a12_rise(); // 0 -> assert
        assert!(m.irq_pending());
        m.cpu_write(0xE000, 0);
        assert!(!m.irq_pending());
        // Disabled: further zero transitions do not assert.
        m.notify_a12_rise(); // reload
        m.notify_a12_rise(); // to zero
        assert!(!m.irq_pending());
    }

    #[test]
    fn enable_does_not_assert_retroactively() {
        let mut m = mmc3();
        m.cpu_write(0xC000, 1);
        m.cpu_write(0xC001, 0);
        m.notify_a12_rise(); // reload 1
        m.notify_a12_rise(); // decrement to 0 while disabled
        m.cpu_write(0xE001, 0);
        assert!(!m.irq_pending());
    }

    #[test]
    fn rev_a_zero_latch_asserts_on_reload() {
        let mut m = Mmc3::new(&mmc3_rom(4));
        m.cpu_write(0xC000, 0);
        m.cpu_write(0xC001, 0);
        m.cpu_write(0xE001, 0);
        m.notify_a12_rise(); // reload to zero with latch 0
        assert!(m.irq_pending());

        // Standard policy stays quiet in the same situation.
        let mut m = mmc3();
        m.cpu_write(0xC000, 0);
        m.cpu_write(0xC001, 0);
        m.cpu_write(0xE001, 0);
        m.notify_a12_rise();
        assert!(!m.irq_pending());
    }

    #[test]
    fn mmc6_uses_1k_wram() {
        let m = Mmc3::new(&mmc3_rom(1));
        assert!(m.is_mmc6());
    }

    #[test]
    fn mirroring_register() {
        let mut m = mmc3();
        m.cpu_write(0xA000, 0);
        assert_eq!(m.mirroring(), Mirroring::Vertical);
        m.cpu_write(0xA000, 1);
        assert_eq!(m.mirroring(), Mirroring::Horizontal);
    }
}
