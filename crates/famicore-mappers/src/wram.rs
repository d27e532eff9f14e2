//! Cartridge work RAM at $6000-$7FFF, optionally battery-backed.

use crate::BatteryError;
use crate::rom::Rom;

/// PRG work RAM with battery metadata.
#[derive(Debug, Clone)]
pub struct Wram {
    data: Vec<u8>,
    battery: bool,
    enabled: bool,
    write_protected: bool,
}

impl Wram {
    /// Allocate from the ROM record's declared size.
    #[must_use]
    pub fn from_rom(rom: &Rom) -> Self {
        Self {
            data: vec![0; rom.effective_prg_ram()],
            battery: rom.has_battery,
            enabled: true,
            write_protected: false,
        }
    }

    /// Allocate a fixed size (MMC6's 1 KiB).
    #[must_use]
    pub fn with_size(size: usize, battery: bool) -> Self {
        Self {
            data: vec![0; size],
            battery,
            enabled: true,
            write_protected: false,
        }
    }

    /// Chip-enable control ($A001-style registers).
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Write-protect control.
    pub fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }

    /// Read at `offset` into the RAM window; open-bus-ish 0 when disabled.
    #[must_use]
    pub fn read(&self, offset: usize) -> u8 {
        if self.enabled && !self.data.is_empty() {
            self.data[offset % self.data.len()]
        } else {
            0
        }
    }

    /// Write at `offset`; dropped when disabled or protected.
    pub fn write(&mut self, offset: usize, value: u8) {
        if self.enabled && !self.write_protected && !self.data.is_empty() {
            let len = self.data.len();
            self.data[offset % len] = value;
        }
    }

    /// Battery-backed contents, if this RAM persists.
    #[must_use]
    pub fn battery_contents(&self) -> Option<&[u8]> {
        self.battery.then_some(self.data.as_slice())
    }

    /// Export a fresh copy of battery RAM.
    #[must_use]
    pub fn export(&self) -> Option<Vec<u8>> {
        self.battery.then(|| self.data.clone())
    }

    /// Import battery RAM, validating the size.
    ///
    /// # Errors
    ///
    /// [`BatteryError::SizeMismatch`] when the buffer length differs from
    /// the declared NVRAM size; the current contents are kept.
    pub fn import(&mut self, data: &[u8]) -> Result<(), BatteryError> {
        if !self.battery {
            return Err(BatteryError::NoBattery);
        }
        if data.len() != self.data.len() {
            return Err(BatteryError::SizeMismatch {
                expected: self.data.len(),
                got: data.len(),
            });
        }
        self.data.copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_ram_reads_zero() {
        let mut w = Wram::with_size(0x2000, false);
        w.write(0, 0x42);
        w.set_enabled(false);
        assert_eq!(w.read(0), 0);
        w.set_enabled(true);
        assert_eq!(w.read(0), 0x42);
    }

    #[test]
    fn write_protect_drops_writes() {
        let mut w = Wram::with_size(0x2000, false);
        w.set_write_protected(true);
        w.write(0, 0x42);
        assert_eq!(w.read(0), 0);
    }

    #[test]
    fn battery_roundtrip() {
        let mut w = Wram::with_size(0x2000, true);
        w.write(0x123, 0xAB);
        let saved = w.export().unwrap();
        let mut w2 = Wram::with_size(0x2000, true);
        w2.import(&saved).unwrap();
        assert_eq!(w2.read(0x123), 0xAB);
    }

    #[test]
    fn import_size_mismatch_rejected() {
        let mut w = Wram::with_size(0x2000, true);
        w.write(0, 0x55);
        let err = w.import(&[0; 0x1000]).unwrap_err();
        assert_eq!(
            err,
            BatteryError::SizeMismatch {
                expected: 0x2000,
                got: 0x1000
            }
        );
        // Existing contents survive a rejected import.
        assert_eq!(w.read(0), 0x55);
    }

    #[test]
    fn non_battery_export_is_none() {
        let w = Wram::with_size(0x2000, false);
        assert!(w.export().is_none());
    }
}
