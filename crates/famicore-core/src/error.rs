//! System-level error types.

use famicore_cpu::CpuError;
use famicore_mappers::{BatteryError, MapperError, RomError};
use thiserror::Error;

/// Errors surfaced by [`crate::System`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SystemError {
    /// The CPU fetched an undecodable opcode; the system is halted but
    /// remains inspectable.
    #[error("unknown opcode {opcode:#04x} at {pc:#06x}")]
    UnknownOpcode {
        /// Address of the opcode.
        pc: u16,
        /// The opcode byte.
        opcode: u8,
    },

    /// The ROM image could not be parsed.
    #[error("invalid ROM header: {reason}")]
    InvalidRomHeader {
        /// Human-readable parse failure.
        reason: String,
    },

    /// The cartridge uses a mapper this core does not implement.
    #[error("unsupported mapper {id} (submapper {submapper})")]
    MapperUnsupported {
        /// iNES mapper id.
        id: u16,
        /// NES 2.0 submapper.
        submapper: u8,
    },

    /// Battery RAM import was rejected; the cartridge keeps its current
    /// contents.
    #[error("battery RAM size mismatch: expected {expected}, got {got}")]
    BatteryRamSizeMismatch {
        /// Declared NVRAM size.
        expected: usize,
        /// Provided buffer size.
        got: usize,
    },

    /// The cartridge has no battery-backed RAM to import into.
    #[error("cartridge has no battery-backed RAM")]
    NoBatteryRam,
}

impl From<CpuError> for SystemError {
    fn from(err: CpuError) -> Self {
        match err {
            CpuError::UnknownOpcode { pc, opcode } => Self::UnknownOpcode { pc, opcode },
        }
    }
}

impl From<RomError> for SystemError {
    fn from(err: RomError) -> Self {
        Self::InvalidRomHeader {
            reason: err.to_string(),
        }
    }
}

impl From<MapperError> for SystemError {
    fn from(err: MapperError) -> Self {
        match err {
            MapperError::Unsupported { id, submapper } => Self::MapperUnsupported { id, submapper },
        }
    }
}

impl From<BatteryError> for SystemError {
    fn from(err: BatteryError) -> Self {
        match err {
            BatteryError::SizeMismatch { expected, got } => {
                Self::BatteryRamSizeMismatch { expected, got }
            }
            BatteryError::NoBattery => Self::NoBatteryRam,
        }
    }
}
