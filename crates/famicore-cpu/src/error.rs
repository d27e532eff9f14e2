//! CPU error types.

use thiserror::Error;

/// Errors raised while stepping the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    /// A JAM/KIL opcode was fetched. The CPU halts deterministically with
    /// the PC left on the offending byte.
    #[error("unknown opcode {opcode:#04x} at {pc:#06x}")]
    UnknownOpcode {
        /// Address of the undecodable opcode.
        pc: u16,
        /// The opcode byte.
        opcode: u8,
    },
}
