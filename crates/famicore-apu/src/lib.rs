//! famicore-apu: NES 2A03 audio processing unit.
//!
//! The APU is advanced in CPU cycles by the system scheduler. Channel
//! timers, the frame sequencer, and the DMC engine all run from that one
//! clock; [`Apu::mix_sample`] collapses the five channel DACs through the
//! non-linear mixer into an unsigned 8-bit sample.
//!
//! DMC sample bytes live in CPU address space, so the bus layer polls
//! [`Apu::dmc_needs_sample`], performs the read, and hands the byte back
//! through [`Apu::dmc_load_sample`], charging the CPU for the fetch stall.

use std::str::FromStr;

mod apu;
mod dmc;
mod envelope;
mod frame_counter;
mod length_counter;
mod noise;
mod pulse;
mod sweep;
mod timer;
mod triangle;

pub use apu::Apu;
pub use frame_counter::{FrameClocks, FrameCounter, FrameEdgeMode, SequencerMode};

/// Timing region for the noise and DMC period tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// NTSC (2A03).
    #[default]
    Ntsc,
    /// PAL (2A07).
    Pal,
}

impl FromStr for Region {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ntsc" => Ok(Self::Ntsc),
            "pal" => Ok(Self::Pal),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_parses_case_insensitively() {
        assert_eq!("NTSC".parse::<Region>(), Ok(Region::Ntsc));
        assert_eq!("pal".parse::<Region>(), Ok(Region::Pal));
        assert!("dendy".parse::<Region>().is_err());
    }
}
