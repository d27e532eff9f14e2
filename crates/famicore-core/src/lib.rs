//! famicore-core: the deterministic synchronous NES execution engine.
//!
//! A [`System`] owns the 6502 CPU, the PPU, the APU, the cartridge mapper,
//! internal RAM, and the controller ports, and steps them as a single
//! cooperative state machine: one CPU instruction per
//! [`System::step_instruction`], with the PPU advanced exactly three dots
//! per CPU cycle (including through OAM and DMC DMA stalls), the APU and
//! mapper ticked in CPU cycles, and all interrupt lines sampled at
//! instruction boundaries.
//!
//! # Example
//!
//! ```no_run
//! use famicore_core::System;
//!
//! let image = std::fs::read("game.nes").unwrap();
//! let mut system = System::from_ines(&image).unwrap();
//! system.run_frame().unwrap();
//! let frame = system.frame_buffer(); // 256x240 palette indices
//! let sample = system.apu().mix_sample();
//! # let _ = (frame, sample);
//! ```

mod bus;
mod controller;
mod error;
mod system;

pub use bus::{PpuMemory, SystemBus};
pub use controller::{Button, Controller};
pub use error::SystemError;
pub use system::{timing, System};

// Re-export the component crates so hosts need only one dependency.
pub use famicore_apu as apu;
pub use famicore_cpu as cpu;
pub use famicore_mappers as mappers;
pub use famicore_ppu as ppu;
