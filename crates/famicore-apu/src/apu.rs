//! APU register file, channel wiring, and mixer.

use crate::dmc::Dmc;
use crate::frame_counter::{FrameClocks, FrameCounter, FrameEdgeMode};
use crate::noise::Noise;
use crate::pulse::Pulse;
use crate::sweep::PulseId;
use crate::triangle::Triangle;
use crate::Region;

/// The 2A03 APU: two pulse channels, triangle, noise, DMC, and the frame
/// sequencer, mixed down to an unsigned 8-bit sample.
#[derive(Debug, Clone)]
pub struct Apu {
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    frame_counter: FrameCounter,
    /// CPU cycle parity; pulse/noise/DMC timers run at CPU/2.
    cycle: u64,
    region: Region,
    edge_mode: FrameEdgeMode,
}

impl Apu {
    /// Create an APU with all channels silent.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pulse1: Pulse::new(PulseId::One),
            pulse2: Pulse::new(PulseId::Two),
            triangle: Triangle::new(),
            noise: Noise::new(),
            dmc: Dmc::new(),
            frame_counter: FrameCounter::new(),
            cycle: 0,
            region: Region::Ntsc,
            edge_mode: FrameEdgeMode::Fractional,
        }
    }

    /// Reset to power-on state. The region and edge-mode configuration is
    /// preserved.
    pub fn reset(&mut self) {
        let region = self.region;
        let edge_mode = self.edge_mode;
        *self = Self::new();
        self.set_region(region);
        self.set_frame_edge_mode(edge_mode);
    }

    /// Select NTSC or PAL period tables for the noise and DMC channels.
    pub fn set_region(&mut self, region: Region) {
        self.noise.set_region(region);
        self.dmc.set_region(region);
        self.region = region;
    }

    /// Select fractional (hardware) or integer frame-sequencer edges.
    pub fn set_frame_edge_mode(&mut self, mode: FrameEdgeMode) {
        self.frame_counter.set_edge_mode(mode);
        self.edge_mode = mode;
    }

    /// Write an APU register ($4000-$4013, $4015, $4017).
    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x4000 => self.pulse1.write_ctrl(value),
            0x4001 => self.pulse1.write_sweep(value),
            0x4002 => self.pulse1.write_timer_lo(value),
            0x4003 => self.pulse1.write_timer_hi(value),

            0x4004 => self.pulse2.write_ctrl(value),
            0x4005 => self.pulse2.write_sweep(value),
            0x4006 => self.pulse2.write_timer_lo(value),
            0x4007 => self.pulse2.write_timer_hi(value),

            0x4008 => self.triangle.write_linear(value),
            0x400A => self.triangle.write_timer_lo(value),
            0x400B => self.triangle.write_timer_hi(value),

            0x400C => self.noise.write_ctrl(value),
            0x400E => self.noise.write_period(value),
            0x400F => self.noise.write_length(value),

            0x4010 => self.dmc.write_ctrl(value),
            0x4011 => self.dmc.write_dac(value),
            0x4012 => self.dmc.write_sample_addr(value),
            0x4013 => self.dmc.write_sample_len(value),

            0x4015 => {
                self.pulse1.set_enabled(value & 0x01 != 0);
                self.pulse2.set_enabled(value & 0x02 != 0);
                self.triangle.set_enabled(value & 0x04 != 0);
                self.noise.set_enabled(value & 0x08 != 0);
                self.dmc.set_enabled(value & 0x10 != 0);
            }

            0x4017 => {
                let clocks = self.frame_counter.write(value);
                self.apply_frame_clocks(clocks);
            }

            _ => log::debug!("write to unhandled APU register {addr:#06x}"),
        }
    }

    /// Read $4015: channel length bits, DMC activity, and the two IRQ
    /// flags. Reading clears both the frame and DMC IRQ flags but leaves
    /// the DMC byte counter alone.
    pub fn read_status(&mut self) -> u8 {
        let status = self.peek_status();
        self.frame_counter.clear_irq();
        self.dmc.clear_irq();
        status
    }

    /// $4015 image without the read-clear side effects.
    #[must_use]
    pub fn peek_status(&self) -> u8 {
        let mut status = 0;
        if self.pulse1.active() {
            status |= 0x01;
        }
        if self.pulse2.active() {
            status |= 0x02;
        }
        if self.triangle.active() {
            status |= 0x04;
        }
        if self.noise.active() {
            status |= 0x08;
        }
        if self.dmc.active() {
            status |= 0x10;
        }
        if self.frame_counter.irq_pending() {
            status |= 0x40;
        }
        if self.dmc.irq_pending() {
            status |= 0x80;
        }
        status
    }

    /// Advance the APU by `cpu_cycles` CPU cycles.
    pub fn tick(&mut self, cpu_cycles: u32) {
        for _ in 0..cpu_cycles {
            self.clock();
        }
    }

    /// Advance one CPU cycle.
    pub fn clock(&mut self) {
        // The triangle timer runs at the full CPU rate.
        self.triangle.clock_timer();

        // Everything else divides by two.
        if self.cycle & 1 == 1 {
            self.pulse1.clock_timer();
            self.pulse2.clock_timer();
            self.noise.clock_timer();
            self.dmc.clock_timer();
        }

        let clocks = self.frame_counter.clock();
        self.apply_frame_clocks(clocks);

        self.cycle = self.cycle.wrapping_add(1);
    }

    fn apply_frame_clocks(&mut self, clocks: FrameClocks) {
        if clocks.quarter || clocks.half {
            self.pulse1.clock_envelope();
            self.pulse2.clock_envelope();
            self.triangle.clock_linear();
            self.noise.clock_envelope();
        }
        if clocks.half {
            self.pulse1.clock_half_frame();
            self.pulse2.clock_half_frame();
            self.triangle.clock_length();
            self.noise.clock_length();
        }
    }

    /// True while either the frame or DMC IRQ flag is raised (and, for the
    /// frame flag, not inhibited).
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.frame_counter.irq_pending() || self.dmc.irq_pending()
    }

    /// Whether the DMC wants a sample byte fetched from the CPU bus.
    #[must_use]
    pub fn dmc_needs_sample(&self) -> bool {
        self.dmc.needs_sample()
    }

    /// Address of the pending DMC fetch.
    #[must_use]
    pub fn dmc_sample_address(&self) -> u16 {
        self.dmc.sample_address()
    }

    /// Deliver a DMC sample byte read from the CPU bus.
    pub fn dmc_load_sample(&mut self, value: u8) {
        self.dmc.load_sample(value);
    }

    /// Mix the five channels down to an unsigned 8-bit sample.
    ///
    /// Uses the standard non-linear approximation:
    /// `pulse_out = 95.88 / (8128 / (p1 + p2) + 100)` and
    /// `tnd_out = 159.79 / (1 / (t/8227 + n/12241 + d/22638) + 100)`,
    /// recentered on 128.
    #[must_use]
    pub fn mix_sample(&self) -> u8 {
        let p1 = f32::from(self.pulse1.output());
        let p2 = f32::from(self.pulse2.output());
        let tri = f32::from(self.triangle.output());
        let noise = f32::from(self.noise.output());
        let dmc = f32::from(self.dmc.output());

        let pulse_out = if p1 + p2 == 0.0 {
            0.0
        } else {
            95.88 / (8128.0 / (p1 + p2) + 100.0)
        };

        let tnd_sum = tri / 8227.0 + noise / 12241.0 + dmc / 22638.0;
        let tnd_out = if tnd_sum == 0.0 {
            0.0
        } else {
            159.79 / (1.0 / tnd_sum + 100.0)
        };

        let sample = 128.0 + (pulse_out + tnd_out) * 127.0;
        sample.clamp(0.0, 255.0) as u8
    }

    /// Timer period of pulse 1, exposed for tests.
    #[must_use]
    pub fn pulse1_period(&self) -> u16 {
        self.pulse1.timer_period()
    }

    /// Timer period of pulse 2, exposed for tests.
    #[must_use]
    pub fn pulse2_period(&self) -> u16 {
        self.pulse2.timer_period()
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
