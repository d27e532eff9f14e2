//! The system scheduler: one CPU instruction at a time, with the PPU held
//! at exactly three dots per CPU cycle and the APU and mapper in lockstep.

use famicore_apu::Apu;
use famicore_cpu::{Bus, Cpu};
use famicore_mappers::{Mapper, Rom, TimingRegion};
use famicore_ppu::{Ppu, FRAME_SIZE};

use crate::bus::SystemBus;
use crate::controller::Controller;
use crate::error::SystemError;

/// NTSC timing constants.
pub mod timing {
    /// Master clock frequency (NTSC).
    pub const MASTER_CLOCK_NTSC: u32 = 21_477_272;
    /// CPU clock frequency (NTSC).
    pub const CPU_CLOCK_NTSC: u32 = MASTER_CLOCK_NTSC / 12;
    /// PPU dots per CPU cycle.
    pub const DOTS_PER_CPU_CYCLE: u32 = 3;
    /// OAM DMA stall on an even CPU cycle.
    pub const OAM_DMA_CYCLES_EVEN: u32 = 513;
    /// OAM DMA stall on an odd CPU cycle.
    pub const OAM_DMA_CYCLES_ODD: u32 = 514;
    /// DMC sample-fetch stall.
    pub const DMC_FETCH_CYCLES: u32 = 4;
}

/// A complete console: CPU plus the bus holding PPU, APU, mapper, RAM, and
/// controllers.
pub struct System {
    cpu: Cpu,
    bus: SystemBus,
    /// Scanline the MMC5-style hook last saw.
    last_scanline: u16,
    /// Charge 4 stall cycles per DMC sample fetch.
    dmc_stall_enabled: bool,
    /// Sticky fault from a failed step.
    halted: bool,
}

impl System {
    /// Build a console around a parsed ROM record. The cartridge's timing
    /// region is applied to the PPU and APU.
    ///
    /// # Errors
    ///
    /// [`SystemError::MapperUnsupported`] for unimplemented mappers.
    pub fn new(rom: Rom) -> Result<Self, SystemError> {
        let mapper = Mapper::new(&rom)?;
        let mut bus = SystemBus::new(mapper);

        match rom.timing {
            TimingRegion::Ntsc | TimingRegion::Multi => {}
            TimingRegion::Pal => {
                bus.ppu.set_region(famicore_ppu::Region::Pal);
                bus.apu.set_region(famicore_apu::Region::Pal);
            }
            TimingRegion::Dendy => {
                bus.ppu.set_region(famicore_ppu::Region::Dendy);
            }
        }

        // A trainer block loads into WRAM at $7000 before execution starts.
        if let Some(trainer) = &rom.trainer {
            for (i, &byte) in trainer.iter().take(512).enumerate() {
                bus.mapper.cpu_write(0x7000 + i as u16, byte);
            }
        }

        let mut system = Self {
            cpu: Cpu::new(),
            bus,
            last_scanline: 0,
            dmc_stall_enabled: true,
            halted: false,
        };
        system.cpu.reset(&mut system.bus);
        Ok(system)
    }

    /// Parse an iNES/NES 2.0 image and build a console from it.
    ///
    /// # Errors
    ///
    /// [`SystemError::InvalidRomHeader`] for parse failures, plus the
    /// errors of [`System::new`].
    pub fn from_ines(data: &[u8]) -> Result<Self, SystemError> {
        let rom = Rom::parse(data)?;
        Self::new(rom)
    }

    /// Reset the console: bus, components, and the CPU reset sequence.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        self.last_scanline = 0;
        self.halted = false;
    }

    /// Execute one instruction (or deliver one interrupt) and advance
    /// every component in lockstep. Returns the CPU cycles consumed,
    /// including DMA stalls.
    ///
    /// # Errors
    ///
    /// [`SystemError::UnknownOpcode`] when the CPU jams; the system stays
    /// halted (further calls keep returning the error) but its state can
    /// be inspected.
    pub fn step_instruction(&mut self) -> Result<u32, SystemError> {
        // Interrupt lines are sampled at instruction boundaries: anything
        // a mapper or the APU raised during the previous step is visible
        // now, before the next opcode. NMI edges latched by host register
        // pokes between steps are picked up here as well.
        if self.bus.ppu.take_nmi() {
            self.cpu.request_nmi();
        }
        self.cpu
            .set_irq_line(self.bus.apu.irq_pending() || self.bus.mapper.irq_pending());

        let cycles = match self.cpu.step(&mut self.bus) {
            Ok(cycles) => u32::from(cycles),
            Err(err) => {
                self.halted = true;
                return Err(err.into());
            }
        };
        self.tick_components(cycles);
        let mut total = cycles;

        // A $4014 write during the instruction triggers OAM DMA. The bus
        // owns the stall: 513 cycles, or 514 when the write lands on an
        // odd CPU cycle.
        if let Some(page) = self.bus.take_oam_dma() {
            let stall = self.run_oam_dma(page);
            self.cpu.add_cycles(u64::from(stall));
            self.tick_components(stall);
            total += stall;
        }

        // NMI edges latched by the PPU during this step are consumed at
        // the next boundary.
        if self.bus.ppu.take_nmi() {
            self.cpu.request_nmi();
        }

        Ok(total)
    }

    /// Run until the PPU finishes the current frame.
    ///
    /// # Errors
    ///
    /// Propagates [`System::step_instruction`] failures.
    pub fn run_frame(&mut self) -> Result<(), SystemError> {
        loop {
            self.step_instruction()?;
            if self.bus.ppu.take_frame_complete() {
                return Ok(());
            }
        }
    }

    /// Advance the PPU (3 dots per cycle), APU, and mapper by `cycles` CPU
    /// cycles, servicing DMC fetches as they come due.
    fn tick_components(&mut self, cycles: u32) {
        {
            let (ppu, mut mem) = self.bus.ppu_memory();
            ppu.tick(cycles * timing::DOTS_PER_CPU_CYCLE, &mut mem);
        }
        self.bus.apu.tick(cycles);
        self.bus.mapper.tick(cycles);
        self.notify_scanlines();

        // DMC hunger is satisfied through the CPU bus; each fetched byte
        // optionally stalls the CPU.
        if self.bus.apu.dmc_needs_sample() {
            let addr = self.bus.apu.dmc_sample_address();
            let sample = self.bus.dma_read(addr);
            self.bus.apu.dmc_load_sample(sample);
            if self.dmc_stall_enabled {
                let stall = timing::DMC_FETCH_CYCLES;
                self.cpu.add_cycles(u64::from(stall));
                {
                    let (ppu, mut mem) = self.bus.ppu_memory();
                    ppu.tick(stall * timing::DOTS_PER_CPU_CYCLE, &mut mem);
                }
                self.bus.apu.tick(stall);
                self.bus.mapper.tick(stall);
                self.notify_scanlines();
            }
        }
    }

    /// Tell the mapper about every scanline boundary the PPU crossed.
    fn notify_scanlines(&mut self) {
        let lines = self.bus.ppu.lines_per_frame();
        let current = self.bus.ppu.scanline();
        let rendering = self.bus.ppu.rendering_enabled();
        while self.last_scanline != current {
            self.last_scanline = (self.last_scanline + 1) % lines;
            self.bus.mapper.on_scanline(self.last_scanline, rendering);
        }
    }

    /// Copy 256 bytes from `page << 8` into OAM and return the stall.
    fn run_oam_dma(&mut self, page: u8) -> u32 {
        let base = u16::from(page) << 8;
        for i in 0..256u16 {
            let value = self.bus.dma_read(base + i);
            self.bus.ppu.oam_dma_write(value);
        }
        if self.cpu.cycles % 2 == 1 {
            timing::OAM_DMA_CYCLES_ODD
        } else {
            timing::OAM_DMA_CYCLES_EVEN
        }
    }

    // ---- host interfaces ----

    /// The rendered frame: 6-bit palette indices.
    #[must_use]
    pub fn frame_buffer(&self) -> &[u8; FRAME_SIZE] {
        self.bus.ppu.frame_buffer()
    }

    /// CPU access for tests and debuggers.
    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Mutable CPU access.
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// PPU access.
    #[must_use]
    pub fn ppu(&self) -> &Ppu {
        &self.bus.ppu
    }

    /// Mutable PPU access (region configuration).
    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.bus.ppu
    }

    /// APU access.
    #[must_use]
    pub fn apu(&self) -> &Apu {
        &self.bus.apu
    }

    /// Mutable APU access (region / frame-edge configuration).
    pub fn apu_mut(&mut self) -> &mut Apu {
        &mut self.bus.apu
    }

    /// Mapper access.
    #[must_use]
    pub fn mapper(&self) -> &Mapper {
        &self.bus.mapper
    }

    /// Mutable mapper access.
    pub fn mapper_mut(&mut self) -> &mut Mapper {
        &mut self.bus.mapper
    }

    /// A controller port (0 or 1).
    pub fn controller_mut(&mut self, port: usize) -> &mut Controller {
        &mut self.bus.controllers[port]
    }

    /// Read through the CPU bus, with side effects.
    pub fn bus_read(&mut self, addr: u16) -> u8 {
        self.bus.read(addr)
    }

    /// Write through the CPU bus, with side effects.
    pub fn bus_write(&mut self, addr: u16, value: u8) {
        self.bus.write(addr, value);
    }

    /// Whether a prior step left the system halted.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Toggle the 4-cycle DMC fetch stall.
    pub fn set_dmc_stall_enabled(&mut self, enabled: bool) {
        self.dmc_stall_enabled = enabled;
    }

    /// Export a copy of battery RAM, when the cartridge has one.
    #[must_use]
    pub fn export_battery(&self) -> Option<Vec<u8>> {
        self.bus.mapper.export_battery()
    }

    /// Import battery RAM.
    ///
    /// # Errors
    ///
    /// [`SystemError::BatteryRamSizeMismatch`] on size mismatch (the
    /// current NVRAM is kept) or [`SystemError::NoBatteryRam`].
    pub fn import_battery(&mut self, data: &[u8]) -> Result<(), SystemError> {
        self.bus.mapper.import_battery(data)?;
        Ok(())
    }
}
