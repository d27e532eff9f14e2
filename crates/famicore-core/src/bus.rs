//! System bus: CPU address decoding and the PPU memory adapter.

use famicore_apu::Apu;
use famicore_cpu::Bus;
use famicore_mappers::{Mapper, NtAccess};
use famicore_ppu::{Ppu, PpuBus};

use crate::controller::Controller;

/// PPU-side memory adapter: CHR through the mapper, nametables through the
/// mapper's routing into CIRAM or mapper-internal memory. Also forwards
/// the A12 rising-edge hook.
pub struct PpuMemory<'a> {
    mapper: &'a mut Mapper,
    ciram: &'a mut [u8; 0x800],
}

impl PpuBus for PpuMemory<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        match addr & 0x3FFF {
            0x0000..=0x1FFF => self.mapper.ppu_read(addr & 0x1FFF),
            addr => {
                let offset = addr & 0x0FFF;
                match self.mapper.nt_read(offset) {
                    NtAccess::Ciram(page) => {
                        self.ciram[usize::from(page) * 0x400 + usize::from(offset & 0x03FF)]
                    }
                    NtAccess::Internal(value) => value,
                }
            }
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr & 0x3FFF {
            0x0000..=0x1FFF => self.mapper.ppu_write(addr & 0x1FFF, value),
            addr => {
                let offset = addr & 0x0FFF;
                if let Some(page) = self.mapper.nt_write(offset, value) {
                    self.ciram[usize::from(page) * 0x400 + usize::from(offset & 0x03FF)] = value;
                }
            }
        }
    }

    fn notify_a12_rise(&mut self) {
        self.mapper.notify_a12_rise();
    }
}

/// The CPU-visible system bus and everything hanging off it.
pub struct SystemBus {
    /// 2 KiB internal RAM, mirrored through $1FFF.
    pub ram: [u8; 0x800],
    /// 2 KiB nametable RAM (CIRAM).
    pub ciram: [u8; 0x800],
    /// Picture processing unit.
    pub ppu: Ppu,
    /// Audio processing unit.
    pub apu: Apu,
    /// Cartridge mapper.
    pub mapper: Mapper,
    /// Controller ports.
    pub controllers: [Controller; 2],

    /// Page latched by a $4014 write, consumed by the scheduler.
    oam_dma_page: Option<u8>,
    /// Last value driven on the CPU data bus.
    open_bus: u8,
}

impl SystemBus {
    /// Assemble a bus around a mapper.
    #[must_use]
    pub fn new(mapper: Mapper) -> Self {
        Self {
            ram: [0; 0x800],
            ciram: [0; 0x800],
            ppu: Ppu::new(),
            apu: Apu::new(),
            mapper,
            controllers: [Controller::new(), Controller::new()],
            oam_dma_page: None,
            open_bus: 0,
        }
    }

    /// Reset bus-side state and all attached components.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.ppu.reset();
        self.apu.reset();
        self.mapper.reset();
        self.oam_dma_page = None;
        self.open_bus = 0;
    }

    /// Borrow the PPU's view of memory.
    pub fn ppu_memory(&mut self) -> (&mut Ppu, PpuMemory<'_>) {
        (
            &mut self.ppu,
            PpuMemory {
                mapper: &mut self.mapper,
                ciram: &mut self.ciram,
            },
        )
    }

    /// Take a pending $4014 DMA page.
    pub fn take_oam_dma(&mut self) -> Option<u8> {
        self.oam_dma_page.take()
    }

    /// Plain read for DMA and DMC fetches: no open-bus update, no
    /// register side effects outside the cartridge window.
    #[must_use]
    pub fn dma_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr & 0x07FF)],
            0x4020..=0xFFFF => self.mapper.cpu_read(addr),
            _ => self.open_bus,
        }
    }

    fn read_controller(&mut self, port: usize) -> u8 {
        // Bit 0 is the shifted button bit; the upper bits float with the
        // last bus value, which in practice leaves bit 6 set after the
        // usual LDA $4016.
        (self.open_bus & 0xE0) | self.controllers[port].read()
    }
}

impl Bus for SystemBus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr & 0x07FF)],
            0x2000..=0x3FFF => {
                let mut mem = PpuMemory {
                    mapper: &mut self.mapper,
                    ciram: &mut self.ciram,
                };
                self.ppu.cpu_read(addr & 0x0007, &mut mem)
            }
            0x4015 => self.apu.read_status(),
            0x4016 => self.read_controller(0),
            0x4017 => self.read_controller(1),
            0x4000..=0x401F => self.open_bus,
            0x4020..=0xFFFF => self.mapper.cpu_read(addr),
        };
        self.open_bus = value;
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.open_bus = value;
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr & 0x07FF)] = value,
            0x2000..=0x3FFF => {
                let mut mem = PpuMemory {
                    mapper: &mut self.mapper,
                    ciram: &mut self.ciram,
                };
                self.ppu.cpu_write(addr & 0x0007, value, &mut mem);
            }
            0x4014 => self.oam_dma_page = Some(value),
            0x4016 => {
                self.controllers[0].write_strobe(value);
                self.controllers[1].write_strobe(value);
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, value),
            0x4018..=0x401F => log::debug!("APU test-mode write {addr:#06x} ignored"),
            0x4020..=0xFFFF => self.mapper.cpu_write(addr, value),
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr & 0x07FF)],
            0x4015 => self.apu.peek_status(),
            _ => self.open_bus,
        }
    }
}
