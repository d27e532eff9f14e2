//! The PPU proper: register file, dot sequencer, and frame composition.

use crate::a12::A12Filter;
use crate::background::Background;
use crate::oam::{Oam, SecondaryOam, Sprite, SpriteAttributes};
use crate::palette::PaletteRam;
use crate::registers::{PpuCtrl, PpuMask, PpuStatus};
use crate::scroll::Scroll;
use crate::sprites::{evaluate_line, pattern_row_addr, EvalResult, SpritePipeline};
use crate::timing::{Timing, VBLANK_LINE};
use crate::{PpuBus, Region};

/// Frame width in pixels.
pub const FRAME_WIDTH: usize = 256;
/// Frame height in pixels.
pub const FRAME_HEIGHT: usize = 240;
/// Frame buffer size.
pub const FRAME_SIZE: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// Ricoh 2C02 picture processing unit.
///
/// The system scheduler advances the PPU in dots via [`Ppu::tick`]; pattern
/// and nametable data is fetched through the [`PpuBus`], which also carries
/// the A12 rising-edge hook to the mapper.
pub struct Ppu {
    ctrl: PpuCtrl,
    mask: PpuMask,
    status: PpuStatus,
    scroll: Scroll,

    oam: Oam,
    secondary: SecondaryOam,
    background: Background,
    sprites: SpritePipeline,
    palette: PaletteRam,

    timing: Timing,
    a12: A12Filter,
    /// Monotonic dot counter feeding the A12 low-time filter.
    dots: u64,

    /// $2007 read buffer.
    read_buffer: u8,
    /// I/O latch driven by the last register access.
    open_bus: u8,
    /// Latched NMI edge, consumed by the scheduler.
    nmi_edge: bool,
    /// Set when the pre-render line wraps to a new frame.
    frame_complete: bool,

    /// Evaluation result for the line currently being fetched.
    eval: EvalResult,
    /// Low pattern bytes awaiting their high partner during sprite fetch.
    pending_lo: [u8; 8],

    /// 6-bit palette indices, one byte per pixel.
    frame: Box<[u8; FRAME_SIZE]>,
}

impl Ppu {
    /// Create a PPU at (0, 0) of frame 0 with cleared registers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ctrl: PpuCtrl::empty(),
            mask: PpuMask::empty(),
            status: PpuStatus::empty(),
            scroll: Scroll::new(),
            oam: Oam::new(),
            secondary: SecondaryOam::new(),
            background: Background::new(),
            sprites: SpritePipeline::new(),
            palette: PaletteRam::new(),
            timing: Timing::new(),
            a12: A12Filter::new(),
            dots: 0,
            read_buffer: 0,
            open_bus: 0,
            nmi_edge: false,
            frame_complete: false,
            eval: EvalResult::default(),
            pending_lo: [0; 8],
            frame: Box::new([0; FRAME_SIZE]),
        }
    }

    /// Reset: registers and scroll state clear, VRAM-side state (OAM,
    /// palette) is preserved.
    pub fn reset(&mut self) {
        self.ctrl = PpuCtrl::empty();
        self.mask = PpuMask::empty();
        self.status = PpuStatus::empty();
        self.scroll = Scroll::new();
        self.read_buffer = 0;
        self.open_bus = 0;
        self.nmi_edge = false;
        self.frame_complete = false;
        self.timing = Timing::new();
        self.a12.reset();
    }

    /// Select the frame-height region.
    pub fn set_region(&mut self, region: Region) {
        self.timing.set_region(region);
    }

    /// Current scanline.
    #[must_use]
    pub fn scanline(&self) -> u16 {
        self.timing.scanline()
    }

    /// Current dot.
    #[must_use]
    pub fn dot(&self) -> u16 {
        self.timing.dot()
    }

    /// Completed frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.timing.frame()
    }

    /// Scanlines per frame for the active region.
    #[must_use]
    pub fn lines_per_frame(&self) -> u16 {
        self.timing.lines_per_frame()
    }

    /// Whether background or sprite rendering is enabled.
    #[must_use]
    pub fn rendering_enabled(&self) -> bool {
        self.mask.rendering_enabled()
    }

    /// The rendered frame: 6-bit palette indices, grayscale applied.
    #[must_use]
    pub fn frame_buffer(&self) -> &[u8; FRAME_SIZE] {
        &self.frame
    }

    /// The three PPUMASK emphasis bits for host palette lookup.
    #[must_use]
    pub fn emphasis(&self) -> u8 {
        self.mask.emphasis()
    }

    /// Take the latched NMI edge, if any.
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_edge)
    }

    /// Take the frame-complete flag, if set.
    pub fn take_frame_complete(&mut self) -> bool {
        std::mem::take(&mut self.frame_complete)
    }

    /// Raw status bits, for tests and debuggers.
    #[must_use]
    pub fn status_bits(&self) -> u8 {
        self.status.bits()
    }

    // ---- CPU register interface ----

    /// Read PPU register `reg` (0-7, i.e. $2000 + reg).
    pub fn cpu_read(&mut self, reg: u16, bus: &mut impl PpuBus) -> u8 {
        let value = match reg & 7 {
            2 => {
                let value = self.status.bits() | (self.open_bus & 0x1F);
                self.status.remove(PpuStatus::VBLANK);
                self.scroll.reset_latch();
                // A read racing the VBlank edge swallows the NMI.
                self.nmi_edge = false;
                value
            }
            4 => {
                if self.rendering_active() {
                    // Secondary OAM clear phase reads back $FF; primary OAM
                    // is never disturbed by reads.
                    0xFF
                } else {
                    self.oam.read()
                }
            }
            7 => {
                let addr = self.scroll.addr() & 0x3FFF;
                self.observe_a12(bus, addr);
                let value = if addr >= 0x3F00 {
                    // Palette reads are unbuffered; the buffer picks up the
                    // nametable byte underneath.
                    self.read_buffer = bus.read(addr & 0x2FFF);
                    self.palette.read(addr)
                } else {
                    let buffered = self.read_buffer;
                    self.read_buffer = bus.read(addr);
                    buffered
                };
                self.scroll.increment_addr(self.ctrl.vram_increment());
                value
            }
            _ => self.open_bus,
        };
        self.open_bus = value;
        value
    }

    /// Write PPU register `reg` (0-7).
    pub fn cpu_write(&mut self, reg: u16, value: u8, bus: &mut impl PpuBus) {
        self.open_bus = value;
        match reg & 7 {
            0 => {
                let was_enabled = self.ctrl.nmi_enabled();
                self.ctrl = PpuCtrl::from_bits_truncate(value);
                self.scroll.write_ctrl(value);
                if self.ctrl.nmi_enabled() {
                    // Enabling mid-VBlank latches the edge immediately.
                    if !was_enabled && self.status.contains(PpuStatus::VBLANK) {
                        self.nmi_edge = true;
                    }
                } else {
                    self.nmi_edge = false;
                }
            }
            1 => self.mask = PpuMask::from_bits_truncate(value),
            2 => log::debug!("ignored write to read-only PPUSTATUS"),
            3 => self.oam.set_addr(value),
            4 => self.oam.write(value),
            5 => self.scroll.write_scroll(value),
            6 => {
                let second = self.scroll.latch();
                self.scroll.write_addr(value);
                if second {
                    // The second write drives v onto the address bus.
                    self.observe_a12(bus, self.scroll.addr() & 0x3FFF);
                }
            }
            7 => {
                let addr = self.scroll.addr() & 0x3FFF;
                self.observe_a12(bus, addr);
                if addr >= 0x3F00 {
                    self.palette.write(addr, value);
                } else {
                    bus.write(addr, value);
                }
                self.scroll.increment_addr(self.ctrl.vram_increment());
            }
            _ => unreachable!(),
        }
    }

    /// One byte of an OAM DMA burst ($4014).
    pub fn oam_dma_write(&mut self, value: u8) {
        self.oam.dma_write(value);
    }

    // ---- dot sequencer ----

    /// Advance the PPU by `n` dots.
    pub fn tick(&mut self, n: u32, bus: &mut impl PpuBus) {
        for _ in 0..n {
            self.step_dot(bus);
        }
    }

    fn rendering_active(&self) -> bool {
        self.mask.rendering_enabled() && self.timing.is_rendering_line()
    }

    fn observe_a12(&mut self, bus: &mut impl PpuBus, addr: u16) {
        if self.a12.observe(addr, self.dots) {
            bus.notify_a12_rise();
        }
    }

    fn fetch(&mut self, bus: &mut impl PpuBus, addr: u16) -> u8 {
        self.observe_a12(bus, addr);
        bus.read(addr)
    }

    #[allow(clippy::too_many_lines)] // The dot cases mirror the hardware schedule.
    fn step_dot(&mut self, bus: &mut impl PpuBus) {
        if self.timing.tick(self.mask.contains(PpuMask::BG_ENABLE)) {
            self.frame_complete = true;
        }
        self.dots += 1;

        let scanline = self.timing.scanline();
        let dot = self.timing.dot();

        // VBlank begins at (241, 1).
        if scanline == VBLANK_LINE && dot == 1 {
            self.status.insert(PpuStatus::VBLANK);
            if self.ctrl.nmi_enabled() {
                self.nmi_edge = true;
            }
        }

        // Pre-render dot 1 clears the frame flags.
        if self.timing.is_prerender_line() && dot == 1 {
            self.status.remove(
                PpuStatus::VBLANK | PpuStatus::SPRITE_ZERO_HIT | PpuStatus::SPRITE_OVERFLOW,
            );
        }

        if !self.mask.rendering_enabled() {
            // Rendering disabled: emit the backdrop color on visible dots.
            if self.timing.is_visible_line() && (1..=256).contains(&dot) {
                let color = self.apply_grayscale(self.palette.entry(0));
                self.frame[usize::from(scanline) * FRAME_WIDTH + usize::from(dot - 1)] = color;
            }
            return;
        }

        if !self.timing.is_rendering_line() {
            return;
        }

        // Background fetch pipeline over dots 1-256 and 321-336.
        if (1..=256).contains(&dot) || (321..=336).contains(&dot) {
            if self.timing.is_visible_line() && dot <= 256 {
                self.render_pixel(scanline, dot - 1);
            }
            self.background.shift();
            match dot % 8 {
                1 => {
                    let tile = self.fetch(bus, self.scroll.tile_addr());
                    self.background.set_tile(tile);
                }
                3 => {
                    let attr = self.fetch(bus, self.scroll.attribute_addr());
                    let shift = self.scroll.attribute_shift();
                    self.background.set_attribute(attr >> shift);
                }
                5 => {
                    let addr = self.bg_pattern_addr();
                    let lo = self.fetch(bus, addr);
                    self.background.set_pattern_lo(lo);
                }
                7 => {
                    let addr = self.bg_pattern_addr() + 8;
                    let hi = self.fetch(bus, addr);
                    self.background.set_pattern_hi(hi);
                }
                0 => {
                    self.background.reload();
                    self.scroll.increment_x();
                }
                _ => {}
            }
            if dot == 256 {
                self.scroll.increment_y();
            }
        }

        if dot == 257 {
            self.scroll.copy_x();

            // Evaluate sprites against the current line; they render on the
            // next one, which is why a sprite's top edge sits at Y + 1.
            if self.timing.is_visible_line() {
                let eval = evaluate_line(
                    &self.oam,
                    scanline,
                    self.ctrl.sprite_height(),
                    &mut self.secondary,
                );
                if eval.overflow {
                    self.status.insert(PpuStatus::SPRITE_OVERFLOW);
                }
                self.eval = eval;
            } else {
                // Pre-render line: secondary OAM holds nothing.
                self.secondary.clear();
                self.eval = EvalResult::default();
            }
            self.sprites.load(&self.secondary, self.eval.sprite_zero_present);
        }

        // Sprite pattern fetches, 8 dots per slot across 257-320. Empty
        // slots fetch tile $FF, which is what keeps A12 cycling when the
        // sprite table is at $1000.
        if (257..=320).contains(&dot) {
            let slot = (dot - 257) / 8;
            let phase = (dot - 257) % 8;
            if phase == 4 {
                let (lo_addr, _) = self.sprite_fetch_addrs(slot as u8, scanline);
                let lo = self.fetch(bus, lo_addr);
                self.stash_sprite_pattern(slot as u8, lo, true);
            } else if phase == 6 {
                let (_, hi_addr) = self.sprite_fetch_addrs(slot as u8, scanline);
                let hi = self.fetch(bus, hi_addr);
                self.stash_sprite_pattern(slot as u8, hi, false);
            }
        }

        // copyY across the pre-render window.
        if self.timing.is_prerender_line() && (280..=304).contains(&dot) {
            self.scroll.copy_y();
        }

        // Dummy nametable fetches at the line tail.
        if dot == 337 || dot == 339 {
            let _ = self.fetch(bus, self.scroll.tile_addr());
        }
    }

    fn bg_pattern_addr(&self) -> u16 {
        self.ctrl.bg_table()
            + u16::from(self.background.tile()) * 16
            + u16::from(self.scroll.fine_y())
    }

    /// Pattern addresses for a sprite fetch slot. Rows are taken relative
    /// to the evaluation line (the current one).
    fn sprite_fetch_addrs(&self, slot: u8, scanline: u16) -> (u16, u16) {
        let height = self.ctrl.sprite_height();
        let line = if self.timing.is_prerender_line() {
            0
        } else {
            scanline
        };
        let lo = match self.secondary.get(slot) {
            Some(sprite) => pattern_row_addr(&sprite, line, height, self.ctrl.sprite_table()),
            None => {
                // Garbage fetch of tile $FF.
                let dummy = Sprite {
                    y: line.min(255) as u8,
                    tile: 0xFF,
                    attributes: SpriteAttributes::empty(),
                    x: 0,
                    oam_index: 63,
                };
                pattern_row_addr(&dummy, line, height, self.ctrl.sprite_table())
            }
        };
        (lo, lo + 8)
    }

    fn stash_sprite_pattern(&mut self, slot: u8, value: u8, is_lo: bool) {
        let Some(sprite) = self.secondary.get(slot) else {
            return;
        };
        let value = if sprite.attributes.flip_h() {
            value.reverse_bits()
        } else {
            value
        };
        if is_lo {
            self.pending_lo[slot as usize] = value;
        } else {
            self.sprites
                .set_pattern(slot, self.pending_lo[slot as usize], value);
        }
    }

    fn render_pixel(&mut self, scanline: u16, x: u16) {
        let show_bg =
            self.mask.contains(PpuMask::BG_ENABLE) && (x >= 8 || self.mask.contains(PpuMask::BG_LEFT));
        let show_sprites = self.mask.contains(PpuMask::SPRITE_ENABLE)
            && (x >= 8 || self.mask.contains(PpuMask::SPRITE_LEFT));

        let (bg_pixel, bg_palette) = if show_bg {
            self.background.pixel(self.scroll.fine_x())
        } else {
            (0, 0)
        };

        let sprite = if show_sprites {
            self.sprites.pixel(x)
        } else {
            None
        };

        if let Some((sprite_pixel, _, _, is_zero)) = sprite {
            if is_zero && bg_pixel != 0 && sprite_pixel != 0 && x != 255 {
                self.status.insert(PpuStatus::SPRITE_ZERO_HIT);
            }
        }

        let palette_index = match (bg_pixel, sprite) {
            (0, None) => 0,
            (0, Some((pixel, palette, _, _))) => 0x10 | (palette << 2) | pixel,
            (_, None) => (bg_palette << 2) | bg_pixel,
            (_, Some((pixel, palette, behind, _))) => {
                if behind {
                    (bg_palette << 2) | bg_pixel
                } else {
                    0x10 | (palette << 2) | pixel
                }
            }
        };

        let color = self.apply_grayscale(self.palette.entry(palette_index));
        self.frame[usize::from(scanline) * FRAME_WIDTH + usize::from(x)] = color;
    }

    fn apply_grayscale(&self, color: u8) -> u8 {
        if self.mask.contains(PpuMask::GRAYSCALE) {
            color & 0x30
        } else {
            color & 0x3F
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
