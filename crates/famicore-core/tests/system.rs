//! End-to-end scheduler and timing tests.

use famicore_core::{System, SystemError};
use famicore_mappers::{Mirroring, Rom, TimingRegion};

/// Build a ROM record with `program` at $8000 and handlers at $9000 (NMI)
/// and $A000 (IRQ), everything else filled with NOPs.
fn rom_with_program(mapper: u16, program: &[u8]) -> Rom {
    let mut prg = vec![0xEA; 0x8000];
    prg[..program.len()].copy_from_slice(program);
    prg[0x7FFA] = 0x00;
    prg[0x7FFB] = 0x90; // NMI -> $9000
    prg[0x7FFC] = 0x00;
    prg[0x7FFD] = 0x80; // RESET -> $8000
    prg[0x7FFE] = 0x00;
    prg[0x7FFF] = 0xA0; // IRQ -> $A000
    Rom {
        mapper,
        submapper: 0,
        prg_rom: prg,
        chr_rom: vec![0; 0x2000],
        prg_ram_size: 0x2000,
        prg_nvram_size: 0,
        chr_ram_size: 0,
        chr_nvram_size: 0,
        mirroring: Mirroring::Vertical,
        has_battery: false,
        trainer: None,
        timing: TimingRegion::Ntsc,
    }
}

fn system(program: &[u8]) -> System {
    System::new(rom_with_program(0, program)).unwrap()
}

/// Absolute PPU dot position, valid while rendering is disabled (no
/// odd-frame skip).
fn ppu_dots(sys: &System) -> u64 {
    let ppu = sys.ppu();
    (ppu.frame_count() * 262 + u64::from(ppu.scanline())) * 341 + u64::from(ppu.dot())
}

#[test]
fn ppu_advances_three_dots_per_cpu_cycle() {
    let mut sys = system(&[]);
    let start_dots = ppu_dots(&sys);
    let mut cycles = 0u64;
    for _ in 0..1000 {
        cycles += u64::from(sys.step_instruction().unwrap());
    }
    assert_eq!(ppu_dots(&sys) - start_dots, 3 * cycles);
    assert_eq!(sys.cpu().cycles, cycles);
}

#[test]
fn oam_dma_timing_and_contents() {
    // LDA #$02; STA $4014
    let mut sys = system(&[0xA9, 0x02, 0x8D, 0x14, 0x40]);
    for i in 0..=255u16 {
        sys.bus_write(0x0200 + i, i as u8);
    }

    assert_eq!(sys.step_instruction().unwrap(), 2); // LDA

    let dots_before = ppu_dots(&sys);
    let delta = sys.step_instruction().unwrap(); // STA + DMA
    // STA abs is 4 cycles; the write lands with the cycle counter even
    // (2 + 4 = 6), so the stall is 513.
    assert_eq!(delta, 4 + 513);
    assert_eq!(ppu_dots(&sys) - dots_before, 3 * u64::from(delta));

    // OAM now holds the RAM page.
    for i in 0..=255u8 {
        sys.bus_write(0x2003, i);
        assert_eq!(sys.bus_read(0x2004), i, "OAM[{i}]");
    }
}

#[test]
fn oam_dma_odd_cycle_pays_514() {
    // LDA #$02; INC $10; STA $4014: the 5-cycle INC leaves the cycle
    // counter odd when the DMA starts (2 + 5 + 4 = 11).
    let mut sys = system(&[0xA9, 0x02, 0xE6, 0x10, 0x8D, 0x14, 0x40]);
    sys.step_instruction().unwrap(); // LDA, 2
    sys.step_instruction().unwrap(); // INC zp, 5 -> cycles = 7
    let delta = sys.step_instruction().unwrap(); // STA at odd parity
    assert_eq!(delta, 4 + 514);
}

#[test]
fn nmi_late_enable_is_serviced_next_step() {
    let mut sys = system(&[]);
    // Run with NMI disabled until VBlank has begun.
    while !(sys.ppu().scanline() == 241 && sys.ppu().dot() >= 2) {
        sys.step_instruction().unwrap();
    }
    assert_eq!(sys.ppu().status_bits() & 0x80, 0x80);

    // Enable NMI while the flag is already set: the edge latches at once.
    sys.bus_write(0x2000, 0x80);
    let delta = sys.step_instruction().unwrap();
    assert_eq!(delta, 7); // interrupt sequence
    assert_eq!(sys.cpu().pc, 0x9000); // NMI vector target
}

#[test]
fn status_read_before_enable_swallows_nmi() {
    let mut sys = system(&[]);
    while !(sys.ppu().scanline() == 241 && sys.ppu().dot() >= 2) {
        sys.step_instruction().unwrap();
    }
    let _ = sys.bus_read(0x2002); // clears VBlank
    sys.bus_write(0x2000, 0x80); // enable: flag is gone, no edge
    sys.step_instruction().unwrap();
    assert_ne!(sys.cpu().pc, 0x9000);
}

#[test]
fn mmc3_raster_irq_counts_scanlines() {
    let mut sys = System::new(rom_with_program(4, &[])).unwrap();

    // Sprite table at $1000 so sprite fetches produce the per-line A12
    // rise; background rendering on.
    sys.bus_write(0x2000, 0x08);
    sys.bus_write(0x2001, 0x08);
    // Latch 3, reload, enable: reload on line 0, zero on line 3.
    sys.bus_write(0xC000, 3);
    sys.bus_write(0xC001, 0);
    sys.bus_write(0xE001, 0);

    let run_to_line = |sys: &mut System, line: u16| {
        while sys.ppu().scanline() < line {
            sys.step_instruction().unwrap();
        }
    };

    run_to_line(&mut sys, 1);
    assert!(!sys.mapper().irq_pending(), "after one scanline");
    run_to_line(&mut sys, 2);
    assert!(!sys.mapper().irq_pending(), "after two scanlines");
    run_to_line(&mut sys, 4);
    assert!(sys.mapper().irq_pending(), "counter reached zero");

    sys.mapper_mut().clear_irq();
    assert!(!sys.mapper().irq_pending());
}

#[test]
fn mmc3_irq_is_serviced_at_instruction_boundary() {
    // CLI so the IRQ is taken once the mapper asserts the line.
    let mut sys = System::new(rom_with_program(4, &[0x58])).unwrap();
    sys.bus_write(0x2000, 0x08);
    sys.bus_write(0x2001, 0x08);
    sys.bus_write(0xC000, 1);
    sys.bus_write(0xC001, 0);
    sys.bus_write(0xE001, 0);

    for _ in 0..2000 {
        sys.step_instruction().unwrap();
        if sys.cpu().pc >= 0xA000 {
            break;
        }
    }
    assert!(sys.cpu().pc >= 0xA000, "IRQ handler reached");
}

#[test]
fn sprite_zero_hit_end_to_end() {
    // Build CHR: tile 1 solid (background), tile 2 left-edge only.
    let mut rom = rom_with_program(0, &[]);
    for row in 0..8 {
        rom.chr_rom[0x10 + row] = 0xFF;
        rom.chr_rom[0x20 + row] = 0x80;
    }
    let mut sys = System::new(rom).unwrap();

    // Fill the first nametable with tile 1.
    sys.bus_write(0x2006, 0x20);
    sys.bus_write(0x2006, 0x00);
    for _ in 0..0x3C0 {
        sys.bus_write(0x2007, 1);
    }
    // Sprite 0: y=40, tile 2, x=8.
    sys.bus_write(0x2003, 0x00);
    for b in [40, 2, 0, 8] {
        sys.bus_write(0x2004, b);
    }
    // BG + sprites, left columns masked off.
    sys.bus_write(0x2001, 0x18);

    while sys.ppu().scanline() < 60 {
        sys.step_instruction().unwrap();
    }
    assert_eq!(sys.bus_read(0x2002) & 0x40, 0x40);
}

#[test]
fn apu_frame_irq_seed() {
    let mut sys = system(&[]);
    sys.bus_write(0x4017, 0x00);
    let start = sys.cpu().cycles;
    while sys.cpu().cycles - start < 14_917 {
        sys.step_instruction().unwrap();
    }
    let status = sys.bus_read(0x4015);
    assert_eq!(status & 0x40, 0x40, "frame IRQ flag set");
    let status = sys.bus_read(0x4015);
    assert_eq!(status & 0x40, 0x00, "read-clear");
}

#[test]
fn apu_sweep_seed() {
    let mut sys = system(&[]);
    sys.bus_write(0x4015, 0x03);
    sys.bus_write(0x4002, 0x00);
    sys.bus_write(0x4003, 0x02); // pulse1 timer 0x200
    sys.bus_write(0x4001, 0b1000_1001);
    sys.bus_write(0x4006, 0x00);
    sys.bus_write(0x4007, 0x02); // pulse2 timer 0x200
    sys.bus_write(0x4005, 0b1000_1001);
    sys.bus_write(0x4017, 0x00);

    let start = sys.cpu().cycles;
    while sys.cpu().cycles - start < 14_917 {
        sys.step_instruction().unwrap();
    }

    assert_eq!(sys.apu().pulse1_period(), 0x0FF);
    assert_eq!(sys.apu().pulse2_period(), 0x100);
}

#[test]
fn unknown_opcode_halts_deterministically() {
    let mut sys = system(&[0xEA, 0x02]);
    sys.step_instruction().unwrap();
    let err = sys.step_instruction().unwrap_err();
    assert_eq!(
        err,
        SystemError::UnknownOpcode {
            pc: 0x8001,
            opcode: 0x02
        }
    );
    assert!(sys.is_halted());
    // The system stays halted with the same error.
    assert_eq!(sys.step_instruction().unwrap_err(), err);
    // State remains inspectable.
    assert_eq!(sys.cpu().pc, 0x8001);
}

#[test]
fn battery_roundtrip_through_system() {
    let mut rom = rom_with_program(1, &[]);
    rom.has_battery = true;
    rom.prg_nvram_size = 0x2000;
    rom.prg_ram_size = 0;
    let mut sys = System::new(rom.clone()).unwrap();

    sys.bus_write(0x6000, 0xAA);
    sys.bus_write(0x7FFF, 0x55);
    let saved = sys.export_battery().unwrap();

    let mut fresh = System::new(rom).unwrap();
    fresh.import_battery(&saved).unwrap();
    assert_eq!(fresh.bus_read(0x6000), 0xAA);
    assert_eq!(fresh.bus_read(0x7FFF), 0x55);

    // Wrong-size import is rejected and keeps contents.
    let err = fresh.import_battery(&[0; 4]).unwrap_err();
    assert!(matches!(err, SystemError::BatteryRamSizeMismatch { .. }));
    assert_eq!(fresh.bus_read(0x6000), 0xAA);
}

#[test]
fn run_frame_reaches_next_frame_boundary() {
    let mut sys = system(&[]);
    assert_eq!(sys.ppu().frame_count(), 0);
    sys.run_frame().unwrap();
    assert_eq!(sys.ppu().frame_count(), 1);
    sys.run_frame().unwrap();
    assert_eq!(sys.ppu().frame_count(), 2);
}

#[test]
fn controller_input_end_to_end() {
    use famicore_core::Button;

    // LDA #$01; STA $4016; LDA #$00; STA $4016; LDA $4016 (x2)
    let mut sys = system(&[
        0xA9, 0x01, 0x8D, 0x16, 0x40, // strobe on
        0xA9, 0x00, 0x8D, 0x16, 0x40, // strobe off (latch)
        0xAD, 0x16, 0x40, // read A
        0xAD, 0x16, 0x40, // read B
    ]);
    sys.controller_mut(0).set_button(Button::A, true);

    for _ in 0..5 {
        sys.step_instruction().unwrap();
    }
    assert_eq!(sys.cpu().a & 1, 1, "A pressed");
    sys.step_instruction().unwrap();
    assert_eq!(sys.cpu().a & 1, 0, "B released");
}

#[test]
fn fme7_cycle_irq_end_to_end() {
    let mut sys = System::new(rom_with_program(69, &[])).unwrap();
    // Counter = 1000 cycles, enable counter and IRQ.
    sys.bus_write(0x8000, 0x0E);
    sys.bus_write(0xA000, 0xE8); // 1000 & 0xFF
    sys.bus_write(0x8000, 0x0F);
    sys.bus_write(0xA000, 0x03); // 1000 >> 8
    sys.bus_write(0x8000, 0x0D);
    sys.bus_write(0xA000, 0x81);

    let start = sys.cpu().cycles;
    while sys.cpu().cycles - start <= 1000 {
        sys.step_instruction().unwrap();
    }
    assert!(sys.mapper().irq_pending());

    // The IRQ-control write acknowledges.
    sys.bus_write(0x8000, 0x0D);
    sys.bus_write(0xA000, 0x81);
    assert!(!sys.mapper().irq_pending());
}

#[test]
fn mmc5_scanline_irq_end_to_end() {
    let mut sys = System::new(rom_with_program(5, &[])).unwrap();
    sys.bus_write(0x2001, 0x08); // rendering on
    sys.bus_write(0x5203, 50);
    sys.bus_write(0x5204, 0x80);

    while sys.ppu().scanline() < 49 {
        sys.step_instruction().unwrap();
    }
    assert!(!sys.mapper().irq_pending());
    while sys.ppu().scanline() < 51 {
        sys.step_instruction().unwrap();
    }
    assert!(sys.mapper().irq_pending());
}

#[test]
fn trainer_seeds_wram_at_7000() {
    let mut rom = rom_with_program(0, &[]);
    let mut trainer = vec![0x5A; 512];
    trainer[0] = 0x11;
    trainer[511] = 0x22;
    rom.trainer = Some(trainer);
    let mut sys = System::new(rom).unwrap();

    assert_eq!(sys.bus_read(0x7000), 0x11);
    assert_eq!(sys.bus_read(0x7001), 0x5A);
    assert_eq!(sys.bus_read(0x71FF), 0x22);
    // WRAM outside the trainer block is untouched.
    assert_eq!(sys.bus_read(0x7200), 0x00);
    assert_eq!(sys.bus_read(0x6000), 0x00);
}

#[test]
fn pal_region_applied_from_rom_record() {
    let mut rom = rom_with_program(0, &[]);
    rom.timing = TimingRegion::Pal;
    let sys = System::new(rom).unwrap();
    assert_eq!(sys.ppu().lines_per_frame(), 312);
}
