//! Whole-system throughput benchmarks.

use criterion::{criterion_group, criterion_main, Criterion};
use famicore_core::System;
use famicore_mappers::{Mirroring, Rom, TimingRegion};

fn nop_rom() -> Rom {
    let mut prg = vec![0xEA; 0x8000];
    prg[0x7FFC] = 0x00;
    prg[0x7FFD] = 0x80;
    Rom {
        mapper: 0,
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

fn bench_run_frame(c: &mut Criterion) {
    c.bench_function("run_frame_nop", |b| {
        let mut system = System::new(nop_rom()).unwrap();
        b.iter(|| {
            system.run_frame().unwrap();
        });
    });
}

fn bench_run_frame_rendering(c: &mut Criterion) {
    c.bench_function("run_frame_rendering", |b| {
        let mut system = System::new(nop_rom()).unwrap();
        system.bus_write(0x2001, 0x18);
        b.iter(|| {
            system.run_frame().unwrap();
        });
    });
}

criterion_group!(benches, bench_run_frame, bench_run_frame_rendering);
criterion_main!(benches);
