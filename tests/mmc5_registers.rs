//! MMC5 register map as seen from the CPU bus

use fami_expansion::bus::{ExpansionBus, RegisterSink, N163_ADDRESS_PORT, N163_DATA_PORT};
use fami_expansion::chip::{ChipKind, SoundChip};
use fami_expansion::mmc5::{Mmc5, EXRAM_END, EXRAM_START};
use fami_expansion::tables::CPU_CLOCK_NTSC;

use approx::assert_relative_eq;

#[test]
fn multiplier_products() {
    let mut chip = Mmc5::new();
    for (a, b) in [(0u8, 0u8), (1, 255), (200, 3), (255, 255), (16, 16)] {
        chip.write(0x5205, a);
        chip.write(0x5206, b);
        let product = a as u16 * b as u16;
        assert_eq!(chip.read(0x5205), Some((product & 0xFF) as u8));
        assert_eq!(chip.read(0x5206), Some((product >> 8) as u8));
    }
}

#[test]
fn multiplier_covers_every_operand_pair_in_either_order() {
    let mut chip = Mmc5::new();
    for a in 0..=255u8 {
        for b in 0..=255u8 {
            let product = a as u16 * b as u16;
            let expected = (Some((product & 0xFF) as u8), Some((product >> 8) as u8));

            chip.write(0x5205, a);
            chip.write(0x5206, b);
            assert_eq!((chip.read(0x5205), chip.read(0x5206)), expected, "{a} * {b}");

            chip.write(0x5206, b);
            chip.write(0x5205, a);
            assert_eq!((chip.read(0x5205), chip.read(0x5206)), expected, "{b} then {a}");
        }
    }
}

#[test]
fn multiplier_reads_do_not_change_operands() {
    let mut chip = Mmc5::new();
    chip.write(0x5205, 7);
    chip.write(0x5206, 9);
    chip.read(0x5205);
    chip.read(0x5206);
    assert_eq!(chip.multiplier_operands(), (7, 9));
}

#[test]
fn exram_window() {
    let mut chip = Mmc5::new();
    chip.write(EXRAM_START, 0x12);
    chip.write(EXRAM_END, 0x34);
    assert_eq!(chip.read(EXRAM_START), Some(0x12));
    assert_eq!(chip.read(EXRAM_END), Some(0x34));
    // Past the audio-side window
    chip.write(0x5FF6, 0x56);
    assert_eq!(chip.read(0x5FF6), None);
}

#[test]
fn exram_every_address_round_trips() {
    let mut chip = Mmc5::new();
    let pattern = |address: u16| (address as u8) ^ ((address >> 8) as u8).rotate_left(3);
    for address in EXRAM_START..=EXRAM_END {
        chip.write(address, pattern(address));
    }
    for address in EXRAM_START..=EXRAM_END {
        assert_eq!(chip.read(address), Some(pattern(address)), "address ${address:04X}");
    }
}

#[test]
fn unclaimed_reads_are_open_bus() {
    let mut chip = Mmc5::new();
    for address in [0x5000u16, 0x5003, 0x5015, 0x5204, 0x5207, 0x4015] {
        assert_eq!(chip.read(address), None, "address ${address:04X}");
    }
}

#[test]
fn pulse_voice_through_registers() {
    let mut chip = Mmc5::new();
    chip.write(0x5015, 0x03);
    chip.write(0x5004, 0xBF);
    chip.write(0x5006, 0xFD);
    chip.write(0x5007, 0x08);

    let voice = chip.voice(1).expect("second voice");
    assert_eq!(voice.period(), 0xFD);
    assert_eq!(voice.duty(), 2);
    assert_eq!(voice.volume(), 15);
    assert!(voice.length() > 0);
    assert_relative_eq!(
        chip.frequency(1),
        CPU_CLOCK_NTSC / (16.0 * (0xFD as f64 + 1.0)),
        max_relative = 1e-12
    );
    assert_eq!(chip.frequency(0), 0.0);
    assert_eq!(chip.frequency(2), 0.0);
}

#[test]
fn edge_buffer_is_per_frame() {
    let mut chip = Mmc5::new();
    chip.write(0x5015, 0x01);
    chip.write(0x5000, 0xBF);
    chip.write(0x5002, 0xFD);
    chip.write(0x5003, 0x00);

    for _ in 0..600 {
        chip.process(29_780);
        chip.end_frame();
    }
    assert!(chip.take_edges(0).is_empty());

    chip.process(29_780);
    let edges = chip.take_edges(0);
    assert!(!edges.is_empty());
    assert!(edges.len() < 32);
    assert!(chip.take_edges(0).is_empty());
    assert!(chip.take_edges(2).is_empty());
}

#[test]
fn reset_restores_duty_register() {
    let mut chip = Mmc5::new();
    chip.write(0x5000, 0xFF);
    chip.reset();
    assert_eq!(chip.voice(0).map(|v| v.register(1)), Some(0x08));
    assert_eq!(chip.voice(1).map(|v| v.register(1)), Some(0x08));
    assert_eq!(chip.voice(0).map(|v| v.register(0)), Some(0x00));
}

#[test]
fn clock_sequence_runs_length_counters() {
    let mut chip = Mmc5::new();
    chip.write(0x5015, 0x01);
    chip.write(0x5000, 0x1F);
    chip.write(0x5002, 0x80);
    chip.write(0x5003, 0x18);
    let start = chip.voice(0).map_or(0, |v| v.length());
    chip.clock_sequence();
    assert_eq!(chip.voice(0).map_or(0, |v| v.length()), start - 1);
    assert_eq!(chip.id(), ChipKind::Mmc5);
}

#[test]
fn expansion_bus_routes_by_address() {
    let mut bus = ExpansionBus::new();
    bus.write_register(0x5205, 12);
    bus.write_register(0x5206, 12);
    bus.write_register(N163_ADDRESS_PORT, 0x05);
    bus.write_register(N163_DATA_PORT, 0x9A);

    assert_eq!(bus.read(0x5205), Some(144));
    assert_eq!(bus.n163.ram()[0x05], 0x9A);
    bus.write_register(N163_ADDRESS_PORT, 0x05);
    assert_eq!(bus.read(N163_DATA_PORT), Some(0x9A));
    assert_eq!(bus.read(0x6000), None);
}
