//! Property coverage for data movement, arithmetic and determinism.

use log as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use proptest::prelude::*;
use sapsim_core::{Computer, ComputerConfig, FLAG_CARRY, FLAG_ZERO};

const HLT: u8 = 0x76;

fn run_to_halt(image: &[u8]) -> Computer {
    let mut computer = Computer::with_program(image).expect("image fits");
    let outcome = computer.run_default().expect("program runs");
    assert!(outcome.halted);
    computer
}

proptest! {
    #[test]
    fn mvi_then_mov_chain_copies_the_value(value in any::<u8>()) {
        // MVI B,v; MOV C,B; MOV A,C; MOV L,A; HLT
        let computer = run_to_halt(&[0x06, value, 0x48, 0x79, 0x6F, HLT]);
        prop_assert_eq!(computer.registers().b(), value);
        prop_assert_eq!(computer.registers().c(), value);
        prop_assert_eq!(computer.alu().acc(), value);
        prop_assert_eq!(computer.registers().l(), value);
    }

    #[test]
    fn inx_and_dcx_wrap_modulo_65536(value in any::<u16>()) {
        let [lo, hi] = value.to_le_bytes();
        // LXI H,v; INX H; LXI D,v; DCX D; HLT
        let computer = run_to_halt(&[0x21, lo, hi, 0x23, 0x11, lo, hi, 0x1B, HLT]);
        prop_assert_eq!(computer.registers().hl(), value.wrapping_add(1));
        prop_assert_eq!(computer.registers().de(), value.wrapping_sub(1));
    }

    #[test]
    fn add_matches_wrapping_arithmetic(a in any::<u8>(), b in any::<u8>()) {
        // MVI A,a; MVI B,b; ADD B; HLT
        let computer = run_to_halt(&[0x3E, a, 0x06, b, 0x80, HLT]);
        let (sum, carry) = a.overflowing_add(b);
        let flags = computer.alu().flags();
        prop_assert_eq!(computer.alu().acc(), sum);
        prop_assert_eq!(flags & FLAG_CARRY != 0, carry);
        prop_assert_eq!(flags & FLAG_ZERO != 0, sum == 0);
    }

    #[test]
    fn sub_matches_wrapping_arithmetic(a in any::<u8>(), b in any::<u8>()) {
        // MVI A,a; SUI b; HLT
        let computer = run_to_halt(&[0x3E, a, 0xD6, b, HLT]);
        let (diff, borrow) = a.overflowing_sub(b);
        prop_assert_eq!(computer.alu().acc(), diff);
        prop_assert_eq!(computer.alu().flags() & FLAG_CARRY != 0, borrow);
    }

    #[test]
    fn dad_matches_sixteen_bit_addition(hl in any::<u16>(), bc in any::<u16>(), a in any::<u8>()) {
        let [hl_lo, hl_hi] = hl.to_le_bytes();
        let [bc_lo, bc_hi] = bc.to_le_bytes();
        // LXI H,hl; LXI B,bc; MVI A,a; DAD B; HLT
        let computer = run_to_halt(&[
            0x21, hl_lo, hl_hi, 0x01, bc_lo, bc_hi, 0x3E, a, 0x09, HLT,
        ]);
        prop_assert_eq!(computer.registers().hl(), hl.wrapping_add(bc));
        prop_assert_eq!(computer.alu().acc(), a);
    }

    #[test]
    fn push_pop_round_trips_any_pair(value in any::<u16>()) {
        let [lo, hi] = value.to_le_bytes();
        // LXI SP,0x0200; LXI H,v; PUSH H; POP B; HLT
        let computer = run_to_halt(&[0x31, 0x00, 0x02, 0x21, lo, hi, 0xE5, 0xC1, HLT]);
        prop_assert_eq!(computer.registers().bc(), value);
        prop_assert_eq!(computer.registers().sp(), 0x0200);
    }

    #[test]
    fn arbitrary_programs_run_deterministically(
        image in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let config = ComputerConfig {
            snapshot_memory_window: 64,
            ..ComputerConfig::default()
        };
        let mut first = Computer::new(config.clone());
        let mut second = Computer::new(config);
        first.reset(Some(&image)).expect("image fits");
        second.reset(Some(&image)).expect("image fits");

        let first_outcome = first.run(400);
        let second_outcome = second.run(400);
        prop_assert_eq!(first_outcome, second_outcome);
        prop_assert_eq!(first.snapshot(), second.snapshot());
        prop_assert_eq!(first.halt_reason(), second.halt_reason());
        prop_assert_eq!(first.fault(), second.fault());
    }
}
