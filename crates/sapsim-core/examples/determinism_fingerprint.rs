//! Deterministic history fingerprint used to compare builds across hosts.

use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use sapsim_core::{Computer, ComputerState, Memory};

// 0x00 LXI SP,0x0100
// 0x03 MVI B,5
// 0x05 MVI A,0
// 0x07 loop: ADD B
// 0x08 DCR B
// 0x09 JNZ loop
// 0x0C PUSH PSW
// 0x0D LXI H,0x00F0
// 0x10 LXI D,0x0001
// 0x13 DAD D
// 0x14 MOV M,A
// 0x15 CALL 0x0005
// 0x18 OUT 1
// 0x1A POP B
// 0x1B HLT
const PROGRAM: [u8; 28] = [
    0x31, 0x00, 0x01, 0x06, 0x05, 0x3E, 0x00, 0x80, 0x05, 0xC2, 0x07, 0x00, 0xF5, 0x21, 0xF0, 0x00,
    0x11, 0x01, 0x00, 0x19, 0x77, 0xCD, 0x05, 0x00, 0xD3, 0x01, 0xC1, 0x76,
];

const RUN_BUDGET: u64 = 4000;

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn hash_state(hash: &mut u64, state: &ComputerState) {
    hash_bytes(hash, &state.half_ticks.to_le_bytes());
    hash_bytes(hash, &state.control_word.bits().to_le_bytes());
    hash_bytes(hash, &state.registers);
    hash_bytes(
        hash,
        &[
            state.ir,
            state.alu_acc,
            state.alu_stored,
            state.alu_tmp,
            u8::from(state.alu_carry),
            state.alu_flags,
            state.stage,
            state.stage_max,
            u8::from(state.stage_rst),
            state.out,
        ],
    );
    hash_bytes(hash, &state.bus.to_le_bytes());
    hash_bytes(hash, &state.mar.to_le_bytes());
}

fn fingerprint() -> String {
    let mut computer = Computer::with_program(&PROGRAM).expect("program should fit");
    computer.set_system_call_handler(|_: u8, _: u16, _: &Memory| {});

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    let mut steps = 0_u64;
    while !computer.is_halted() && computer.clock().half_ticks() < RUN_BUDGET {
        for state in computer.step().expect("program should run") {
            hash_state(&mut hash, state);
        }
        steps += 1;
    }

    hash_bytes(&mut hash, &steps.to_le_bytes());
    hash_bytes(&mut hash, computer.memory().bytes());
    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
