#![no_main]

use libfuzzer_sys::fuzz_target;
use sapsim_core::{disassemble, Computer, ComputerConfig, Memory, MEMORY_BYTES};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > MEMORY_BYTES {
        return;
    }

    let mut computer = Computer::new(ComputerConfig {
        snapshot_memory_window: 16,
        record_history: false,
        ..ComputerConfig::default()
    });
    if computer.reset(Some(data)).is_err() {
        return;
    }
    computer.set_system_call_handler(|_: u8, de: u16, memory: &Memory| {
        let _ = memory.read_until(de, b'$');
    });

    let _ = computer.run(2_000);
    let _ = computer.snapshot();
    let _ = disassemble(computer.memory(), computer.registers().pc());
});
