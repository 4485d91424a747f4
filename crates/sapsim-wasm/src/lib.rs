use core::fmt::Display;

use log::{Level, LevelFilter};
use sapsim_core::{
    disassemble, Computer, ComputerConfig, ComputerState, DisassemblyRow, HaltReason, Memory,
    RunOutcome, SimError, SystemCallHandler,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

macro_rules! console_log {
    ($($t:tt)*) => (log(&format!($($t)*)))
}

fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Warn)
}

/// Routes simulator logging to the console at `level` ("off", "error",
/// "warn", "info", "debug" or "trace"; anything else means "warn").
#[wasm_bindgen]
pub fn init_logging(level: &str) {
    if console_log::init_with_level(Level::Trace).is_ok() {
        console_log!("sapsim logging enabled");
    }
    log::set_max_level(parse_level(level));
}

/// One executed instruction: its disassembly and the snapshots it produced.
#[derive(Debug, Serialize)]
pub struct StepReport {
    pub row: DisassemblyRow,
    pub states: Vec<ComputerState>,
}

/// Halt status for the UI.
#[derive(Debug, Serialize)]
pub struct HaltStatus {
    pub halted: bool,
    pub reason: Option<HaltReason>,
    pub fault: Option<String>,
}

/// Calls a JS function as `callback(c, de, memory)` for every system call.
struct JsSystemCallHandler {
    callback: js_sys::Function,
}

impl SystemCallHandler for JsSystemCallHandler {
    fn on_system_call(&mut self, c: u8, de: u16, memory: &Memory) {
        let ram = js_sys::Uint8Array::from(memory.bytes());
        if let Err(err) = self
            .callback
            .call3(&JsValue::NULL, &c.into(), &de.into(), &ram)
        {
            web_sys::console::error_2(&JsValue::from_str("system call handler threw"), &err);
        }
    }
}

fn to_js_error(error: impl Display) -> JsValue {
    js_sys::Error::new(&error.to_string()).into()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(to_js_error)
}

#[wasm_bindgen]
pub struct WasmComputer {
    computer: Computer,
    program: Vec<u8>,
}

impl Default for WasmComputer {
    fn default() -> Self {
        Self::new()
    }
}

impl WasmComputer {
    fn with_config(config: ComputerConfig) -> Self {
        Self {
            computer: Computer::new(config),
            program: Vec::new(),
        }
    }

    fn load(&mut self, program: &[u8]) -> Result<(), SimError> {
        self.computer.reset(Some(program))?;
        self.program = program.to_vec();
        Ok(())
    }

    fn step_report(&mut self) -> Result<StepReport, SimError> {
        let row = disassemble(self.computer.memory(), self.computer.registers().pc());
        let states = self.computer.step()?.to_vec();
        Ok(StepReport { row, states })
    }

    fn halt_status(&self) -> HaltStatus {
        HaltStatus {
            halted: self.computer.is_halted(),
            reason: self.computer.halt_reason(),
            fault: self.computer.fault().map(|fault| fault.to_string()),
        }
    }
}

#[wasm_bindgen]
impl WasmComputer {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        console_error_panic_hook::set_once();
        Self::with_config(ComputerConfig::default())
    }

    /// Resets the machine and loads a program at address 0x0000.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), JsValue> {
        self.load(program).map_err(to_js_error)?;
        console_log!("Loaded {} bytes into memory", program.len());
        Ok(())
    }

    /// Resets the machine and reloads the last program.
    pub fn reset(&mut self) -> Result<(), JsValue> {
        self.computer
            .reset(Some(&self.program))
            .map_err(to_js_error)
    }

    /// Raises the reset line for the next half-tick.
    pub fn pulse_reset(&mut self) {
        self.computer.pulse_reset();
    }

    /// Installs `callback(c, de, memory)` as the system-call handler.
    pub fn set_system_call_handler(&mut self, callback: js_sys::Function) {
        self.computer
            .set_system_call_handler(JsSystemCallHandler { callback });
    }

    /// Runs one half-tick.
    pub fn half_tick(&mut self) -> Result<(), JsValue> {
        self.computer.half_tick().map_err(to_js_error)
    }

    /// Executes one instruction.
    /// Returns `{ row, states }` as a JS object.
    pub fn step(&mut self) -> Result<JsValue, JsValue> {
        let report = self.step_report().map_err(to_js_error)?;
        to_js(&report)
    }

    /// Runs until HLT or `max_half_ticks`.
    /// Returns `{ half_ticks, halted }` as a JS object.
    pub fn run(&mut self, max_half_ticks: u32) -> Result<JsValue, JsValue> {
        let outcome: RunOutcome = self
            .computer
            .run(u64::from(max_half_ticks))
            .map_err(to_js_error)?;
        to_js(&outcome)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.computer.snapshot())
    }

    /// Snapshots recorded since the last reset or step.
    pub fn history(&self) -> Result<JsValue, JsValue> {
        to_js(&self.computer.history())
    }

    /// Halt flag, halt reason and latched fault.
    pub fn status(&self) -> Result<JsValue, JsValue> {
        to_js(&self.halt_status())
    }

    /// Value latched by the last `OUT`.
    pub fn out(&self) -> u8 {
        self.computer.out()
    }

    /// Copy of the whole RAM.
    pub fn memory(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.computer.memory().bytes())
    }

    /// Disassembly of the instruction at `address`.
    pub fn disassemble(&self, address: u16) -> Result<JsValue, JsValue> {
        to_js(&disassemble(self.computer.memory(), address))
    }
}
