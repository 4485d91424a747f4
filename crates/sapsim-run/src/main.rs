//! CLI entry point for the SAP-8080 simulator runner.

mod logger;

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::PathBuf;

use sapsim_core::{
    disassemble, BdosConsole, Computer, ComputerConfig, ComputerState, DisassemblyRow, HaltReason,
    Memory, Program,
};
use serde_json::json;
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: sapsim-run <command> <image> [options]

Commands:
  run    <image>  Run until HLT or until the half-tick budget is spent
  step   <image>  Execute instructions one at a time, printing each
  disasm <image>  List the image

Options:
  -m, --max <n>        Half-tick budget for run (default 2000)
  -n, --count <n>      Instructions to execute for step (default 1)
  -l, --labels <file>  JSON label map, e.g. {\"start\": 0, \"loop\": 12}
  -j, --json           Print snapshots as JSON; console output moves to stderr
  -v, --verbose        Log to stderr; repeat for debug and trace output
  -h, --help           Show this help message

Exit status: 0 on HLT or after stepping, 2 when the budget runs out, 1 on error.

Examples:
  sapsim-run run hello.bin
  sapsim-run run hello.bin --max 10000 --labels hello.labels.json
  sapsim-run step hello.bin -n 5 --json
  sapsim-run disasm hello.bin
";

const DEFAULT_STEP_COUNT: u64 = 1;
const BUDGET_EXHAUSTED: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Run,
    Step,
    Disasm,
}

#[derive(Debug, PartialEq, Eq)]
struct SimArgs {
    kind: CommandKind,
    input: PathBuf,
    labels: Option<PathBuf>,
    limit: Option<u64>,
    json: bool,
    verbosity: u8,
}

#[derive(Debug)]
enum ParseResult {
    Command(SimArgs),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();
    let kind = match command_str.as_str() {
        "run" => CommandKind::Run,
        "step" => CommandKind::Step,
        "disasm" => CommandKind::Disasm,
        other => return Err(format!("unknown command: {other}")),
    };
    parse_sim_args(kind, args).map(ParseResult::Command)
}

#[allow(clippy::while_let_on_iterator)]
fn parse_sim_args(
    kind: CommandKind,
    mut args: impl Iterator<Item = OsString>,
) -> Result<SimArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut labels: Option<PathBuf> = None;
    let mut limit: Option<u64> = None;
    let mut json = false;
    let mut verbosity = 0_u8;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "-l" || arg == "--labels" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --labels".to_string())?;
            labels = Some(PathBuf::from(value));
            continue;
        }

        let runs = kind != CommandKind::Disasm;
        if runs && (arg == "--verbose" || arg == "-v") {
            verbosity = verbosity.saturating_add(1);
            continue;
        }

        if runs && (arg == "--json" || arg == "-j") {
            json = true;
            continue;
        }

        let limit_flag = match kind {
            CommandKind::Run => arg == "-m" || arg == "--max",
            CommandKind::Step => arg == "-n" || arg == "--count",
            CommandKind::Disasm => false,
        };
        if limit_flag {
            let name = arg.to_string_lossy().to_string();
            let value = args
                .next()
                .ok_or_else(|| format!("missing value for {name}"))?;
            limit = Some(parse_number(&value, &name)?);
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if input.is_some() {
            return Err("multiple input paths provided".to_string());
        }
        input = Some(PathBuf::from(arg));
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(SimArgs {
        kind,
        input,
        labels,
        limit,
        json,
        verbosity,
    })
}

fn parse_number(value: &OsString, flag: &str) -> Result<u64, String> {
    let text = value.to_string_lossy();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| format!("invalid number for {flag}: {text}"))
}

fn load_program(args: &SimArgs) -> Result<Program, String> {
    let bytes = fs::read(&args.input)
        .map_err(|e| format!("failed to read {}: {e}", args.input.display()))?;
    let program = Program::new(bytes).map_err(|e| format!("{}: {e}", args.input.display()))?;

    let Some(path) = &args.labels else {
        return Ok(program);
    };
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let labels: BTreeMap<String, u16> = serde_json::from_str(&text)
        .map_err(|e| format!("invalid label map {}: {e}", path.display()))?;
    Ok(program.with_labels(labels))
}

fn build_computer(program: &Program, args: &SimArgs) -> Result<Computer, String> {
    let config = ComputerConfig {
        record_history: args.json,
        ..ComputerConfig::default()
    };
    let mut computer = Computer::new(config);
    computer
        .reset(Some(program.bytes()))
        .map_err(|e| e.to_string())?;
    if args.json {
        computer.set_system_call_handler(BdosConsole::new(io::stderr()));
    } else {
        computer.set_system_call_handler(BdosConsole::new(io::stdout()));
    }
    Ok(computer)
}

fn register_line(computer: &Computer) -> String {
    let regs = computer.registers();
    format!(
        "A={:02X} F={:02X} B={:02X} C={:02X} D={:02X} E={:02X} H={:02X} L={:02X} SP={:04X} PC={:04X} OUT={:02X}",
        computer.alu().acc(),
        computer.alu().flags(),
        regs.b(),
        regs.c(),
        regs.d(),
        regs.e(),
        regs.h(),
        regs.l(),
        regs.sp(),
        regs.pc(),
        computer.out()
    )
}

fn describe_halt(reason: Option<HaltReason>) -> String {
    match reason {
        Some(HaltReason::UnimplementedOpcode { opcode, address }) => {
            format!("unimplemented opcode {opcode:#04x} at {address:#06x}")
        }
        Some(HaltReason::Instruction) | None => "HLT".to_string(),
    }
}

fn report_fault(computer: &Computer, error: &sapsim_core::SimError) {
    eprintln!(
        "error: {error} (pc {:#06x}, ir {:#04x}, half-tick {})",
        computer.registers().pc(),
        computer.ir().value(),
        computer.clock().half_ticks()
    );
}

fn print_json(value: &serde_json::Value) -> Result<(), i32> {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => {
            eprintln!("error: failed to encode JSON: {e}");
            Err(1)
        }
    }
}

fn prepare(args: &SimArgs) -> Result<(Program, Computer), i32> {
    let program = load_program(args).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let computer = build_computer(&program, args).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    Ok((program, computer))
}

fn run_run(args: &SimArgs) -> Result<(), i32> {
    let (_, mut computer) = prepare(args)?;
    let budget = args
        .limit
        .unwrap_or(computer.config().default_run_budget);

    let outcome = match computer.run(budget) {
        Ok(outcome) => outcome,
        Err(e) => {
            report_fault(&computer, &e);
            return Err(1);
        }
    };

    if args.json {
        print_json(&json!({
            "outcome": outcome,
            "halt_reason": computer.halt_reason(),
            "history": computer.history(),
        }))?;
    } else {
        if outcome.halted {
            println!(
                "halted ({}) after {} half-ticks ({} cycles)",
                describe_halt(computer.halt_reason()),
                outcome.half_ticks,
                outcome.half_ticks / 2
            );
        } else {
            println!("budget of {budget} half-ticks exhausted without HLT");
        }
        println!("{}", register_line(&computer));
    }

    if outcome.halted {
        Ok(())
    } else {
        Err(BUDGET_EXHAUSTED)
    }
}

fn run_step(args: &SimArgs) -> Result<(), i32> {
    let (program, mut computer) = prepare(args)?;
    let count = args.limit.unwrap_or(DEFAULT_STEP_COUNT);
    let mut steps: Vec<serde_json::Value> = Vec::new();

    for _ in 0..count {
        if computer.is_halted() {
            break;
        }
        let row = disassemble(computer.memory(), computer.registers().pc());
        let states: Vec<ComputerState> = match computer.step() {
            Ok(states) => states.to_vec(),
            Err(e) => {
                report_fault(&computer, &e);
                return Err(1);
            }
        };

        if args.json {
            steps.push(json!({
                "address": row.address,
                "label": program.label_at(row.address),
                "text": row.text,
                "states": states,
            }));
        } else {
            println!("{}  {}", format_row(&program, &row), register_line(&computer));
        }
    }

    if args.json {
        print_json(&serde_json::Value::Array(steps))?;
    } else if computer.is_halted() {
        println!("halted ({})", describe_halt(computer.halt_reason()));
    }
    Ok(())
}

fn format_row(program: &Program, row: &DisassemblyRow) -> String {
    let label = program.label_at(row.address).unwrap_or("");
    format!("{:04X} {label:<10} {:<14}", row.address, row.text)
}

fn run_disasm(args: &SimArgs) -> Result<(), i32> {
    let program = load_program(args).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let mut memory = Memory::default();
    if let Err(e) = memory.load(program.bytes()) {
        eprintln!("error: {e}");
        return Err(1);
    }

    let end = program.bytes().len();
    let mut address = 0_usize;
    while address < end {
        let Ok(at) = u16::try_from(address) else {
            break;
        };
        let row = disassemble(&memory, at);
        let len = usize::from(row.len.max(1));
        let hex_bytes = program.bytes()[address..(address + len).min(end)]
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}  {hex_bytes}", format_row(&program, &row));
        address += len;
    }
    Ok(())
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(args)) => {
            if let Err(e) = logger::init(args.verbosity) {
                eprintln!("error: failed to install logger: {e}");
            }
            let result = match args.kind {
                CommandKind::Run => run_run(&args),
                CommandKind::Step => run_step(&args),
                CommandKind::Disasm => run_disasm(&args),
            };
            match result {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
