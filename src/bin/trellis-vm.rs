//! Opcode VM driver: executes a sequence of hex opcodes and optionally
//! traces each step and dumps the final machine state.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use trellis::tvm::{table, Executor, Machine, DEFAULT_MEMORY_SIZE};

#[derive(Parser)]
#[command(name = "trellis-vm", version, about = "Opcode VM driver")]
struct Cli {
    /// Opcodes to execute in order (e.g. 0x0B 0x5D 0x40)
    opcodes: Vec<String>,

    /// Print per-step IR and assembly names from the reference table
    #[arg(long)]
    trace: bool,

    /// Dump the final register and flag state as JSON
    #[arg(long)]
    dump_state: bool,

    /// Memory size in bytes
    #[arg(long, default_value_t = DEFAULT_MEMORY_SIZE)]
    mem_size: usize,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn parse_opcode(token: &str) -> Option<u8> {
    let hex = token.trim().strip_prefix("0x").unwrap_or(token.trim());
    u8::from_str_radix(hex, 16).ok()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut executor = Executor::with_machine(Machine::with_memory_size(cli.mem_size));

    for token in &cli.opcodes {
        let Some(opcode) = parse_opcode(token) else {
            println!("{}", format!("Invalid opcode: {token}").red());
            std::process::exit(1);
        };

        if cli.trace {
            if let Some(entry) = table::lookup(opcode) {
                println!(
                    "{}",
                    format!("[TRACE] {opcode:#04x} -> {} ({})", entry.ir, entry.asm).cyan()
                );
            }
        }

        let status = executor.execute(opcode);
        println!("{}", format!("{token}: {status}").green());

        if executor.vm.halted {
            break;
        }
    }

    if cli.dump_state {
        println!(
            "{}",
            serde_json::to_string_pretty(&executor.vm.dump_state())?
        );
    }

    Ok(())
}
