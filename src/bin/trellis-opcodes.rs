//! Opcode reference table explorer.

use std::io::BufRead;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use trellis::tvm::table;

#[derive(Parser)]
#[command(
    name = "trellis-opcodes",
    version,
    about = "Opcode reference table explorer"
)]
struct Cli {
    /// Opcode to look up (e.g. 0x17)
    opcode: Option<String>,

    /// Search the table by keyword across hex, binary, IR and assembly fields
    #[arg(long, value_name = "KEY")]
    search: Option<String>,

    /// Dump the full opcode table as JSON
    #[arg(long)]
    dump_table: bool,

    /// Dump the opcode table grouped by instruction class
    #[arg(long)]
    grouped_dump: bool,

    /// Show opcode counts per group
    #[arg(long)]
    stats: bool,

    /// Read one hex opcode per line from standard input
    #[arg(long)]
    event_reader: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn parse_opcode(token: &str) -> Option<u8> {
    let hex = token.trim().strip_prefix("0x").unwrap_or(token.trim());
    u8::from_str_radix(hex, 16).ok()
}

fn print_entry(opcode: u8, entry: &table::OpcodeEntry) -> Result<()> {
    let mut single = serde_json::Map::new();
    single.insert(format!("{opcode:#04x}"), serde_json::json!(entry));
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::Value::Object(single))?
    );
    Ok(())
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

    if let Some(keyword) = &cli.search {
        let results: serde_json::Map<String, serde_json::Value> = table::search(keyword)
            .into_iter()
            .map(|(op, entry)| (format!("{op:#04x}"), serde_json::json!(entry)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if cli.dump_table {
        println!("{}", serde_json::to_string_pretty(&table::dump())?);
        return Ok(());
    }

    if cli.grouped_dump {
        println!("{}", serde_json::to_string_pretty(&table::grouped_dump())?);
        return Ok(());
    }

    if cli.stats {
        for (group, count) in table::stats() {
            println!("{}", format!("{}: {count}", group.label()).cyan());
        }
        return Ok(());
    }

    if cli.event_reader {
        for line in std::io::stdin().lock().lines() {
            let line = line?;
            let key = line.trim();
            if key.is_empty() {
                continue;
            }
            match parse_opcode(key) {
                Some(opcode) => match table::lookup(opcode) {
                    Some(entry) => print_entry(opcode, entry)?,
                    None => println!("{}", format!("Unknown opcode: {key}").red()),
                },
                None => println!("{}", format!("Invalid input: {key}").red()),
            }
        }
        return Ok(());
    }

    if let Some(token) = &cli.opcode {
        match parse_opcode(token) {
            Some(opcode) => match table::lookup(opcode) {
                Some(entry) => print_entry(opcode, entry)?,
                None => {
                    println!("{}", format!("Unknown opcode: {token}").red());
                    std::process::exit(1);
                }
            },
            None => {
                println!("{}", format!("Invalid opcode: {token}").red());
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    <Cli as clap::CommandFactory>::command().print_help()?;
    Ok(())
}
