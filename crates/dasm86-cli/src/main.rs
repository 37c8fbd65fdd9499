use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use dasm86::disasm::{fmt_instruction, hex_bytes};
use dasm86::{instructions, translate_with, DecodeError, Instruction, ReaderSource, TranslateConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "8086 disassembler: machine code in, NASM source out", long_about = None)]
struct Cli {
    /// Input binary path (reads standard input when omitted)
    #[arg(value_name = "BINFILE")]
    input: Option<PathBuf>,
    /// Annotate each line with the offset of its first byte
    #[arg(long)]
    show_offsets: bool,
    /// Annotate each line with its raw bytes
    #[arg(long)]
    show_bytes: bool,
    /// Output format: text or json
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write output to file instead of stdout
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, serde::Serialize)]
struct Entry {
    offset: u64,
    bytes: String,
    text: String,
    instruction: Instruction,
}

impl From<&Instruction> for Entry {
    fn from(ins: &Instruction) -> Self {
        Self {
            offset: ins.offset(),
            bytes: hex_bytes(ins.bytes()),
            text: fmt_instruction(ins),
            instruction: *ins,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct Report {
    source: String,
    instructions: Vec<Entry>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<DecodeError>().map_or(1, DecodeError::exit_code)
}

fn source_name(input: Option<&PathBuf>) -> String {
    input.map_or_else(|| "STDIN".to_string(), |p| p.display().to_string())
}

fn run(cli: &Cli) -> Result<()> {
    let name = source_name(cli.input.as_ref());
    let input: Box<dyn Read> = match &cli.input {
        Some(path) => Box::new(File::open(path).with_context(|| format!("failed to open {}", path.display()))?),
        None => Box::new(io::stdin().lock()),
    };
    let mut out: Box<dyn Write> = match &cli.out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    match cli.format {
        OutputFormat::Text => {
            let cfg = TranslateConfig { show_offsets: cli.show_offsets, show_bytes: cli.show_bytes, ..Default::default() };
            write_text(&name, input, &mut out, &cfg)?;
        }
        OutputFormat::Json => write_json(&name, input, &mut out)?,
    }
    Ok(())
}

fn write_text<R: Read, W: Write>(name: &str, input: R, mut out: W, cfg: &TranslateConfig) -> Result<()> {
    writeln!(out, "; {name}\n")?;
    let count = translate_with(input, &mut out, cfg)?;
    info!(source = name, instructions = count, "disassembled");
    Ok(())
}

/// Entries decoded before a failure are still written.
fn write_json<R: Read, W: Write>(name: &str, input: R, mut out: W) -> Result<()> {
    let mut entries = Vec::new();
    let mut failure = None;
    for item in instructions(ReaderSource::new(input)) {
        match item {
            Ok(ins) => entries.push(Entry::from(&ins)),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    let report = Report { source: name.to_string(), instructions: entries };
    serde_json::to_writer_pretty(&mut out, &report)?;
    writeln!(out)?;
    out.flush()?;
    info!(source = name, instructions = report.instructions.len(), "disassembled");
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
