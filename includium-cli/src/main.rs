#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! Command-line frontend for the `includium` preprocessor and calculator.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use includium::{Compiler, PreprocessorConfig, PreprocessorDriver, Target};

#[derive(Parser)]
#[command(name = "includium", version, about = "A standalone C-style preprocessor and expression calculator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Flatten a source file to preprocessed text.
    Preprocess {
        /// Source file to read; omit to read from stdin.
        input: Option<PathBuf>,
        #[command(flatten)]
        opts: TargetOpts,
        /// Write the result to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Preprocess a source file and dump its expanded token stream.
    Tokens {
        /// Source file to read; omit to read from stdin.
        input: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Evaluate a single calculator expression.
    Calc {
        /// The expression text, e.g. "1 + 2 * 3".
        expression: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(clap::Args)]
struct TargetOpts {
    /// Target operating system macros to predefine.
    #[arg(long, value_enum, default_value_t = TargetArg::Linux)]
    target: TargetArg,
    /// Compiler dialect macros to predefine.
    #[arg(long, value_enum, default_value_t = CompilerArg::Gcc)]
    compiler: CompilerArg,
    /// Additional `NAME=VALUE` or bare `NAME` object-like macro definitions.
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    defines: Vec<String>,
    /// Maximum macro-expansion recursion depth.
    #[arg(long, default_value_t = 256)]
    recursion_limit: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    Linux,
    Windows,
    Macos,
}

#[derive(Clone, Copy, ValueEnum)]
enum CompilerArg {
    Gcc,
    Clang,
    Msvc,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Text,
    #[cfg(feature = "json")]
    Json,
}

fn config_from_opts(opts: &TargetOpts) -> PreprocessorConfig {
    let target = match opts.target {
        TargetArg::Linux => Target::Linux,
        TargetArg::Windows => Target::Windows,
        TargetArg::Macos => Target::MacOS,
    };
    let compiler = match opts.compiler {
        CompilerArg::Gcc => Compiler::GCC,
        CompilerArg::Clang => Compiler::Clang,
        CompilerArg::Msvc => Compiler::MSVC,
    };
    PreprocessorConfig { target, compiler, recursion_limit: opts.recursion_limit, include_resolver: None, warning_handler: None }
}

fn read_input(path: &Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let use_color = std::io::stdout().is_terminal();

    match cli.command {
        Command::Preprocess { input, opts, output } => run_preprocess(input, &opts, output, use_color),
        Command::Tokens { input, format } => run_tokens(input, format),
        Command::Calc { expression, format } => run_calc(&expression, format),
    }
}

fn run_preprocess(input: Option<PathBuf>, opts: &TargetOpts, output: Option<PathBuf>, use_color: bool) -> Result<()> {
    let source = read_input(&input)?;
    let config = config_from_opts(opts);
    let mut driver = PreprocessorDriver::with_config(&config);
    for define in &opts.defines {
        apply_define(&mut driver, define)?;
    }

    match driver.process(&source) {
        Ok(result) => {
            match output {
                Some(path) => std::fs::write(&path, result).with_context(|| format!("writing {}", path.display()))?,
                None => print!("{result}"),
            }
            Ok(())
        }
        Err(err) => {
            let rendered = err.to_string();
            if use_color {
                eprintln!("{}", rendered.red());
            } else {
                eprintln!("{rendered}");
            }
            std::process::exit(1);
        }
    }
}

fn apply_define(driver: &mut PreprocessorDriver, raw: &str) -> Result<()> {
    let (name, body) = raw.split_once('=').unwrap_or((raw, "1"));
    driver.define(name, None, body, false).map_err(|e| anyhow::anyhow!(e.to_string()))
}

#[derive(serde::Serialize)]
struct TokenRecord {
    kind: String,
    text: String,
}

fn run_tokens(input: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let source = read_input(&input)?;
    let mut driver = PreprocessorDriver::new();
    let tokens = driver.tokens(&source).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let records: Vec<TokenRecord> = tokens.map(|t| TokenRecord { kind: format!("{:?}", t.kind), text: t.text }).collect();

    match format {
        OutputFormat::Text => {
            for record in &records {
                println!("{:<16} {:?}", record.kind, record.text);
            }
        }
        #[cfg(feature = "json")]
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&records)?;
            println!("{json}");
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct CalcResult {
    expression: String,
    value: f64,
}

fn run_calc(expression: &str, format: OutputFormat) -> Result<()> {
    let parsed = includium::parse_expression(expression).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let value = includium::run_expression(&parsed, &|_| None).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    match format {
        OutputFormat::Text => println!("{value}"),
        #[cfg(feature = "json")]
        OutputFormat::Json => {
            let result = CalcResult { expression: expression.to_string(), value };
            let json = serde_json::to_string_pretty(&result)?;
            println!("{json}");
        }
    }
    Ok(())
}
