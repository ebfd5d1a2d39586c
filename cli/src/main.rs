mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tokio::io::BufReader;
use tokio::sync::mpsc;

use journal::{CancelToken, DecodeError, Entry, Journal};

const SUBCOMMANDS: &[&str] = &["print", "check", "test", "help"];

#[derive(Parser)]
#[command(name = "journal", version, about = "Configuration journal decoder")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a journal and pretty-print its entries
    Print(PrintArgs),

    /// Decode a journal, reporting only whether it is valid
    Check(CheckArgs),

    /// Run .test.jnl golden-test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct PrintArgs {
    /// Journal file to decode; "-" or absent streams standard input
    file: Option<String>,

    /// Emit one JSON object per entry instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Journal file to decode; "-" or absent reads standard input
    file: Option<String>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.jnl file or a directory containing them
    path: String,
}

fn main() {
    // Backwards compatibility: if the first positional arg is not a known
    // subcommand, inject "print" so `journal steps.jnl` works like
    // `journal print steps.jnl`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(first_pos) = args.iter().skip(1).find(|a| !a.starts_with('-')) {
        let first_pos = first_pos.clone();
        if !SUBCOMMANDS.contains(&first_pos.as_str()) {
            let pos = args.iter().position(|a| *a == first_pos).unwrap();
            args.insert(pos, "print".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    let code = match cli.command {
        Command::Print(print_args) => do_print(print_args, cli.no_color),
        Command::Check(check_args) => do_check(check_args, cli.no_color),
        Command::Test(test_args) => {
            test_runner::run_tests(Path::new(&test_args.path), cli.no_color)
        }
    };
    process::exit(code);
}

/// Resolve the optional FILE argument; `None` means standard input.
fn file_arg(file: &Option<String>) -> Option<&str> {
    match file.as_deref() {
        None | Some("-") => None,
        Some(path) => Some(path),
    }
}

fn do_print(args: PrintArgs, no_color: bool) -> i32 {
    match file_arg(&args.file) {
        Some(path) => {
            let source = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("error: cannot read '{}': {}", path, e);
                    return 1;
                }
            };
            let journal = match Journal::parse(&source) {
                Ok(j) => j,
                Err(err) => {
                    emit_decode_error(path, &source, &err, no_color);
                    return 1;
                }
            };
            for entry in &journal.entries {
                print_entry(entry, args.json);
            }
            0
        }
        None => stream_stdin(args.json),
    }
}

/// Stream entries out of standard input, printing each one as it is
/// decoded. Ctrl-C cancels the stream cleanly.
fn stream_stdin(json: bool) -> i32 {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: cannot start runtime: {}", e);
            return 1;
        }
    };
    runtime.block_on(async {
        let cancel = CancelToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        });

        let (tx, mut rx) = mpsc::channel(16);
        let reader = BufReader::new(tokio::io::stdin());
        let decoder = tokio::spawn(journal::read_from(reader, tx, cancel));

        while let Some(entry) = rx.recv().await {
            print_entry(&entry, json);
        }

        match decoder.await {
            Ok(Ok(())) => 0,
            Ok(Err(DecodeError::Cancelled)) => {
                eprintln!("cancelled");
                130
            }
            Ok(Err(err)) => {
                eprintln!("error: {}", err);
                1
            }
            Err(e) => {
                eprintln!("error: decoder task failed: {}", e);
                1
            }
        }
    })
}

fn do_check(args: CheckArgs, no_color: bool) -> i32 {
    let (name, source) = match file_arg(&args.file) {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(s) => (path.to_string(), s),
            Err(e) => {
                eprintln!("error: cannot read '{}': {}", path, e);
                return 1;
            }
        },
        None => match std::io::read_to_string(std::io::stdin()) {
            Ok(s) => ("<stdin>".to_string(), s),
            Err(e) => {
                eprintln!("error: cannot read standard input: {}", e);
                return 1;
            }
        },
    };

    match Journal::parse(&source) {
        Ok(journal) => {
            eprintln!("ok: {} entries", journal.entries.len());
            0
        }
        Err(err) => {
            emit_decode_error(&name, &source, &err, no_color);
            1
        }
    }
}

/// One output row per entry. The instruction column is right-aligned so
/// commands line up; clauses keep their canonical `&&` joining.
fn print_entry(entry: &Entry, json: bool) {
    if json {
        match serde_json::to_string(entry) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("error: serialize entry: {}", e),
        }
        return;
    }

    let mut row = format!(
        "{:>8} {}",
        entry.command.instruction,
        entry.command.args.join(" ")
    );
    if let Some(action) = &entry.action {
        row = format!("{:<48} && {}", row, action);
    }
    if let Some(revert) = &entry.revert {
        row = format!("{} && {}", row, revert);
    }
    println!("{}", row.trim_end());
}

fn emit_decode_error(name: &str, source: &str, err: &DecodeError, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let mut files = SimpleFiles::new();
    let file_id = files.add(name.to_string(), source.to_string());
    let diagnostic = err.to_diagnostic(file_id, source);
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
}
