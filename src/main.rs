//! spf-extract - Sparse Polyhedral Framework frontend
//!
//! Command-line driver: parses one source file, extracts the computation
//! for the requested entry-point function, and prints either the IR
//! (`--frontend-only`) or generated C code.

use clap::Parser;
use spf_extract::extract::Extractor;
use spf_extract::utils::errors::SpfError;
use spf_extract::utils::location::SourceMap;
use spf_extract::{codegen, frontend};

use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spf-extract")]
#[command(version)]
#[command(about = "Extract sparse polyhedral IR from a restricted C subset")]
struct Cli {
    /// Input source file
    input: PathBuf,

    /// Entry point; only the specified function is translated
    #[arg(long)]
    entry_point: String,

    /// Just run the frontend and print the computation IR
    #[arg(long)]
    frontend_only: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    std::process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let source = match fs::read_to_string(&cli.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("ERROR: Failed to read {}: {}", cli.input.display(), e);
            return 1;
        }
    };
    let map = SourceMap::new(source.clone());

    eprintln!("Processing: {}", cli.input.display());
    eprintln!("=================================================");

    let program = match frontend::parse(&source) {
        Ok(program) => program,
        Err(error) => return report_fatal(&error, &map),
    };

    let mut extractor = Extractor::new(&program, &map);
    let computation = match extractor.extract(&cli.entry_point) {
        Ok(computation) => computation,
        Err(error) => return report_fatal(&error.into(), &map),
    };

    if cli.frontend_only {
        eprintln!("Computation IR for function '{}'", cli.entry_point);
        eprintln!("---------------");
        print!("{}", computation.print_info());
    } else {
        eprintln!("Codegen for function '{}':", cli.entry_point);
        match codegen::generate(&computation) {
            Ok(code) => print!("{}", code),
            Err(error) => {
                eprintln!("ERROR: {}", error);
                return 1;
            }
        }
    }
    0
}

/// Print the single-line error followed by the offending source location
/// and statement text.
fn report_fatal(error: &SpfError, map: &SourceMap) -> i32 {
    eprintln!("ERROR: {}", error);
    match error {
        SpfError::Lexer(e) => {
            eprintln!("At {}:", e.span.start());
            if let Some(line) = map.line(e.span.start_line) {
                eprintln!("{}", line.trim());
            }
        }
        SpfError::Parse(e) => {
            eprintln!("At {}:", e.span.start());
            if let Some(line) = map.line(e.span.start_line) {
                eprintln!("{}", line.trim());
            }
        }
        SpfError::Extract(e) => {
            if let Some(span) = e.span {
                eprintln!("At {}:", span.start());
                match &e.snippet {
                    Some(snippet) => eprintln!("{}", snippet),
                    None => {
                        if let Some(line) = map.line(span.start_line) {
                            eprintln!("{}", line.trim());
                        }
                    }
                }
            }
        }
        _ => {}
    }
    1
}
