//! C-Next Compiler CLI
//!
//! Command-line interface for translating `.cnx`/`.cnext` sources to C or
//! C++.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::PathBuf;
use std::process;

use cnextc::config::{self, CompilerConfig};
use cnextc::fs::RealFileSystem;
use cnextc::pipeline;

#[derive(ClapParser)]
#[command(name = "cnextc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "C-Next compiler - translate .cnx source to C or C++", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Raise logging verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile .cnx/.cnext sources to C or C++ (default command)
    Compile {
        /// Input files or directories to compile
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Emit C++ instead of C
        #[arg(long)]
        cpp: bool,

        /// Output directory for generated sources
        #[arg(long = "out")]
        out: Option<PathBuf>,

        /// Output directory for generated headers (defaults to --out)
        #[arg(long = "header-out")]
        header_out: Option<PathBuf>,

        /// Base path stripped from input paths before mirroring under --out
        #[arg(long = "base-path")]
        base_path: Option<PathBuf>,

        /// Additional include search directory (repeatable)
        #[arg(long = "include")]
        include: Vec<PathBuf>,

        /// Target id, drives atomic RMW lowering capabilities
        #[arg(long)]
        target: Option<String>,

        /// Replace clamp helpers with panic helpers
        #[arg(long)]
        debug: bool,
    },

    /// Delete previously generated output under --out/--header-out
    Clean {
        /// Output directory to clean
        #[arg(long = "out")]
        out: PathBuf,

        /// Header output directory to clean, if distinct from --out
        #[arg(long = "header-out")]
        header_out: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compile { inputs, cpp, out, header_out, base_path, include, target, debug } => {
            run_compile(&inputs, cpp, out, header_out, base_path, include, target, debug);
        }
        Commands::Clean { out, header_out } => {
            run_clean(&out, header_out.as_deref());
        }
        Commands::Completions { shell } => {
            run_completions(shell);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "cnextc", &mut io::stdout());
}

#[allow(clippy::too_many_arguments)]
fn run_compile(
    inputs: &[PathBuf],
    cpp: bool,
    out: Option<PathBuf>,
    header_out: Option<PathBuf>,
    base_path: Option<PathBuf>,
    include: Vec<PathBuf>,
    target: Option<String>,
    debug: bool,
) {
    let mut resolved_config = CompilerConfig::default();
    if let Some(base_path) = &base_path {
        resolved_config.base_path = base_path.clone();
    }

    match config::load_project_config(&RealFileSystem, &resolved_config.base_path) {
        Ok(Some(file)) => resolved_config.apply_file(file),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!("{e}, falling back to defaults");
        }
    }

    // CLI flags always win over `cnext.toml`.
    if cpp {
        resolved_config.cpp = true;
    }
    if let Some(out) = out {
        resolved_config.out_dir = out;
    }
    if let Some(header_out) = header_out {
        resolved_config.header_out_dir = Some(header_out);
    }
    if let Some(target) = target {
        resolved_config.target = target;
    }
    if debug {
        resolved_config.debug = true;
    }
    resolved_config.include_dirs.extend(include);

    match pipeline::compile_files(&RealFileSystem, inputs, &resolved_config) {
        Ok(diagnostics) => {
            for diag in diagnostics.all() {
                eprintln!("{diag}");
            }
            if diagnostics.has_errors() {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run_clean(out: &std::path::Path, header_out: Option<&std::path::Path>) {
    match pipeline::clean(&RealFileSystem, out, header_out) {
        Ok(removed) => {
            for path in &removed {
                println!("Removed {}", path.display());
            }
            println!("{} file(s) removed", removed.len());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
