use std::path::PathBuf;
use std::{env, io, process};

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use klox_lang::klox;

#[derive(Parser)]
#[command(name = "klox", version, about = "Lox interpreter and source-to-C++ compiler")]
struct Cli {
    /// Pretty-print the resolved AST before running
    #[arg(long, global = true)]
    print_ast: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script
    Run { file: String },

    /// Start an interactive prompt
    Repl,

    /// Compile a script to C++ next to the input
    Compile {
        file: String,

        /// Target backend
        #[arg(long, default_value = "cpp")]
        target: String,

        /// Path for the generated translation unit
        #[arg(long)]
        cpp_file: Option<PathBuf>,
    },
}

fn main() {
    let mut args: Vec<String> = env::args().collect();

    // A lone script argument is shorthand for `run`.
    if args.len() == 2 && args[1].ends_with(".lx") {
        args.insert(1, "run".to_string());
    }

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => error.exit(),
            _ => {
                let _ = error.print();
                process::exit(64);
            }
        },
    };

    let mut stdout = io::stdout();
    let mut klox = klox::new(&mut stdout);
    klox.print_ast = cli.print_ast;

    match cli.command {
        Some(Command::Run { file }) => klox.run_file(&file),
        Some(Command::Compile { file, target, cpp_file }) => {
            if target != "cpp" {
                eprintln!("Unsupported target '{target}'");
                process::exit(64);
            }

            klox.compile_file(&file, cpp_file);
        },
        Some(Command::Repl) | None => klox.run_prompt(),
    }
}
