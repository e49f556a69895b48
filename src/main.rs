use std::env;
use std::path::Path;

use colored::Colorize;

use lispet::interp::Interp;
use lispet::repl::Repl;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const INIT_FILE: &str = "init.lisp";

#[derive(Debug, Clone)]
enum ArgCmd {
    Repl { trace: bool },
    Files { paths: Vec<String>, trace: bool },
    Help,
}

fn print_usage() {
    println!("lispet v{}\n\n", VERSION);
    println!("Usage:");
    println!("  lispet                    Start the REPL");
    println!("  lispet --file <path>      Execute a file (repeatable)");
    println!("  lispet --trace            Trace every evaluation to stderr");
    println!("  lispet -h                 Show this help message");
}

fn parse_args(args: Vec<String>) -> Result<ArgCmd, String> {
    let mut trace = false;
    let mut paths: Vec<String> = Vec::new();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                return Ok(ArgCmd::Help);
            }
            "--trace" => {
                trace = true;
            }
            "--file" => {
                if i + 1 >= args.len() {
                    return Err("Error: --file requires a file path".to_string());
                }
                paths.push(args[i + 1].clone());
                i += 1; // Skip the file path
            }
            arg => {
                return Err(format!("Error: Unknown argument '{}'", arg));
            }
        }
        i += 1;
    }

    if paths.is_empty() {
        Ok(ArgCmd::Repl { trace })
    } else {
        Ok(ArgCmd::Files { paths, trace })
    }
}

/// One interpreter with the prelude loaded and the working directory's
/// `init.lisp` applied when present.
fn boot(trace: bool) -> Interp {
    let mut interp = Interp::with_prelude();
    interp.set_trace(trace);
    if Path::new(INIT_FILE).exists() {
        if let Err(e) = interp.load_file(INIT_FILE) {
            eprintln!("{}", e.to_string().red());
        }
    }
    interp
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let command = match parse_args(args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("{}\n\n", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match command {
        ArgCmd::Help => {
            print_usage();
        }
        ArgCmd::Repl { trace } => {
            let interp = boot(trace);
            let mut repl = Repl::new(interp);
            repl.run();
        }
        ArgCmd::Files { paths, trace } => {
            let mut interp = boot(trace);
            for path in paths {
                match interp.load_file(&path) {
                    Ok(answer) => {
                        println!("{}", answer.pretty(&interp.heap, "   "));
                    }
                    Err(e) => {
                        eprintln!("{}", e.to_string().red());
                        std::process::exit(1);
                    }
                }
            }
        }
    }
}
