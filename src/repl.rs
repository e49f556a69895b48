use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::interp::{balanced, Interp};

const HISTORY_FILE: &str = ".lispet-history";

/// Interactive session over one interpreter. Input accumulates across lines
/// until the parens balance, then the whole chunk is evaluated.
pub struct Repl {
    interp: Interp,
}

impl Repl {
    pub fn new(interp: Interp) -> Self {
        Repl { interp }
    }

    pub fn run(&mut self) {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(err) => {
                eprintln!("{}", format!("cannot start line editor: {}", err).red());
                return;
            }
        };
        if rl.load_history(HISTORY_FILE).is_err() {}

        let mut buffer = String::new();
        'repl_loop: loop {
            let prompt = if buffer.is_empty() { "> " } else { "  " };
            match rl.readline(prompt) {
                Ok(line) => {
                    if let Err(err) = rl.add_history_entry(line.as_str()) {
                        eprintln!("Error adding to history: {:?}", err);
                    }

                    if let Err(err) = rl.save_history(HISTORY_FILE) {
                        eprintln!("Error saving history: {:?}", err);
                    }

                    // Session commands match with any interior whitespace.
                    let stripped: String =
                        line.chars().filter(|c| !c.is_whitespace()).collect();
                    if stripped == "(quit)" {
                        break 'repl_loop;
                    }
                    if stripped == "(clear)" {
                        self.interp = Interp::with_prelude();
                        buffer.clear();
                        continue 'repl_loop;
                    }
                    if line.trim_start().starts_with(';') {
                        continue 'repl_loop;
                    }

                    buffer.push_str(&line);
                    buffer.push('\n');
                    if !balanced(&buffer) {
                        continue 'repl_loop;
                    }
                    if buffer.trim().is_empty() {
                        buffer.clear();
                        continue 'repl_loop;
                    }

                    let answer = self.interp.eval_str(&buffer);
                    buffer.clear();
                    println!("{}", answer.pretty(&self.interp.heap, "   "));
                }
                Err(ReadlineError::Interrupted) => {
                    buffer.clear();
                    continue 'repl_loop;
                }
                Err(ReadlineError::Eof) => break 'repl_loop,
                Err(err) => {
                    println!("Error: {:?}", err);
                    break 'repl_loop;
                }
            }
        }
    }
}
