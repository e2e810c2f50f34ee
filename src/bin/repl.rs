use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use diylang::{
    Environment, TokenKind, evaluator::special_form_identifiers, interpret_each, lexer::tokenize,
};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};
use tracing::debug;

/// Interactive DIY Lang prompt.
#[derive(Parser, Debug)]
#[command(name = "repl", version)]
struct Args {
    /// Where to keep the line history
    #[arg(long, env = "DIYLANG_HISTORY", default_value = "diylang_history.txt")]
    history: PathBuf,

    /// Use vi key bindings instead of emacs
    #[arg(long)]
    vi: bool,

    /// Start from an empty environment instead of loading the prelude
    #[arg(long)]
    no_prelude: bool,
}

struct DiyCompleter {
    env: Rc<RefCell<Environment>>,
}

impl DiyCompleter {
    fn new(env: Rc<RefCell<Environment>>) -> Self {
        DiyCompleter { env }
    }
}

impl rustyline::completion::Completer for DiyCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let candidates = match tokenize(&line[..pos]) {
            Ok(tokens) => {
                if let Some(TokenKind::Symbol(prefix)) = tokens.last().map(|t| t.kind.clone()) {
                    let mut candidates: Vec<String> = self
                        .env
                        .borrow()
                        .get_identifiers()
                        .union(&special_form_identifiers())
                        .filter_map(|id| id.strip_prefix(prefix.as_str()).map(str::to_string))
                        .filter(|rest| !rest.is_empty())
                        .collect();
                    candidates.sort();
                    candidates
                } else {
                    vec![]
                }
            }
            Err(_) => vec![],
        };
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    validator: DiyValidator,
    #[rustyline(Highlighter)]
    highlighter: DiyHighlighter,
    #[rustyline(Completer)]
    completer: DiyCompleter,
}

struct DiyValidator;

impl Validator for DiyValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        let mut depth: usize = 0;
        let mut in_string = false;
        let mut in_comment = false;
        let mut escape = false;

        for (i, c) in input.chars().enumerate() {
            if in_comment {
                in_comment = c != '\n';
                continue;
            }
            if in_string {
                if escape {
                    escape = false;
                } else if c == '\\' {
                    escape = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }

            match c {
                '"' => in_string = true,
                ';' => in_comment = true,
                '(' => depth += 1,
                ')' => {
                    if depth == 0 {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched ')' at position {}",
                            i
                        ))));
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }

        if in_string || depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct DiyHighlighter;

impl Highlighter for DiyHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> std::borrow::Cow<'l, str> {
        let mut stack: Vec<usize> = Vec::new();
        let mut highlighted = String::new();
        let mut in_string = false;
        let mut escape = false;

        for (i, c) in line.chars().enumerate() {
            if in_string {
                if escape {
                    escape = false;
                } else if c == '\\' {
                    escape = true;
                } else if c == '"' {
                    in_string = false;
                }
                highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c)); // Green for strings
                continue;
            }

            match c {
                '"' => {
                    in_string = true;
                    highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c));
                }
                '(' => {
                    stack.push(highlighted.len());
                    highlighted.push(c);
                }
                ')' => {
                    if let Some(matching_pos) = stack.pop() {
                        if matching_pos + 1 == pos || i + 1 == pos {
                            highlighted.push_str(&format!("\x1b[34m{}\x1b[0m", c)); // Blue for matching parens
                            highlighted.replace_range(
                                matching_pos..=matching_pos,
                                "\x1b[1;34m(\x1b[0m",
                            );
                        } else {
                            highlighted.push(c);
                        }
                    } else {
                        highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)); // Red for unmatched
                    }
                }
                _ => highlighted.push(c),
            }
        }

        std::borrow::Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn main() -> rustyline::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    println!("DIY Lang REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let global_env = if args.no_prelude {
        Environment::new()
    } else {
        match Environment::new_global_populated() {
            Ok(env) => env,
            Err(e) => {
                eprintln!("Failed to load prelude: {}", e);
                Environment::new()
            }
        }
    };

    let h = InputValidator {
        highlighter: DiyHighlighter,
        validator: DiyValidator,
        completer: DiyCompleter::new(global_env.clone()),
    };
    let edit_mode = if args.vi {
        rustyline::EditMode::Vi
    } else {
        rustyline::EditMode::Emacs
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(edit_mode)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(&args.history).is_err() {
        debug!(path = %args.history.display(), "no previous history");
    }

    loop {
        match rl.readline("diy> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }
                run_input(trimmed_input, &global_env);
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(&args.history)
}

// Evaluates each expression on the line, printing values as they come.
fn run_input(input: &str, env: &Rc<RefCell<Environment>>) {
    if let Err(e) = interpret_each(input, env, |value| println!("{}", value)) {
        if e.pretty_print("REPL", input).is_err() {
            eprintln!("Error: {}", e);
        }
    }
}
