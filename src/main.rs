mod ast;
mod builtins;
mod config;
mod env;
mod error;
mod eval;
mod lexer;
mod parser;
mod pattern;
mod token;
mod value;

use config::CliArgs;
use env::Environment;
use error::CliError;
use eval::eval_program;
use parser::Parser;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::path::Path;
use std::process::ExitCode;
use std::rc::Rc;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let root = Rc::new(Environment::root());
    if !args.no_prelude {
        load_prelude(&root);
    }

    if let Some(path) = &args.file {
        match run_file(path, &args, &root) {
            Ok(()) => {}
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
        if !args.should_repl() {
            return ExitCode::SUCCESS;
        }
    }

    run_repl(&root);
    ExitCode::SUCCESS
}

fn load_prelude(env: &Rc<Environment>) {
    let program = Parser::new(config::PRELUDE_SOURCE).parse_program();
    let result = eval_program(&program, env);
    if result.is_error() {
        eprintln!("Warning: failed to load prelude: {}", result);
    }
}

/// Runs a script file in one of three modes: `--parse` (report parse errors
/// only), `--tree` (dump the parsed AST as JSON), or plain evaluation.
fn run_file(path: &Path, args: &CliArgs, env: &Rc<Environment>) -> Result<(), CliError> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CliError::FileNotFound(path.display().to_string())
        } else {
            CliError::Io {
                path: path.display().to_string(),
                source: e,
            }
        }
    })?;

    let mut parser = Parser::new(&source);
    let program = parser.parse_program();

    if !parser.errors.is_empty() {
        for err in &parser.errors {
            println!("{}", err);
        }
        return Ok(());
    }

    if args.parse_only {
        return Ok(());
    }

    if args.tree {
        match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: failed to render parse tree: {}", e),
        }
        return Ok(());
    }

    let result = eval_program(&program, env);
    if result.is_error() {
        println!("{}", format_runtime_error(&result));
    }
    Ok(())
}

/// `Tag: message` for an unhandled `Error`-class instance, matching the
/// external interface contract; anything that somehow isn't an `Instance`
/// (shouldn't happen, since `is_error` only recognizes those) falls back to
/// its `Display`.
fn format_runtime_error(value: &value::Value) -> String {
    if let value::Value::Instance(inst) = value {
        let fields = inst.fields.borrow();
        let tag = fields.get("tag").map(|v| v.to_string()).unwrap_or_default();
        let msg = fields.get("msg").map(|v| v.to_string()).unwrap_or_default();
        return format!("{}: {}", tag, msg);
    }
    value.to_string()
}

fn run_repl(env: &Rc<Environment>) {
    println!("{} v{}", config::WELCOME_MESSAGE, config::VERSION);
    println!("{}", config::WELCOME_SUBTITLE);
    println!("{}", config::WELCOME_FOOTER);

    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), rustyline::history::DefaultHistory> = match Editor::with_config(rl_config) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("{}", CliError::Repl(e.to_string()));
            return;
        }
    };

    let history_file = ".pluto_history";
    let _ = rl.load_history(history_file);

    loop {
        match rl.readline(config::PROMPT) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "exit" {
                    break;
                }

                // Each REPL line is a standalone statement; the grammar
                // requires a trailing `;` that a one-liner typed at a
                // prompt would otherwise have to repeat every time.
                let source = format!("{};", trimmed);
                let mut parser = Parser::new(&source);
                let program = parser.parse_program();
                if !parser.errors.is_empty() {
                    for err in &parser.errors {
                        eprintln!("{}", err);
                    }
                    continue;
                }

                let result = eval_program(&program, env);
                if result.is_error() {
                    println!("{}", format_runtime_error(&result));
                } else if !matches!(result, value::Value::Null) {
                    println!("{}", result);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_runtime_error_renders_tag_and_message() {
        let prelude = Parser::new(config::PRELUDE_SOURCE).parse_program();
        let env = Rc::new(Environment::root());
        eval_program(&prelude, &env);
        let program = Parser::new("\\Error (\"TypeError\") (\"bad value\");").parse_program();
        let result = eval_program(&program, &env);
        assert_eq!(format_runtime_error(&result), "TypeError: bad value");
    }
}
