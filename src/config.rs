// ABOUTME: Version info, CLI flags, welcome banner, and the embedded prelude

use clap::{ArgAction, Parser};
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const WELCOME_MESSAGE: &str = "Pluto";
pub const WELCOME_SUBTITLE: &str = "A dynamically-typed language built around pattern-matched, multi-word function calls";
pub const WELCOME_FOOTER: &str = "Type `exit` or press Ctrl-D to leave.";

pub const PROMPT: &str = ">> ";

/// The prelude shipped with the interpreter: the `Error` class every
/// runtime error is an instance of, plus whatever small standard library is
/// worth writing in Pluto itself rather than as a built-in.
pub const PRELUDE_SOURCE: &str = include_str!("../lib/prelude.pluto");

/// A tree-walking interpreter for Pluto
#[derive(Parser, Debug)]
#[command(name = "pluto")]
#[command(version = VERSION, disable_version_flag = true)]
#[command(about = "A dynamically-typed scripting language with pattern-based function calls")]
struct CliArgsInner {
    /// Print version information and exit
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: (),

    /// Script file to execute (if omitted, starts the REPL)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: Option<PathBuf>,

    /// Parse the file and report errors only; stays silent on success
    #[arg(short = 'p', long = "parse")]
    parse_only: bool,

    /// Print the parsed AST as JSON instead of evaluating
    #[arg(short = 't', long = "tree")]
    tree: bool,

    /// Enter the REPL after running the file
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Skip loading the prelude
    #[arg(short = 'n', long = "no-prelude")]
    no_prelude: bool,
}

/// Parsed CLI configuration for one interpreter invocation.
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub file: Option<PathBuf>,
    pub parse_only: bool,
    pub tree: bool,
    pub interactive: bool,
    pub no_prelude: bool,
}

impl CliArgs {
    pub fn parse() -> Self {
        let inner = CliArgsInner::parse();
        CliArgs {
            file: inner.file,
            parse_only: inner.parse_only,
            tree: inner.tree,
            interactive: inner.interactive,
            no_prelude: inner.no_prelude,
        }
    }

    /// REPL mode is whatever's left once a file isn't given, or when `-i`
    /// asks to drop into one after running a file.
    pub fn should_repl(&self) -> bool {
        self.file.is_none() || self.interactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_repl_with_no_file() {
        let args = CliArgs {
            file: None,
            parse_only: false,
            tree: false,
            interactive: false,
            no_prelude: false,
        };
        assert!(args.should_repl());
    }

    #[test]
    fn should_not_repl_after_a_plain_file_run() {
        let args = CliArgs {
            file: Some(PathBuf::from("script.pluto")),
            parse_only: false,
            tree: false,
            interactive: false,
            no_prelude: false,
        };
        assert!(!args.should_repl());
    }

    #[test]
    fn interactive_flag_forces_repl_after_file_run() {
        let args = CliArgs {
            file: Some(PathBuf::from("script.pluto")),
            parse_only: false,
            tree: false,
            interactive: true,
            no_prelude: false,
        };
        assert!(args.should_repl());
    }
}
