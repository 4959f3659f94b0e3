//! Thin argument-parsing layer: turns argv into a validated, immutable [`Invocation`].
//!
//! No business logic lives here; every validation rule below exists only to reject nonsensical
//! flag combinations before anything touches the keyring or a terminal.

use std::path::PathBuf;

use clap::Parser;

use crate::dispatch::Mode;
use crate::error::{Error, Result};

const DEFAULT_PLACEHOLDER: &str = "@@";
const DEFAULT_TIMEOUT_MINUTES: i64 = 60;

/// Raw CLI surface, parsed by `clap` and then folded into an [`Invocation`].
#[derive(Parser, Debug)]
#[clap(name = "memento", about = "Securely remember and recall private memento.")]
struct Args {
    #[clap(short = 'R', long)]
    revoke: bool,

    #[clap(short, long, conflicts_with_all = &["tty", "pipe"])]
    file: Option<String>,

    #[clap(short, long, conflicts_with_all = &["file", "pipe"])]
    tty: bool,

    #[clap(short, long, conflicts_with_all = &["file", "tty"])]
    pipe: bool,

    #[clap(short = '1', long, requires = "pipe")]
    oneline: bool,

    #[clap(short, long)]
    salt: Option<PathBuf>,

    #[clap(short, long, conflicts_with = "salt")]
    unsalted: bool,

    #[clap(short = 'T', long)]
    timeout: Option<i64>,

    key: String,

    #[clap(last = false)]
    command: Vec<String>,
}

/// A fully validated configuration for one run, built once from argv and never mutated.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub name: String,
    pub command: Vec<String>,
    pub revoke: bool,
    pub mode: Option<Mode>,
    pub salt_path: Option<PathBuf>,
    pub unsalted: bool,
    pub timeout_minutes: i64,
    /// The raw `--timeout` value exactly as the operator passed it, or `None` if they didn't.
    /// Kept separate from `timeout_minutes` (which is always populated with the effective,
    /// normalized value) so the challenge protocol can tell "defaulted" from "explicitly given"
    /// when deciding whether to echo `-T` back into the rebuilt command line.
    pub timeout_explicit: Option<i64>,
    pub placeholder: String,
}

impl Invocation {
    /// Parse and validate `std::env::args()`.
    pub fn parse() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    fn from_args(args: Args) -> Result<Self> {
        if args.revoke {
            if !args.command.is_empty() || args.tty || args.pipe || args.oneline {
                return Err(Error::caller("revocation conflicts with other options"));
            }
            return Ok(Invocation {
                name: args.key,
                command: Vec::new(),
                revoke: true,
                mode: None,
                salt_path: None,
                unsalted: args.unsalted,
                timeout_minutes: normalize_timeout(args.timeout),
                timeout_explicit: args.timeout,
                placeholder: DEFAULT_PLACEHOLDER.to_string(),
            });
        }

        if args.unsalted && args.salt.is_some() {
            return Err(Error::caller("salt provided for unsalted key"));
        }

        let placeholder = args.file.clone().unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string());

        let mode = if args.tty {
            if !nix::unistd::isatty(libc::STDIN_FILENO).unwrap_or(false) {
                return Err(Error::environment("typed input requires stdin to be a tty"));
            }
            Some(Mode::Tty)
        } else if args.pipe {
            Some(Mode::Pipe { oneline: args.oneline })
        } else {
            if placeholder.is_empty() {
                return Err(Error::caller("file replacement text must not be empty"));
            }
            let occurrences = args.command.iter().filter(|word| **word == placeholder).count();
            if !args.command.is_empty() && occurrences != 1 {
                return Err(Error::caller(format!("exactly one occurrence of {} expected", placeholder)));
            }
            Some(Mode::File(PathBuf::from(&placeholder)))
        };

        Ok(Invocation {
            name: args.key,
            command: args.command,
            revoke: false,
            mode,
            salt_path: args.salt,
            unsalted: args.unsalted,
            timeout_minutes: normalize_timeout(args.timeout),
            timeout_explicit: args.timeout,
            placeholder,
        })
    }
}

fn normalize_timeout(timeout: Option<i64>) -> i64 {
    match timeout {
        None => DEFAULT_TIMEOUT_MINUTES,
        Some(minutes) => minutes.max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            revoke: false,
            file: None,
            tty: false,
            pipe: false,
            oneline: false,
            salt: None,
            unsalted: true,
            timeout: None,
            key: "alpha".to_string(),
            command: vec!["/bin/cat".to_string(), "@@".to_string()],
        }
    }

    #[test]
    fn defaults_timeout_to_sixty_minutes() {
        let invocation = Invocation::from_args(base_args()).unwrap();
        assert_eq!(invocation.timeout_minutes, 60);
    }

    #[test]
    fn negative_timeout_clamps_to_zero() {
        let mut args = base_args();
        args.timeout = Some(-5);
        let invocation = Invocation::from_args(args).unwrap();
        assert_eq!(invocation.timeout_minutes, 0);
    }

    #[test]
    fn rejects_missing_placeholder() {
        let mut args = base_args();
        args.command = vec!["/bin/cat".to_string()];
        assert!(Invocation::from_args(args).is_err());
    }

    #[test]
    fn empty_command_skips_placeholder_check() {
        let mut args = base_args();
        args.command = Vec::new();
        let invocation = Invocation::from_args(args).unwrap();
        assert!(matches!(invocation.mode, Some(Mode::File(_))));
    }

    #[test]
    fn rejects_two_placeholders() {
        let mut args = base_args();
        args.command = vec!["/bin/cat".to_string(), "@@".to_string(), "@@".to_string()];
        assert!(Invocation::from_args(args).is_err());
    }

    #[test]
    fn revoke_rejects_command() {
        let mut args = base_args();
        args.revoke = true;
        assert!(Invocation::from_args(args).is_err());
    }
}
