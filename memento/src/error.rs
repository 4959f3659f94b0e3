//! The error taxonomy used throughout memento.
//!
//! Every fallible operation in this crate returns [`Error`], which is deliberately coarse: the
//! CLI only ever needs to know which of a handful of exit codes to use, and logs the detailed
//! `Display` of the error before exiting.

use thiserror::Error;

/// Everything that can go wrong while caching or delivering a memento.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad flags, wrong placeholder count, or a salt/unsalted contradiction.
    #[error("{0}")]
    Caller(String),
    /// No controlling terminal when one was required, or the keyring is unreachable.
    #[error("{0}")]
    Environment(String),
    /// A cached ciphertext failed to decrypt under the derived key.
    #[error("undecipherable key - {0}")]
    Cryptographic(String),
    /// Any other I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A keyring syscall failed with something other than "not present".
    #[error(transparent)]
    Keyring(#[from] errno::Errno),
    /// `nix` rejected a syscall argument or the kernel returned an unexpected errno.
    #[error(transparent)]
    Sys(#[from] nix::Error),
    /// The spawned command died from an uncaught signal.
    #[error("child exited with signal {0}")]
    ChildSignaled(i32),
    /// The challenge protocol ran to completion; the caller should exit 127, not log this.
    #[error("challenge emitted, expect shell resume")]
    Challenged,
}

impl Error {
    /// Translate this error into the process exit code the CLI reports it under.
    ///
    /// `ChildSignaled` and `Challenged` are handled specially by `main`; any other variant that
    /// reaches `exit_code` is a plain operational failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ChildSignaled(signal) => 128 + signal,
            Error::Challenged => 127,
            Error::Caller(_) | Error::Environment(_) | Error::Cryptographic(_) | Error::Io(_) | Error::Keyring(_)
            | Error::Sys(_) => 1,
        }
    }

    /// Build a [`Error::Caller`] from a formatted message.
    pub fn caller<S: Into<String>>(message: S) -> Self {
        Error::Caller(message.into())
    }

    /// Build a [`Error::Environment`] from a formatted message.
    pub fn environment<S: Into<String>>(message: S) -> Self {
        Error::Environment(message.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
