//! The top-level state machine: `PARSE → [CHALLENGE | OPEN_STORE] → [PROMPT] → DELIVER`.
//!
//! Grounded in `keysafe/__main__.py`'s `_main`. One detail carries over verbatim from there and
//! is easy to miss: when the tool becomes the target command, it does so by `execvp`-replacing
//! *this very process* (see `orchestrator::spawn`), so the exit code the invoking shell
//! ultimately observes is the target command's own, with no separate wait/propagate step needed.
//! The orphaned delivery process that writes the memento is a different process entirely, whose
//! own exit status nobody observes.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use nix::unistd::{getppid, isatty};

use crate::challenge::{self, ChallengeInvocation};
use crate::cli::Invocation;
use crate::error::{Error, Result};
use crate::orchestrator::{self, DeliveryChannel, DeliveryTarget};
use crate::splice::Pipeline;
use crate::store::{KeyName, RecallResult, Salt, Store};
use crate::terminal;

const OWNER: &str = "memento";

/// The transport a delivered memento travels over.
#[derive(Debug, Clone)]
pub enum Mode {
    /// `/dev/fd/N` substituted into argv at the placeholder.
    File(PathBuf),
    /// Typed into the controlling terminal, gated on echo-off.
    Tty,
    /// Dup'd over the child's stdin; `oneline` skips forwarding the tool's own stdin onward.
    Pipe { oneline: bool },
}

fn read_salt(invocation: &Invocation) -> Result<Salt> {
    if invocation.unsalted {
        return Ok(Salt::none());
    }
    match &invocation.salt_path {
        Some(path) => {
            let contents = std::fs::read(path)?;
            let first_line_end = contents.iter().position(|&b| b == b'\n').map(|i| i + 1).unwrap_or(contents.len());
            Ok(Salt::from_bytes(contents[..first_line_end].to_vec()))
        }
        None => Ok(Salt::none()),
    }
}

fn prompt_memento() -> Result<Vec<u8>> {
    let password = rpassword::prompt_password("Memento: ")?;
    Ok(password.into_bytes())
}

fn keepalive_from_minutes(minutes: i64) -> Option<Duration> {
    Some(Duration::from_secs((minutes.max(0) as u64) * 60))
}

/// Run one invocation to completion. On the `CHALLENGE` path this returns `Ok` having never
/// delivered anything; the caller is expected to treat that the same as `Error::Challenged`
/// (exit 127), since by the time this returns the operator's shell has already been handed a
/// follow-up command line to run.
pub fn run(invocation: &Invocation) -> Result<i32> {
    if invocation.revoke {
        let name = KeyName::new(OWNER, &invocation.name, None);
        let store = Store::new(name, invocation.name.as_bytes(), &Salt::none(), keepalive_from_minutes(invocation.timeout_minutes))?;
        store.forget()?;
        return Ok(0);
    }

    if invocation.salt_path.is_none() && !invocation.unsalted {
        return run_challenge(invocation);
    }

    let salt = read_salt(invocation)?;
    let name = KeyName::new(OWNER, &invocation.name, None);
    let store = Store::new(name, invocation.name.as_bytes(), &salt, keepalive_from_minutes(invocation.timeout_minutes))?;

    // The original always prompts and (re-)memorises when nothing was recalled, even with an
    // empty command; only delivery itself is skipped in that case.
    let recalled = if !invocation.command.is_empty() {
        match store.recall()? {
            RecallResult::Present(bytes) => Some(bytes),
            RecallResult::Undecipherable => return Err(Error::Cryptographic(invocation.name.clone())),
            RecallResult::Absent => None,
        }
    } else {
        None
    };

    let memento = match recalled {
        Some(bytes) => bytes,
        None => {
            let memento = prompt_memento()?;
            store.memorise(&memento)?;
            memento
        }
    };

    if invocation.command.is_empty() {
        return Ok(0);
    }

    deliver(invocation, &memento)
}

fn run_challenge(invocation: &Invocation) -> Result<i32> {
    let tty_fd = std::fs::OpenOptions::new().read(true).write(true).open("/dev/tty")?;
    let fd = std::os::unix::io::AsRawFd::as_raw_fd(&tty_fd);
    if !isatty(fd).unwrap_or(false) {
        return Err(Error::Environment(format!("unable to find salt in key - {}", invocation.name)));
    }

    let key_with_session = format!("{}-{}", invocation.name, getppid().as_raw());
    // Only an explicit `--file <path>` is echoed back as `-f`; the default placeholder needs no
    // flag on the rebuilt invocation, matching `buildCommand`'s `args.file is not None` check.
    let explicit_file = match &invocation.mode {
        Some(Mode::File(_)) if invocation.placeholder != "@@" => Some(invocation.placeholder.as_str()),
        _ => None,
    };
    let challenge_invocation = ChallengeInvocation {
        program: "memento",
        file: explicit_file,
        tty: matches!(invocation.mode, Some(Mode::Tty)),
        pipe: matches!(invocation.mode, Some(Mode::Pipe { .. })),
        oneline: matches!(invocation.mode, Some(Mode::Pipe { oneline: true })),
        // Only echoed back as `-T` when the operator actually passed `--timeout`; otherwise the
        // resumed invocation should fall back to the same default the original one did.
        timeout_minutes: invocation.timeout_explicit,
        key: &key_with_session,
        command: &invocation.command,
        placeholder: &invocation.placeholder,
    };

    challenge::run(fd, &challenge_invocation)?;
    Err(Error::Challenged)
}

fn deliver(invocation: &Invocation, memento: &[u8]) -> Result<i32> {
    let mode = invocation.mode.clone().ok_or_else(|| Error::caller("no delivery mode selected"))?;
    let target = match mode {
        Mode::File(_) => DeliveryTarget::File,
        Mode::Tty => DeliveryTarget::Tty,
        Mode::Pipe { .. } => DeliveryTarget::Pipe,
    };

    let channel = orchestrator::spawn(&invocation.command, &invocation.placeholder, target)?;

    deliver_payload(&mode, &channel, memento)?;

    // This process is the orphaned delivery grandchild: nothing waits on its exit status, so it
    // terminates directly rather than unwinding back through `main`.
    std::process::exit(0);
}

fn deliver_payload(mode: &Mode, channel: &DeliveryChannel, memento: &[u8]) -> Result<()> {
    match mode {
        Mode::Tty => {
            let mut framed = memento.to_vec();
            framed.push(b'\n');
            terminal::type_delivery(libc::STDIN_FILENO, &framed)?;
            release_stdio(channel.sink);
        }
        Mode::Pipe { oneline: true } | Mode::File(_) => {
            write_framed(channel.sink, memento)?;
            release_stdio(channel.sink);
        }
        Mode::Pipe { oneline: false } => {
            // Forwarding owns closing its own descriptors (onto /dev/null) once it's done;
            // it must not be released up front the way the non-forwarding modes are.
            write_framed(channel.sink, memento)?;
            forward_stdin(channel.sink)?;
        }
    }

    Ok(())
}

fn write_framed(sink: std::os::unix::io::RawFd, memento: &[u8]) -> Result<()> {
    let mut pipeline = Pipeline::new(libc::STDIN_FILENO, sink);
    let mut framed = memento.to_vec();
    framed.push(b'\n');
    match pipeline.write_all(&framed) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(Error::Io(err)),
    }
}

fn forward_stdin(sink: std::os::unix::io::RawFd) -> Result<()> {
    let mut pipeline = Pipeline::new(libc::STDIN_FILENO, sink);
    let result = loop {
        match pipeline.splice(8192) {
            Ok(0) => break Ok(()),
            Ok(_) => continue,
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => break Ok(()),
            Err(err) => break Err(Error::Io(err)),
        }
    };
    if let Ok(devnull) = std::fs::OpenOptions::new().read(true).write(true).open("/dev/null") {
        let fd = std::os::unix::io::AsRawFd::as_raw_fd(&devnull);
        let _ = pipeline.close(fd);
    }
    result
}

fn release_stdio(sink: std::os::unix::io::RawFd) {
    if let Ok(devnull) = std::fs::OpenOptions::new().read(true).write(true).open("/dev/null") {
        let fd = std::os::unix::io::AsRawFd::as_raw_fd(&devnull);
        let _ = nix::unistd::dup2(fd, sink);
        let _ = nix::unistd::dup2(fd, libc::STDIN_FILENO);
    }
}
