//! The two-pass salt challenge: binds a cached memento to one shell session by having the
//! operator's own shell hand the salt back through a side channel the tool never puts on a
//! command line.
//!
//! Grounded in `keysafe/__main__.py`'s `createKeySuffix`/`buildCommand`/`typeCommand`.

use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::sys::stat::{fstat, SFlag};
use nix::sys::termios::FlushArg;
use nix::unistd::{close, fork, getpid, isatty, pipe, ForkResult, Pid};

use crate::error::{Error, Result};
use crate::terminal::{self, ScopedEcho, ScopedInputSuspend};

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const CHANNEL_PREFIX: &str = "_MEMENTO_";

/// The rebuilt, re-runnable invocation this protocol needs in order to reconstruct a shell
/// command line. Deliberately independent of `cli::Invocation` so this module has no upward
/// dependency on argument parsing.
pub struct ChallengeInvocation<'a> {
    pub program: &'a str,
    pub file: Option<&'a str>,
    pub tty: bool,
    pub pipe: bool,
    pub oneline: bool,
    pub timeout_minutes: Option<i64>,
    pub key: &'a str,
    pub command: &'a [String],
    pub placeholder: &'a str,
}

/// A value that can reliably seed a new shell-variable name every call, even across invocations
/// that race within the same clock tick.
fn uniquifier() -> Result<String> {
    let raw = fs::read_to_string("/proc/uptime")?;
    let token = raw
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::Environment("unable to parse /proc/uptime".into()))?;
    let resolution = token.split('.').nth(1).map(|frac| frac.len()).unwrap_or(0);
    let scale = 10f64.powi(resolution as i32);

    std::thread::sleep(Duration::from_secs_f64(1.0 / scale));

    let value: f64 = token
        .parse()
        .map_err(|_| Error::Environment("unable to parse /proc/uptime".into()))?;
    let mut duration = (value * scale).round() as u64;

    let mut suffix = Vec::new();
    loop {
        let digit = (duration % SUFFIX_ALPHABET.len() as u64) as usize;
        suffix.insert(0, SUFFIX_ALPHABET[digit]);
        duration /= SUFFIX_ALPHABET.len() as u64;
        if duration == 0 {
            break;
        }
    }
    Ok(String::from_utf8(suffix).expect("alphabet is ASCII"))
}

/// Quote `word` for safe reinsertion into a shell command line: unchanged if it contains only
/// characters that need no quoting, otherwise single-quoted with embedded `'` escaped as `'\''`.
fn shell_quote(word: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "@%_-+=:,./".contains(c);
    if !word.is_empty() && word.chars().all(is_safe) {
        return word.to_string();
    }
    let mut quoted = String::from("'");
    for c in word.chars() {
        if c == '\'' {
            quoted.push_str("'\"'\"'");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Reconstruct the `<`/`>`/`>>`/`<>` clause for `fd`, if it refers to anything other than a tty,
/// fifo, or socket — i.e. something `/proc/self/fd/N` can meaningfully resolve.
fn reflect_fd(direction: &str, fd: RawFd) -> Option<String> {
    if isatty(fd).unwrap_or(false) {
        return None;
    }
    let stat = fstat(fd).ok()?;
    let mode = SFlag::from_bits_truncate(stat.st_mode);
    if mode.contains(SFlag::S_IFIFO) || mode.contains(SFlag::S_IFSOCK) {
        return None;
    }
    let target = std::fs::read_link(format!("/proc/self/fd/{}", fd)).ok()?;
    let target = String::from_utf8_lossy(OsStr::as_bytes(target.as_os_str()));
    Some(format!("{}{}", direction, shell_quote(&target)))
}

/// Append stdio-redirection clauses so the resumed invocation preserves the original command's
/// I/O routing instead of inheriting the tool's own (suspended) descriptors.
fn reflect_redirections(argv: &mut Vec<String>) {
    let (stdin_same_as_stdout, stdout_appends) = match (fstat(0), fstat(1)) {
        (Ok(a), Ok(b)) => (
            (a.st_dev, a.st_ino) == (b.st_dev, b.st_ino),
            unsafe { libc::fcntl(1, libc::F_GETFL) & libc::O_APPEND != 0 },
        ),
        _ => (false, false),
    };

    if stdin_same_as_stdout {
        if let Some(clause) = reflect_fd("<>", 0) {
            argv.push(clause);
            argv.push(">&0".to_string());
        }
    } else {
        if let Some(clause) = reflect_fd("<", 0) {
            argv.push(clause);
        }
        let direction = if stdout_appends { ">>" } else { ">" };
        if let Some(clause) = reflect_fd(direction, 1) {
            argv.push(clause);
        }
    }

    if let (Ok(out), Ok(err)) = (fstat(1), fstat(2)) {
        if (out.st_dev, out.st_ino) == (err.st_dev, err.st_ino) && reflect_fd(">", 1).is_some() {
            argv.push("2>&1".to_string());
        }
    }
}

/// Rebuild the full invocation as a shell command-line string, with the salt argument replaced
/// by a reference to `saltvar`.
fn build_command(invocation: &ChallengeInvocation<'_>, saltvar: &str) -> String {
    let mut argv = vec![invocation.program.to_string()];

    if let Some(file) = invocation.file {
        argv.push("-f".to_string());
        argv.push(shell_quote(file));
    }
    if invocation.tty {
        argv.push("-t".to_string());
    }
    if invocation.pipe {
        argv.push(if invocation.oneline { "-p1".to_string() } else { "-p".to_string() });
    }
    if let Some(timeout) = invocation.timeout_minutes {
        argv.push("-T".to_string());
        argv.push(timeout.to_string());
    }
    argv.push("-s".to_string());
    argv.push(format!("<(${{{}}})", saltvar));
    argv.push(shell_quote(invocation.key));
    argv.push("--".to_string());

    for word in invocation.command {
        if word == invocation.placeholder {
            argv.push(invocation.placeholder.to_string());
        } else {
            argv.push(shell_quote(word));
        }
    }

    reflect_redirections(&mut argv);

    argv.join(" ")
}

/// Run the challenge: synthesize a salt, inject a follow-up shell command that reads it back
/// through a side channel, and self-suspend until the operator's shell resumes the tool.
///
/// A clean `Ok(())` return means the handoff worked: the caller should treat this the same as
/// exit code 127, since a new invocation carrying `--salt` is what the operator's shell is about
/// to run.
pub fn run(tty_fd: RawFd, invocation: &ChallengeInvocation<'_>) -> Result<()> {
    if !isatty(tty_fd).unwrap_or(false) {
        return Err(Error::Environment("unable to find salt in key".into()));
    }

    let mut salt_bytes = [0u8; 3];
    getrandom(&mut salt_bytes)?;
    let salt_hex = salt_bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>();

    let saltvar = format!("{}{}", CHANNEL_PREFIX, uniquifier()?);
    let command_line = build_command(invocation, &saltvar);

    let (rdfd, wrfd) = pipe()?;

    match unsafe { fork()? } {
        ForkResult::Child => {
            let _ = close(rdfd);
            unsafe { libc::write(wrfd, format!("echo {}\n", salt_hex).as_ptr().cast(), salt_hex.len() + 6) };
            let _ = close(wrfd);
            std::process::exit(0);
        }
        ForkResult::Parent { .. } => {
            let _ = close(wrfd);
        }
    }

    let script = format!(
        " unset {var} ; read -r {var} </proc/{pid}/fd/{fd} ; fg\n\n{cmd}",
        var = saltvar,
        pid = getpid().as_raw(),
        fd = rdfd,
        cmd = command_line,
    );

    {
        let _echo = ScopedEcho::disable(tty_fd)?;
        let _suspend = ScopedInputSuspend::suspend(tty_fd)?;
        nix::sys::termios::tcflush(tty_fd, FlushArg::TCIFLUSH)?;
        terminal::inject_bytes(tty_fd, script.as_bytes())?;
    }

    kill(Pid::this(), Signal::SIGSTOP)?;

    let unread = terminal::readable_bytes(rdfd).unwrap_or(0);
    let _ = close(rdfd);
    if unread != 0 {
        return Err(Error::Environment("Key unread".into()));
    }

    Ok(())
}

fn getrandom(buf: &mut [u8]) -> Result<()> {
    use rand::RngCore;
    rand::thread_rng().fill_bytes(buf);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(shell_quote("plain-word"), "plain-word");
        assert_eq!(shell_quote("has space"), "'has space'");
    }

    #[test]
    fn escapes_embedded_single_quote() {
        assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
    }

    #[test]
    fn channel_variable_uses_fixed_prefix() {
        let name = format!("{}{}", CHANNEL_PREFIX, "Ab1");
        assert!(name.starts_with("_MEMENTO_"));
    }

    #[test]
    fn build_command_carries_salt_reference() {
        let invocation = ChallengeInvocation {
            program: "memento",
            file: None,
            tty: false,
            pipe: false,
            oneline: false,
            timeout_minutes: None,
            key: "alpha",
            command: &["/bin/cat".to_string(), "@@".to_string()],
            placeholder: "@@",
        };
        let line = build_command(&invocation, "_MEMENTO_Ab1");
        assert!(line.contains("<(${_MEMENTO_Ab1})"));
        assert!(line.contains("alpha"));
        assert!(line.contains("@@"));
    }
}
