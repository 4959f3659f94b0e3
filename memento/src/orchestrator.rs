//! Process-tree choreography that keeps the target command's ancestry free of the tool itself.
//!
//! [`spawn`] never returns in most of the processes it creates: the process that becomes the
//! target command does so via `execvp` (or exits directly if that fails), and the intermediate
//! process that orphans the delivery process to init exits immediately. Only the orphaned
//! grandchild — the delivery process — falls through and gets a [`DeliveryChannel`] back,
//! matching `keysafe/__main__.py`'s `spawnFob`, where every branch but the grandchild's ends in
//! `os._exit`/`os.execvp` and only the grandchild returns.

use std::ffi::CString;
use std::os::unix::io::RawFd;

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, execvp, fork, pipe, ForkResult};

use crate::error::Result;

/// How the target command receives the memento, as far as `spawn` needs to know.
///
/// Only `File` rewrites the placeholder in argv: `Tty` delivery never touches argv at all, and
/// `Pipe` delivery dups the pipe's read end directly over the target's stdin instead, so a
/// literal placeholder word in a pipe-mode command must be left alone (rewriting it would point
/// at `rdfd` after it has already been dup'd onto stdin and closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTarget {
    File,
    Tty,
    Pipe,
}

/// What the delivery process writes into, once its side of the choreography has run.
pub struct DeliveryChannel {
    /// Duped onto `STDOUT_FILENO`; the delivery process writes the memento (and, in pipe mode,
    /// forwards the tool's original stdin) here.
    pub sink: RawFd,
}

fn to_cstring(s: &str) -> CString {
    CString::new(s).expect("argv/path must not contain an interior NUL")
}

fn wait_exit_code(pid: nix::unistd::Pid) -> Result<i32> {
    loop {
        match waitpid(pid, None)? {
            WaitStatus::Exited(_, code) => return Ok(code),
            WaitStatus::Signaled(_, signal, _) => return Ok(128 + signal as i32),
            _ => continue,
        }
    }
}

/// Close every open descriptor except `0`, `1`, `2`, and `keep`.
///
/// Mirrors `closeFds` in the Python original: a partially constructed delivery process must not
/// leak inherited locks, sockets, or sensitive descriptors into the write phase.
pub fn scrub_descriptors(keep: RawFd) {
    let limit = match nix::sys::resource::getrlimit(nix::sys::resource::Resource::RLIMIT_NOFILE) {
        Ok((soft, _)) => soft as RawFd,
        Err(_) => 1024,
    };
    for fd in 3..limit {
        if fd == keep {
            continue;
        }
        let _ = close(fd);
    }
}

/// Substitute the sole occurrence of `placeholder` in `command` with `/dev/fd/{rdfd}`.
///
/// The caller (`dispatch`) is responsible for having already verified exactly one occurrence is
/// present; this is purely the textual substitution step.
fn substitute_placeholder(command: &[String], placeholder: &str, rdfd: RawFd) -> Vec<String> {
    let devfd = format!("/dev/fd/{}", rdfd);
    command
        .iter()
        .map(|word| if word == placeholder { devfd.clone() } else { word.clone() })
        .collect()
}

/// Run the double-fork choreography and either:
///
/// - become the target command (this call does not return), or
/// - exit this process directly on a fork/exec failure along the way (this call does not
///   return), or
/// - return a [`DeliveryChannel`], in the orphaned grandchild, for the caller to write the
///   memento into.
///
/// `target` selects how the target command's side of the pipe is wired up: see
/// [`DeliveryTarget`].
pub fn spawn(command: &[String], placeholder: &str, target: DeliveryTarget) -> Result<DeliveryChannel> {
    let (rdfd, wrfd) = pipe()?;

    match unsafe { fork()? } {
        ForkResult::Parent { child } => {
            let exitcode = wait_exit_code(child)?;
            if exitcode == 0 {
                if target == DeliveryTarget::Pipe {
                    dup2(rdfd, libc::STDIN_FILENO)?;
                    let _ = close(rdfd);
                } else if target == DeliveryTarget::File {
                    // /dev/fd/N keeps rdfd itself open for the exec'd program to read from.
                } else {
                    let _ = close(rdfd);
                }
                let _ = close(wrfd);

                let argv = if target == DeliveryTarget::File {
                    substitute_placeholder(command, placeholder, rdfd)
                } else {
                    command.to_vec()
                };
                let program = to_cstring(&argv[0]);
                let cargs: Vec<CString> = argv.iter().map(|s| to_cstring(s)).collect();
                let exec_err = execvp(&program, &cargs);
                log::debug!("execvp failed: {:?}", exec_err);
                std::process::exit(1);
            }
            std::process::exit(exitcode);
        }
        ForkResult::Child => match unsafe { fork()? } {
            ForkResult::Parent { .. } => std::process::exit(0),
            ForkResult::Child => {
                dup2(wrfd, libc::STDOUT_FILENO)?;
                let _ = close(wrfd);
                let _ = close(rdfd);
                scrub_descriptors(libc::STDOUT_FILENO);
                Ok(DeliveryChannel { sink: libc::STDOUT_FILENO })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_single_placeholder() {
        let command = vec!["/bin/cat".to_string(), "@@".to_string()];
        let result = substitute_placeholder(&command, "@@", 9);
        assert_eq!(result, vec!["/bin/cat".to_string(), "/dev/fd/9".to_string()]);
    }

    #[test]
    fn leaves_non_placeholder_words_untouched() {
        let command = vec!["/bin/cat".to_string(), "-n".to_string(), "@@".to_string()];
        let result = substitute_placeholder(&command, "@@", 4);
        assert_eq!(result, vec!["/bin/cat".to_string(), "-n".to_string(), "/dev/fd/4".to_string()]);
    }
}
