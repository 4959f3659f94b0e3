//! Raw terminal control: echo gating, input-flow suspension, and character injection.
//!
//! `nix::sys::termios` covers attribute save/restore and `tcflow`. `TIOCSTI` (push a byte into
//! the terminal driver's input queue, as if the user typed it) and `FIONREAD` (how many bytes
//! are waiting to be read) have no `nix` wrapper and are issued as raw `ioctl`s.

use std::io;
use std::os::unix::io::RawFd;
use std::thread;
use std::time::Duration;

use nix::sys::termios::{self, LocalFlags, SetArg, Termios};

const INJECT_BACKOFF_START: Duration = Duration::from_millis(100);
const INJECT_BACKOFF_CAP: Duration = Duration::from_secs(2);

fn tiocsti(fd: RawFd, byte: u8) -> io::Result<()> {
    let ret = unsafe { libc::ioctl(fd, libc::TIOCSTI, &byte as *const u8) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Bytes currently queued and unread on `fd`, via `FIONREAD`.
pub fn readable_bytes(fd: RawFd) -> io::Result<usize> {
    let mut n: libc::c_int = 0;
    let ret = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut n as *mut libc::c_int) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Whether the terminal on `fd` currently has `ECHO` enabled.
pub fn echo_is_set(fd: RawFd) -> nix::Result<bool> {
    let attrs = termios::tcgetattr(fd)?;
    Ok(attrs.local_flags.contains(LocalFlags::ECHO))
}

/// Push a single byte into the terminal driver's input queue as though it had been typed.
pub fn inject_byte(fd: RawFd, byte: u8) -> io::Result<()> {
    tiocsti(fd, byte)
}

/// Push every byte of `bytes`, unconditionally, in order.
pub fn inject_bytes(fd: RawFd, bytes: &[u8]) -> io::Result<()> {
    for &byte in bytes {
        inject_byte(fd, byte)?;
    }
    Ok(())
}

/// Temporarily clears `ECHO` on a terminal, restoring the previous state on drop.
///
/// Used around terminal injection so the operator's own keystrokes (and the tool's injected
/// ones) are never echoed back while the protocol is in flight.
pub struct ScopedEcho {
    fd: RawFd,
    saved: Termios,
}

impl ScopedEcho {
    /// Disable `ECHO` on `fd`, remembering the previous attributes.
    pub fn disable(fd: RawFd) -> nix::Result<Self> {
        let saved = termios::tcgetattr(fd)?;
        let mut attrs = saved.clone();
        attrs.local_flags.remove(LocalFlags::ECHO);
        termios::tcsetattr(fd, SetArg::TCSADRAIN, &attrs)?;
        Ok(ScopedEcho { fd, saved })
    }
}

impl Drop for ScopedEcho {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(self.fd, SetArg::TCSADRAIN, &self.saved);
    }
}

/// Suspends input flow (`TCIOFF`) on construction, resumes it (`TCION`) on drop.
///
/// Used to freeze any keystrokes the operator might type while the tool is mid-injection, so
/// they don't interleave with the injected bytes.
pub struct ScopedInputSuspend {
    fd: RawFd,
}

impl ScopedInputSuspend {
    /// Suspend input flow on `fd`.
    pub fn suspend(fd: RawFd) -> nix::Result<Self> {
        termios::tcflow(fd, termios::FlowArg::TCIOFF)?;
        Ok(ScopedInputSuspend { fd })
    }
}

impl Drop for ScopedInputSuspend {
    fn drop(&mut self) {
        let _ = termios::tcflow(self.fd, termios::FlowArg::TCION);
    }
}

/// Deliver `payload` to `fd` one byte at a time, only while `ECHO` is off.
///
/// While echo is on (the operator's shell prompt, most likely), this backs off exponentially
/// starting at 100ms and capping at 2s before re-checking, rather than ever inject a secret
/// byte into an echoing prompt.
pub fn type_delivery(fd: RawFd, payload: &[u8]) -> nix::Result<()> {
    for &byte in payload {
        let mut backoff = INJECT_BACKOFF_START;
        while echo_is_set(fd)? {
            thread::sleep(backoff);
            backoff = (backoff * 2).min(INJECT_BACKOFF_CAP);
        }
        inject_byte(fd, byte).map_err(|_| nix::Error::EIO)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_two_seconds() {
        let mut backoff = INJECT_BACKOFF_START;
        for _ in 0..10 {
            backoff = (backoff * 2).min(INJECT_BACKOFF_CAP);
        }
        assert_eq!(backoff, INJECT_BACKOFF_CAP);
    }
}
