//! Zero-copy kernel-to-kernel byte pump used by pipe-mode delivery.
//!
//! A [`Pipeline`] moves bytes from one descriptor to another without ever copying them into
//! userspace, using the `splice(2)` syscall. It blocks on [`poll(2)`] between transfers so the
//! forwarder never busy-loops and notices the sink hanging up immediately.

use std::io::{self, Write};
use std::os::unix::io::RawFd;

use nix::poll::{poll, PollFd, PollFlags};
use nix::unistd::dup2;

// `nix` does not wrap `splice(2)`; it is Linux-only and this tool has no portability need
// beyond Linux, so the raw syscall is called directly through `libc`.
const SPLICE_F_MOVE: libc::c_uint = 1;
const SPLICE_F_NONBLOCK: libc::c_uint = 2;

fn splice_once(source: RawFd, sink: RawFd, max_bytes: usize) -> io::Result<usize> {
    loop {
        let ret = unsafe {
            libc::splice(
                source,
                std::ptr::null_mut(),
                sink,
                std::ptr::null_mut(),
                max_bytes,
                SPLICE_F_MOVE | SPLICE_F_NONBLOCK,
            )
        };
        if ret >= 0 {
            return Ok(ret as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// A zero-copy forwarder between two descriptors.
///
/// `source` is read from, `sink` is written to. `max_bytes` caps the size of a single splice
/// call, not the total bytes moved over the pipeline's lifetime.
pub struct Pipeline {
    source: RawFd,
    sink: RawFd,
}

impl Pipeline {
    /// Build a pipeline over an already-open source and sink.
    pub fn new(source: RawFd, sink: RawFd) -> Self {
        Pipeline { source, sink }
    }

    /// Move up to `max_bytes` from source to sink, blocking until one side is ready.
    ///
    /// Returns `Ok(0)` only when the source reports EOF via a zero-length splice after POLLIN;
    /// a sink hangup surfaces as `io::ErrorKind::BrokenPipe`.
    pub fn splice(&mut self, max_bytes: usize) -> io::Result<usize> {
        let mut fds = [
            PollFd::new(self.source, PollFlags::POLLIN),
            PollFd::new(self.sink, PollFlags::POLLHUP | PollFlags::POLLERR),
        ];
        loop {
            // No timeout: the contract (matching `select.poll().poll()` with no argument in
            // the system this was modeled on) is to block indefinitely until one side is ready.
            match poll(&mut fds, -1) {
                Ok(0) => continue,
                Ok(_) => break,
                Err(nix::Error::EINTR) => continue,
                Err(err) => return Err(io::Error::from(err)),
            }
        }

        if let Some(revents) = fds[1].revents() {
            if revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR) {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
        }

        splice_once(self.source, self.sink, max_bytes)
    }

    /// Replace both endpoints with `/dev/null`, so later writes by anyone still holding the old
    /// descriptor numbers silently drop instead of landing on a reused fd.
    pub fn close(&mut self, devnull: RawFd) -> io::Result<()> {
        dup2(devnull, self.source)?;
        dup2(devnull, self.sink)?;
        Ok(())
    }
}

impl Write for Pipeline {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let ret = unsafe { libc::write(self.sink, buf.as_ptr().cast(), buf.len()) };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{close, pipe, read};

    #[test]
    fn splices_bytes_between_pipes() {
        let (source_rd, source_wr) = pipe().unwrap();
        let (sink_rd, sink_wr) = pipe().unwrap();

        unsafe { libc::write(source_wr, b"hi\n".as_ptr().cast(), 3) };
        close(source_wr).unwrap();

        let mut pipeline = Pipeline::new(source_rd, sink_wr);
        let moved = pipeline.splice(64).unwrap();
        assert_eq!(moved, 3);

        close(sink_wr).unwrap();
        let mut buf = [0u8; 8];
        let n = read(sink_rd, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hi\n");

        close(source_rd).unwrap();
        close(sink_rd).unwrap();
    }
}
