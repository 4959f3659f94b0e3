use nix::sys::signal::{self, SigHandler, Signal};

use memento::cli::Invocation;
use memento::dispatch;
use memento::error::Error;

extern "C" fn handle_sigint(_: libc::c_int) {
    std::process::exit(1);
}

fn install_sigint_handler() {
    // Meaningful only while blocked on the interactive prompt; everywhere else the process is
    // either mid-syscall (already EINTR-safe) or about to exit on its own.
    unsafe {
        let _ = signal::signal(Signal::SIGINT, SigHandler::Handler(handle_sigint));
    }
}

fn main() {
    env_logger::init();
    install_sigint_handler();

    let invocation = match Invocation::parse() {
        Ok(invocation) => invocation,
        Err(err) => die(&err),
    };

    match dispatch::run(&invocation) {
        Ok(code) => std::process::exit(code),
        Err(Error::Challenged) => std::process::exit(127),
        Err(err) => die(&err),
    }
}

fn die(err: &Error) -> ! {
    eprintln!("memento: {}", err);
    std::process::exit(err.exit_code());
}
