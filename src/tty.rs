//! Terminal passphrase entry.
//!
//! Echo is disabled for the read and restored afterwards. A SIGINT or
//! SIGQUIT arriving mid-read restores echo before the signal is re-raised
//! with default disposition, so an interrupted prompt never leaves the
//! terminal dark.

use std::io::{BufRead, Write};

use crate::error::{Error, Result};

/// Reads a passphrase from the controlling terminal without echoing it.
pub fn read_passphrase(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    let _ = std::io::stderr().flush();
    let guard = no_echo::NoEchoGuard::engage();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(Error::Io)?;
    drop(guard);
    eprintln!();
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

/// Prompts twice and insists the entries match.
pub fn read_new_passphrase(what: &str) -> Result<String> {
    let first = read_passphrase(&format!("Enter {what} passphrase: "))?;
    let second = read_passphrase(&format!("Verify {what} passphrase: "))?;
    if first != second {
        return Err(Error::WrongPassphrase);
    }
    Ok(first)
}

#[cfg(unix)]
mod no_echo {
    use std::mem::MaybeUninit;
    use std::sync::atomic::{AtomicBool, Ordering};

    static ECHO_CLEARED: AtomicBool = AtomicBool::new(false);
    static mut SAVED: MaybeUninit<libc::termios> = MaybeUninit::uninit();

    /// Restores echo if the prompt cleared it, then re-raises the signal
    /// with default disposition.
    extern "C" fn restore_and_reraise(sig: libc::c_int) {
        if ECHO_CLEARED.swap(false, Ordering::SeqCst) {
            unsafe {
                let saved = std::ptr::addr_of!(SAVED).read().assume_init();
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &saved);
            }
        }
        unsafe {
            libc::signal(sig, libc::SIG_DFL);
            libc::raise(sig);
        }
    }

    pub struct NoEchoGuard {
        engaged: bool,
        previous_int: libc::sighandler_t,
        previous_quit: libc::sighandler_t,
    }

    impl NoEchoGuard {
        pub fn engage() -> NoEchoGuard {
            unsafe {
                let mut term = MaybeUninit::<libc::termios>::uninit();
                if libc::tcgetattr(libc::STDIN_FILENO, term.as_mut_ptr()) != 0 {
                    // not a terminal: nothing to disable
                    return NoEchoGuard { engaged: false, previous_int: 0, previous_quit: 0 };
                }
                let saved = term.assume_init();
                std::ptr::addr_of_mut!(SAVED).write(MaybeUninit::new(saved));

                let mut quiet = saved;
                quiet.c_lflag &= !libc::ECHO;
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &quiet);
                ECHO_CLEARED.store(true, Ordering::SeqCst);

                let handler =
                    restore_and_reraise as extern "C" fn(libc::c_int) as libc::sighandler_t;
                let previous_int = libc::signal(libc::SIGINT, handler);
                let previous_quit = libc::signal(libc::SIGQUIT, handler);
                NoEchoGuard { engaged: true, previous_int, previous_quit }
            }
        }
    }

    impl Drop for NoEchoGuard {
        fn drop(&mut self) {
            if !self.engaged {
                return;
            }
            if ECHO_CLEARED.swap(false, Ordering::SeqCst) {
                unsafe {
                    let saved = std::ptr::addr_of!(SAVED).read().assume_init();
                    libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &saved);
                    libc::signal(libc::SIGINT, self.previous_int);
                    libc::signal(libc::SIGQUIT, self.previous_quit);
                }
            }
        }
    }
}

#[cfg(not(unix))]
mod no_echo {
    pub struct NoEchoGuard;

    impl NoEchoGuard {
        pub fn engage() -> NoEchoGuard {
            NoEchoGuard
        }
    }
}
