//! Optional fork/pipe/timeout isolation of a single trial (spec.md §4.7).
//!
//! Grounded on `reifydb-reifydb`'s use of `libc` for low-level process
//! control (Cargo.toml `[target.'cfg(unix)'.dependencies] libc`), and on
//! `original_source/src/run.c`'s `fork_test_fn`: fork, run the property in
//! the child, write one result byte down a pipe, poll with timeout in the
//! parent, escalate `signal` then `SIGKILL` if the child doesn't respond.

use std::time::{Duration, Instant};

use crate::error::{EngineError, EngineResult};

/// Fork-mode configuration (spec.md §6's `fork` field).
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForkConfig {
    pub enable: bool,
    pub timeout_ms: u64,
    /// Signal sent when `timeout_ms` elapses without a result.
    /// Ignored on non-unix builds.
    pub signal: i32,
    /// Further ticks to wait after `signal` before escalating to a kill
    /// signal.
    pub exit_timeout_ms: u64,
}

impl Default for ForkConfig {
    fn default() -> Self {
        ForkConfig {
            enable: false,
            timeout_ms: 1000,
            signal: 15, // SIGTERM
            exit_timeout_ms: 100,
        }
    }
}

/// Outcome of one isolated property invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Pass,
    Fail,
    Skip,
    /// The child exited (or was killed) without writing a result byte.
    NoResult,
}

/// Runs `property` in a forked child, isolated by a pipe and a timeout.
///
/// `post_fork` is invoked in the child immediately after `fork`, before
/// `property`, letting a caller drop privileges or set resource limits
/// (spec.md §4.7). On hosts without fork support this always returns
/// `Ok(None)` without mutating any state, signalling "skip the whole run"
/// (spec.md §9's fork-less-host requirement); the caller is responsible
/// for turning that into `trial::PropertyResult::Skip`.
#[cfg(unix)]
pub fn run_isolated(
    config: &ForkConfig,
    post_fork: impl FnOnce(),
    property: impl FnOnce() -> WorkerOutcome,
) -> EngineResult<Option<WorkerOutcome>> {
    unix_impl::run_isolated(config, post_fork, property)
}

#[cfg(not(unix))]
pub fn run_isolated(
    _config: &ForkConfig,
    _post_fork: impl FnOnce(),
    _property: impl FnOnce() -> WorkerOutcome,
) -> EngineResult<Option<WorkerOutcome>> {
    Ok(None)
}

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use std::io::Read;
    use std::os::unix::io::{FromRawFd, RawFd};

    const RESULT_PASS: u8 = 0;
    const RESULT_FAIL: u8 = 1;
    const RESULT_SKIP: u8 = 2;

    fn outcome_byte(outcome: WorkerOutcome) -> u8 {
        match outcome {
            WorkerOutcome::Pass => RESULT_PASS,
            WorkerOutcome::Fail => RESULT_FAIL,
            WorkerOutcome::Skip => RESULT_SKIP,
            WorkerOutcome::NoResult => RESULT_FAIL,
        }
    }

    fn outcome_from_byte(byte: u8) -> WorkerOutcome {
        match byte {
            RESULT_PASS => WorkerOutcome::Pass,
            RESULT_SKIP => WorkerOutcome::Skip,
            _ => WorkerOutcome::Fail,
        }
    }

    pub fn run_isolated(
        config: &ForkConfig,
        post_fork: impl FnOnce(),
        property: impl FnOnce() -> WorkerOutcome,
    ) -> EngineResult<Option<WorkerOutcome>> {
        let mut fds: [RawFd; 2] = [0; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(EngineError::Worker("failed to create pipe"));
        }
        let (read_fd, write_fd) = (fds[0], fds[1]);

        let pid = unsafe { libc::fork() };
        if pid < 0 {
            unsafe {
                libc::close(read_fd);
                libc::close(write_fd);
            }
            return Err(EngineError::Worker("fork failed"));
        }

        if pid == 0 {
            unsafe {
                libc::close(read_fd);
            }
            post_fork();
            let outcome = property();
            let byte = outcome_byte(outcome);
            unsafe {
                libc::write(write_fd, &byte as *const u8 as *const libc::c_void, 1);
                libc::close(write_fd);
            }
            unsafe { libc::_exit(0) };
        }

        unsafe {
            libc::close(write_fd);
        }
        let mut file = unsafe { std::fs::File::from_raw_fd(read_fd) };

        let deadline = Instant::now() + Duration::from_millis(config.timeout_ms);
        let mut byte = [0u8; 1];
        let mut got_result = false;

        while Instant::now() < deadline {
            set_nonblocking(read_fd);
            match file.read(&mut byte) {
                Ok(1) => {
                    got_result = true;
                    break;
                }
                Ok(_) => break, // EOF: child closed without writing
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }

        if !got_result {
            tracing::warn!(pid, "trial timed out; sending configured signal");
            unsafe {
                libc::kill(pid, config.signal);
            }
            let kill_deadline = Instant::now() + Duration::from_millis(config.exit_timeout_ms);
            let mut reaped = false;
            while Instant::now() < kill_deadline {
                let mut status = 0;
                let r = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
                if r == pid {
                    reaped = true;
                    break;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            if !reaped {
                tracing::warn!(pid, "trial still alive after signal; escalating to SIGKILL");
                unsafe {
                    libc::kill(pid, libc::SIGKILL);
                    let mut status = 0;
                    libc::waitpid(pid, &mut status, 0);
                }
            }
            return Ok(Some(WorkerOutcome::NoResult));
        }

        let mut status = 0;
        unsafe {
            libc::waitpid(pid, &mut status, 0);
        }
        Ok(Some(outcome_from_byte(byte[0])))
    }

    fn set_nonblocking(fd: RawFd) {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL, 0);
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn passing_property_reports_pass() {
        let config = ForkConfig {
            enable: true,
            timeout_ms: 500,
            ..ForkConfig::default()
        };
        let result = run_isolated(&config, || {}, || WorkerOutcome::Pass).unwrap();
        assert_eq!(result, Some(WorkerOutcome::Pass));
    }

    #[test]
    fn failing_property_reports_fail() {
        let config = ForkConfig {
            enable: true,
            timeout_ms: 500,
            ..ForkConfig::default()
        };
        let result = run_isolated(&config, || {}, || WorkerOutcome::Fail).unwrap();
        assert_eq!(result, Some(WorkerOutcome::Fail));
    }

    #[test]
    fn hung_child_times_out_without_hanging_parent() {
        let config = ForkConfig {
            enable: true,
            timeout_ms: 50,
            exit_timeout_ms: 50,
            signal: 15,
        };
        let result = run_isolated(
            &config,
            || {},
            || {
                std::thread::sleep(Duration::from_secs(5));
                WorkerOutcome::Pass
            },
        )
        .unwrap();
        assert_eq!(result, Some(WorkerOutcome::NoResult));
    }
}

#[cfg(all(test, not(unix)))]
mod non_unix_tests {
    use super::*;

    #[test]
    fn non_unix_always_skips_without_mutation() {
        let config = ForkConfig {
            enable: true,
            ..ForkConfig::default()
        };
        let result = run_isolated(&config, || {}, || WorkerOutcome::Pass).unwrap();
        assert_eq!(result, None);
    }
}
