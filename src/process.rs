//! Thin wrapper around the external executable.
//!
//! A `Runner` takes the argument list and a `Limit` and reports what the
//! process did. It never looks at the output; decoding belongs to `pass_cli`.

use log::debug;
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Captured stdout/stderr, killed once the duration runs out.
    Bounded(Duration),
    /// Inherits the terminal and may wait forever, e.g. for a login prompt
    /// owned by the external tool.
    Interactive,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),
    #[error("failed while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

pub trait Runner {
    fn run(&self, args: &[String], limit: Limit) -> Result<Output, ProcessError>;
}

pub struct ProcessRunner {
    program: String,
}

impl ProcessRunner {
    pub fn new(program: &str) -> ProcessRunner {
        ProcessRunner {
            program: program.to_string(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn_error(&self, source: io::Error) -> ProcessError {
        ProcessError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    fn io_error(&self, source: io::Error) -> ProcessError {
        ProcessError::Io {
            program: self.program.clone(),
            source,
        }
    }

    fn run_bounded(&self, args: &[String], timeout: Duration) -> Result<Output, ProcessError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.spawn_error(err))?;

        // Both pipes are drained while we wait, a chatty child would block
        // on a full pipe otherwise.
        let (tx, rx) = mpsc::channel();
        drain(child.stdout.take(), Stream::Stdout, tx.clone());
        drain(child.stderr.take(), Stream::Stderr, tx);

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait().map_err(|err| self.io_error(err))? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    if let Err(err) = child.kill() {
                        debug!("killing {} failed: {}", self.program, err);
                    }
                    let _ = child.wait();
                    return Err(ProcessError::Timeout(timeout));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let (stdout, stderr) = self.collect(rx, deadline, timeout)?;
        Ok(Output {
            code: exit_code(status),
            stdout,
            stderr,
        })
    }

    fn run_interactive(&self, args: &[String]) -> Result<Output, ProcessError> {
        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|err| self.spawn_error(err))?;

        Ok(Output {
            code: exit_code(status),
            ..Output::default()
        })
    }

    /// The pipes stay open as long as any descendant holds them, so reading
    /// them is bound by the same deadline as the child itself.
    fn collect(
        &self,
        rx: Receiver<(Stream, io::Result<String>)>,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<(String, String), ProcessError> {
        let mut stdout = None;
        let mut stderr = None;
        while stdout.is_none() || stderr.is_none() {
            // A child that exited right at the deadline still gets one poll
            // interval for its readers to report.
            let left = deadline
                .saturating_duration_since(Instant::now())
                .max(POLL_INTERVAL);
            match rx.recv_timeout(left) {
                Ok((Stream::Stdout, res)) => stdout = Some(res.map_err(|err| self.io_error(err))?),
                Ok((Stream::Stderr, res)) => stderr = Some(res.map_err(|err| self.io_error(err))?),
                Err(RecvTimeoutError::Timeout) => {
                    debug!("{} exited but its output is still open", self.program);
                    return Err(ProcessError::Timeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(self.io_error(io::Error::new(
                        io::ErrorKind::Other,
                        "output reader stopped",
                    )))
                }
            }
        }
        Ok((stdout.unwrap_or_default(), stderr.unwrap_or_default()))
    }
}

impl Runner for ProcessRunner {
    fn run(&self, args: &[String], limit: Limit) -> Result<Output, ProcessError> {
        let started = Instant::now();
        let res = match limit {
            Limit::Bounded(timeout) => self.run_bounded(args, timeout),
            Limit::Interactive => self.run_interactive(args),
        };
        match &res {
            Ok(output) => debug!(
                "{} exited with {} after {:?}",
                self.program,
                output.code,
                started.elapsed()
            ),
            Err(err) => debug!("{}: {}", self.program, err),
        }
        res
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn drain<R>(pipe: Option<R>, stream: Stream, tx: Sender<(Stream, io::Result<String>)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let res = match pipe {
            Some(mut pipe) => pipe.read_to_end(&mut buf).map(drop),
            None => Ok(()),
        };
        let text = res.map(|_| String::from_utf8_lossy(&buf).into_owned());
        // The receiver is gone once the call timed out.
        let _ = tx.send((stream, text));
    });
}

/// Signals have no exit code; they count as a failure.
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
