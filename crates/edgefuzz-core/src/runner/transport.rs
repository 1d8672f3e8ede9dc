//! Byte-level transport for the REPRL protocol, and the two implementations
//! that plug into it: a real OS child process, and an in-process test
//! double.
//!
//! The out-of-scope collaborator here (§1, §4.5) is the *instrumented
//! target interpreter binary* itself; `ChildProcessSpec` is the trait
//! boundary that keeps the driver ignorant of it.

use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use crate::error::RunnerError;

/// One round of the REPRL protocol over whatever channels connect us to
/// the child: write a request, write the script, read back a status word
/// and the three output streams.
pub trait ReprlTransport {
    fn write_control(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn read_control_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
    fn write_data(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn read_stdout(&mut self) -> io::Result<String>;
    fn read_stderr(&mut self) -> io::Result<String>;
    fn read_fuzzout(&mut self) -> io::Result<String>;
    /// Terminates the child immediately, used on timeout or after a crash.
    fn kill(&mut self);
}

/// Spawns (and respawns) the concrete child connected to a `ReprlTransport`.
pub trait ChildProcessSpec {
    fn spawn(&self) -> io::Result<Box<dyn ReprlTransport>>;
}

/// Reads everything currently buffered on `stream` without blocking
/// indefinitely, up to the child's next zero-byte delimiter (§6.2: output
/// streams are "delimited by a zero byte").
fn read_until_nul(stream: &mut impl Read) -> io::Result<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                if byte[0] == 0 {
                    break;
                }
                buf.push(byte[0]);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// A real child process communicating over two OS pipe pairs dup2'd onto
/// fixed descriptor numbers the target binary's instrumentation harness
/// is expected to read (mirrors the real REPRL fd convention).
pub struct SpawnedChild {
    child: Child,
    ctrl_write: std::fs::File,
    ctrl_read: std::fs::File,
    data_write: std::fs::File,
}

/// Fixed fd numbers the child inherits and dup2s its ends of the pipes
/// onto, matching the "four file descriptors inherited from the parent"
/// described in §4.5 step 1.
const CHILD_CTRL_READ_FD: i32 = 100;
const CHILD_CTRL_WRITE_FD: i32 = 101;
const CHILD_DATA_READ_FD: i32 = 102;

impl SpawnedChild {
    /// Spawns `argv[0]` with `argv[1..]` and `envp`, wiring up the REPRL
    /// pipes. Unix-only: the wire protocol is defined entirely in terms of
    /// POSIX pipes and dup2, matching the out-of-scope native
    /// instrumentation library's expectations.
    #[cfg(unix)]
    pub fn spawn_argv(argv: &[String], envp: &[(String, String)]) -> io::Result<Self> {
        use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
        use std::os::unix::process::CommandExt;

        fn make_pipe() -> io::Result<(RawFd, RawFd)> {
            let mut fds = [0i32; 2];
            // SAFETY: `fds` is a valid, correctly-sized output buffer for
            // `pipe(2)`; we check its integer return for failure below.
            let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok((fds[0], fds[1]))
        }

        let (ctrl_parent_read, ctrl_child_write) = make_pipe()?;
        let (ctrl_child_read, ctrl_parent_write) = make_pipe()?;
        let (data_child_read, data_parent_write) = make_pipe()?;

        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]);
        command.envs(envp.iter().cloned());
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        // SAFETY: the closure only calls async-signal-safe libc functions
        // (dup2, close) between fork and exec, as required by `pre_exec`.
        unsafe {
            command.pre_exec(move || {
                if libc::dup2(ctrl_child_read, CHILD_CTRL_READ_FD) < 0 {
                    return Err(io::Error::last_os_error());
                }
                if libc::dup2(ctrl_child_write, CHILD_CTRL_WRITE_FD) < 0 {
                    return Err(io::Error::last_os_error());
                }
                if libc::dup2(data_child_read, CHILD_DATA_READ_FD) < 0 {
                    return Err(io::Error::last_os_error());
                }
                libc::close(ctrl_parent_read);
                libc::close(ctrl_parent_write);
                libc::close(data_parent_write);
                Ok(())
            });
        }

        let child = command.spawn()?;

        // SAFETY: these fds were just created by `make_pipe` above and are
        // not owned by anything else yet.
        let ctrl_write = unsafe { std::fs::File::from_raw_fd(ctrl_parent_write) };
        let ctrl_read = unsafe { std::fs::File::from_raw_fd(ctrl_parent_read) };
        let data_write = unsafe { std::fs::File::from_raw_fd(data_parent_write) };

        // The child's ends of the pipes are only needed across the
        // fork+exec boundary; close our duplicate references to them now
        // that the child owns its copies.
        unsafe {
            libc::close(ctrl_child_read);
            libc::close(ctrl_child_write);
            libc::close(data_child_read);
        }

        Ok(Self { child, ctrl_write, ctrl_read, data_write })
    }
}

impl ReprlTransport for SpawnedChild {
    fn write_control(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.ctrl_write.write_all(bytes)
    }

    fn read_control_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.ctrl_read.read_exact(buf)
    }

    fn write_data(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.data_write.write_all(bytes)
    }

    fn read_stdout(&mut self) -> io::Result<String> {
        match self.child.stdout.as_mut() {
            Some(stream) => read_until_nul(stream),
            None => Ok(String::new()),
        }
    }

    fn read_stderr(&mut self) -> io::Result<String> {
        match self.child.stderr.as_mut() {
            Some(stream) => read_until_nul(stream),
            None => Ok(String::new()),
        }
    }

    fn read_fuzzout(&mut self) -> io::Result<String> {
        // The fuzzout stream shares the data channel's read direction in
        // this port (no fourth fd is wired up since nothing in this
        // core crate produces it); callers needing a real fuzzout stream
        // supply their own `ReprlTransport`.
        Ok(String::new())
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// The `ChildProcessSpec` a real fuzzing run uses: respawns `SpawnedChild`
/// against a fixed argv/envp every time the `Runner` asks for a fresh
/// child (on first use and after every respawn threshold).
#[cfg(unix)]
pub struct ArgvSpec {
    argv: Vec<String>,
    envp: Vec<(String, String)>,
}

#[cfg(unix)]
impl ArgvSpec {
    pub fn new(argv: Vec<String>, envp: Vec<(String, String)>) -> Self {
        Self { argv, envp }
    }
}

#[cfg(unix)]
impl ChildProcessSpec for ArgvSpec {
    fn spawn(&self) -> io::Result<Box<dyn ReprlTransport>> {
        Ok(Box::new(SpawnedChild::spawn_argv(&self.argv, &self.envp)?))
    }
}

/// A scripted, in-process stand-in for a child process, used throughout
/// `tests/` to drive REPRL edge cases without a real instrumented
/// interpreter (§4.5 "Supplemented").
pub struct ScriptedChild {
    responses: std::collections::VecDeque<ScriptedResponse>,
    last_script: Vec<u8>,
    pending_stdout: String,
    pending_stderr: String,
}

#[derive(Clone)]
pub struct ScriptedResponse {
    pub status_word: u32,
    pub stdout: String,
    pub stderr: String,
    pub delay: Duration,
}

impl ScriptedChild {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self { responses: responses.into(), last_script: Vec::new(), pending_stdout: String::new(), pending_stderr: String::new() }
    }

    pub fn last_script(&self) -> &[u8] {
        &self.last_script
    }
}

impl ReprlTransport for ScriptedChild {
    fn write_control(&mut self, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn read_control_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let response = self
            .responses
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "scripted child exhausted"))?;
        if response.delay > Duration::ZERO {
            std::thread::sleep(response.delay);
        }
        buf.copy_from_slice(&response.status_word.to_le_bytes());
        self.pending_stdout = response.stdout;
        self.pending_stderr = response.stderr;
        Ok(())
    }

    fn write_data(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.last_script = bytes.to_vec();
        Ok(())
    }

    fn read_stdout(&mut self) -> io::Result<String> {
        Ok(std::mem::take(&mut self.pending_stdout))
    }

    fn read_stderr(&mut self) -> io::Result<String> {
        Ok(std::mem::take(&mut self.pending_stderr))
    }

    fn read_fuzzout(&mut self) -> io::Result<String> {
        Ok(String::new())
    }

    fn kill(&mut self) {}
}

pub struct DummySpec {
    pub responses_factory: std::rc::Rc<dyn Fn() -> Vec<ScriptedResponse>>,
}

impl ChildProcessSpec for DummySpec {
    fn spawn(&self) -> io::Result<Box<dyn ReprlTransport>> {
        Ok(Box::new(ScriptedChild::new((self.responses_factory)())))
    }
}

pub fn runner_error_from_io(attempts: u32, err: &io::Error) -> RunnerError {
    RunnerError::SpawnFailed { attempts, message: err.to_string() }
}
