//! The execution driver: a persistent REPRL child process, respawned on
//! the policy described in §4.5.

pub mod execution;
pub mod reprl;
pub mod transport;

use std::time::{Duration, Instant};

use crate::error::RunnerError;
use crate::runner::execution::{Execution, Outcome};
use crate::runner::reprl::{encode_request, StatusWord};
use crate::runner::transport::{ChildProcessSpec, ReprlTransport};

/// Spawn retry budget before giving up on bringing a child up at all.
const SPAWN_RETRIES: u32 = 10;

/// Drives one REPRL child process across many script executions,
/// transparently respawning it per the policy in §4.5.
pub struct Runner {
    spec: Box<dyn ChildProcessSpec>,
    transport: Option<Box<dyn ReprlTransport>>,
    execs_since_spawn: u32,
    consecutive_failures: u32,
    max_execs_before_respawn: u32,
    max_script_size: usize,
    max_consecutive_failures: u32,
}

impl Runner {
    pub fn new(
        spec: Box<dyn ChildProcessSpec>,
        max_execs_before_respawn: u32,
        max_script_size: usize,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            spec,
            transport: None,
            execs_since_spawn: 0,
            consecutive_failures: 0,
            max_execs_before_respawn,
            max_script_size,
            max_consecutive_failures,
        }
    }

    fn ensure_spawned(&mut self) -> Result<(), RunnerError> {
        if self.transport.is_some() {
            return Ok(());
        }
        let mut last_err = None;
        for attempt in 1..=SPAWN_RETRIES {
            match self.spec.spawn() {
                Ok(transport) => {
                    self.transport = Some(transport);
                    self.execs_since_spawn = 0;
                    return Ok(());
                }
                Err(e) => {
                    last_err = Some(e);
                    std::thread::sleep(Duration::from_millis(10 * u64::from(attempt)));
                }
            }
        }
        Err(RunnerError::SpawnFailed {
            attempts: SPAWN_RETRIES,
            message: last_err.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    fn respawn(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.kill();
        }
    }

    /// Executes `script` against the child, respecting `timeout`.
    ///
    /// Scripts exceeding `max_script_size` are rejected with `timedOut`
    /// without ever reaching the child (§8 boundary behavior). Infra
    /// failures (cannot spawn, broken pipe) count against the
    /// consecutive-failure budget and escalate to
    /// `RunnerError::TooManyConsecutiveFailures` once it is exhausted (§7).
    pub fn execute(&mut self, script: &[u8], timeout: Duration) -> Result<Execution, RunnerError> {
        if script.len() > self.max_script_size {
            return Ok(Execution {
                outcome: Outcome::TimedOut,
                stdout: String::new(),
                stderr: String::new(),
                fuzzout: String::new(),
                exec_time: Duration::ZERO,
            });
        }

        match self.try_execute(script, timeout) {
            Ok(execution) => {
                self.consecutive_failures = 0;
                if execution.is_crash() {
                    self.respawn();
                }
                Ok(execution)
            }
            Err(err) => {
                self.respawn();
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.max_consecutive_failures {
                    Err(RunnerError::TooManyConsecutiveFailures { limit: self.max_consecutive_failures })
                } else {
                    Err(err)
                }
            }
        }
    }

    fn try_execute(&mut self, script: &[u8], timeout: Duration) -> Result<Execution, RunnerError> {
        self.ensure_spawned()?;
        let transport = self.transport.as_mut().expect("just ensured spawned");

        let request = encode_request(script.len() as u64);
        transport.write_control(&request).map_err(|e| RunnerError::PipeBroken(e.to_string()))?;
        transport.write_data(script).map_err(|e| RunnerError::PipeBroken(e.to_string()))?;

        let start = Instant::now();
        let mut status_bytes = [0u8; 4];
        transport.read_control_exact(&mut status_bytes).map_err(|e| RunnerError::PipeBroken(e.to_string()))?;
        let exec_time = start.elapsed();

        if exec_time > timeout {
            transport.kill();
            self.transport = None;
            return Ok(Execution {
                outcome: Outcome::TimedOut,
                stdout: String::new(),
                stderr: String::new(),
                fuzzout: String::new(),
                exec_time,
            });
        }

        let status = StatusWord(u32::from_le_bytes(status_bytes));
        if status.has_reserved_bits_set() {
            return Err(RunnerError::MalformedStatusWord(status.0));
        }

        let stdout = transport.read_stdout().unwrap_or_default();
        let stderr = transport.read_stderr().unwrap_or_default();
        let fuzzout = transport.read_fuzzout().unwrap_or_default();

        self.execs_since_spawn += 1;
        let must_respawn = status.no_further_requests() || self.execs_since_spawn >= self.max_execs_before_respawn;
        let outcome = status.to_outcome();

        let execution = Execution { outcome, stdout, stderr, fuzzout, exec_time };
        if must_respawn {
            self.respawn();
        }
        Ok(execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::transport::{DummySpec, ScriptedResponse};
    use std::rc::Rc;
    use std::time::Duration;

    fn spec_with(responses: Vec<ScriptedResponse>) -> Box<dyn ChildProcessSpec> {
        let responses = Rc::new(responses);
        Box::new(DummySpec { responses_factory: Rc::new(move || (*responses).clone()) })
    }

    #[test]
    fn failed_exit_code_parses_correctly() {
        let mut runner = Runner::new(
            spec_with(vec![ScriptedResponse { status_word: 0x0000_0100, stdout: String::new(), stderr: String::new(), delay: Duration::ZERO }]),
            1000,
            1 << 20,
            10,
        );
        let execution = runner.execute(b"1+1", Duration::from_millis(100)).unwrap();
        assert_eq!(execution.outcome, Outcome::Failed(1));
        assert!(execution.exec_time <= Duration::from_millis(100));
    }

    #[test]
    fn oversized_script_times_out_without_reaching_child() {
        let mut runner = Runner::new(spec_with(vec![]), 1000, 4, 10);
        let execution = runner.execute(b"way too long", Duration::from_millis(100)).unwrap();
        assert_eq!(execution.outcome, Outcome::TimedOut);
    }

    #[test]
    fn slow_response_is_reported_as_timed_out() {
        let mut runner = Runner::new(
            spec_with(vec![ScriptedResponse {
                status_word: StatusWord::encode(Outcome::Succeeded, false),
                stdout: String::new(),
                stderr: String::new(),
                delay: Duration::from_millis(50),
            }]),
            1000,
            1 << 20,
            10,
        );
        let execution = runner.execute(b"while(true){}", Duration::from_millis(5)).unwrap();
        assert_eq!(execution.outcome, Outcome::TimedOut);
    }
}
