use super::environment::ExecutionEnvironment;
use super::events::{ProcessEvent, RunState};
use std::collections::VecDeque;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

pub const STOPPED_MESSAGE: &str = "Command stopped by user";

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("A command queue is already running; stop it before starting another")]
    AlreadyRunning,

    #[error("Failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

struct ActiveCommand {
    command: String,
    child: Child,
    readers: Vec<JoinHandle<()>>,
}

/// Runs a queue of shell commands one at a time and reports progress as
/// [`ProcessEvent`]s.
///
/// The orchestrator never spawns a background driver of its own. The owner
/// calls [`run`](Self::run) and then awaits [`step`](Self::step) until the
/// run is over (or uses [`run_to_completion`](Self::run_to_completion)).
/// `step` is cancel-safe, so it can be raced against a cancellation source in
/// `tokio::select!` and followed by [`stop`](Self::stop).
///
/// A non-zero exit aborts the rest of the queue. At most one external process
/// is alive at any time.
pub struct ProcessOrchestrator {
    environment: ExecutionEnvironment,
    events: UnboundedSender<ProcessEvent>,
    state: RunState,
    queue: VecDeque<String>,
    active: Option<ActiveCommand>,
}

impl ProcessOrchestrator {
    /// Creates an idle orchestrator and the receiving end of its event stream.
    pub fn new(environment: ExecutionEnvironment) -> (Self, UnboundedReceiver<ProcessEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                environment,
                events,
                state: RunState::Idle,
                queue: VecDeque::new(),
                active: None,
            },
            receiver,
        )
    }

    pub fn environment(&self) -> &ExecutionEnvironment {
        &self.environment
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Commands still waiting behind the active one.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn current_command(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.command.as_str())
    }

    /// Replaces the queue with `commands` and launches the first one.
    ///
    /// Accepted from `Idle` and `Failed`. An empty list completes immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::AlreadyRunning`] while a previous run is in
    /// progress; that run is left untouched.
    #[instrument(skip_all, fields(commands = commands.len()))]
    pub fn run(&mut self, commands: Vec<String>) -> Result<(), ExecutionError> {
        if self.is_running() {
            warn!("Ignoring run request: a command queue is already running");
            return Err(ExecutionError::AlreadyRunning);
        }
        info!("Starting a run of {} command(s)", commands.len());
        self.queue = commands.into();
        self.state = RunState::Running;
        self.launch_next();
        Ok(())
    }

    /// Waits for the active command to exit and applies the queue rules:
    /// success launches the next command (or completes the run), failure
    /// discards the remaining queue.
    ///
    /// Returns whether the run is still in progress. Returns immediately when
    /// nothing is running.
    pub async fn step(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            return self.is_running();
        };

        let status = active.child.wait().await;

        while let Some(reader) = active.readers.last_mut() {
            if let Err(e) = reader.await {
                trace!("Output reader ended abnormally: {}", e);
            }
            active.readers.pop();
        }

        let Some(finished) = self.active.take() else {
            return self.is_running();
        };
        let command = finished.command;

        match status {
            Ok(status) if status.success() => {
                info!("Command finished: {}", command);
                self.emit(ProcessEvent::Finished {
                    command,
                    exit_code: status.code().unwrap_or(0),
                });
                self.launch_next();
            }
            Ok(status) => {
                warn!("Command failed with {}: {}", status, command);
                self.fail(command, status.code());
            }
            Err(source) => {
                let err = ExecutionError::Wait {
                    command: command.clone(),
                    source,
                };
                error!("{}", err);
                self.emit(ProcessEvent::Output {
                    text: err.to_string(),
                });
                self.fail(command, None);
            }
        }
        self.is_running()
    }

    /// Runs `commands` and drives them until the run ends.
    pub async fn run_to_completion(
        &mut self,
        commands: Vec<String>,
    ) -> Result<RunState, ExecutionError> {
        self.run(commands)?;
        while self.step().await {}
        Ok(self.state.clone())
    }

    /// Kills the active command, discards the queue and returns to `Idle`.
    pub fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            info!("Stopping '{}'", active.command);
            if let Err(e) = active.child.start_kill() {
                debug!("Kill request failed (process may have exited): {}", e);
            }
            for reader in active.readers.drain(..) {
                reader.abort();
            }
        }
        let dropped = self.queue.len();
        self.queue.clear();
        self.state = RunState::Idle;
        debug!("Discarded {} queued command(s)", dropped);

        self.emit(ProcessEvent::Output {
            text: STOPPED_MESSAGE.to_string(),
        });
        self.emit(ProcessEvent::Stopped);
    }

    fn launch_next(&mut self) {
        let Some(command) = self.queue.pop_front() else {
            self.state = RunState::Idle;
            info!("All commands finished successfully");
            self.emit(ProcessEvent::Completed);
            return;
        };

        match self.spawn(&command) {
            Ok(active) => self.active = Some(active),
            Err(err) => {
                error!("{}", err);
                self.emit(ProcessEvent::Output {
                    text: err.to_string(),
                });
                self.fail(command, None);
            }
        }
    }

    fn spawn(&self, command: &str) -> Result<ActiveCommand, ExecutionError> {
        let env = &self.environment;
        let line = env.compose(command);
        debug!("{} {} \"{}\" (in {})", env.shell, env.shell_arg, line, env.workdir.display());

        let mut child = Command::new(&env.shell)
            .arg(&env.shell_arg)
            .arg(&line)
            .current_dir(&env.workdir)
            .envs(&env.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                command: command.to_string(),
                source,
            })?;

        info!("Running: {}", command);
        self.emit(ProcessEvent::Started {
            command: command.to_string(),
        });

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, self.events.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, self.events.clone()));
        }

        Ok(ActiveCommand {
            command: command.to_string(),
            child,
            readers,
        })
    }

    fn fail(&mut self, command: String, exit_code: Option<i32>) {
        self.queue.clear();
        self.state = RunState::Failed {
            command: command.clone(),
            exit_code,
        };
        self.emit(ProcessEvent::Failed { command, exit_code });
    }

    fn emit(&self, event: ProcessEvent) {
        if self.events.send(event).is_err() {
            trace!("Event receiver dropped; discarding event");
        }
    }
}

impl Drop for ProcessOrchestrator {
    fn drop(&mut self) {
        if let Some(active) = self.active.as_mut() {
            debug!("Orchestrator dropped while '{}' was running", active.command);
            for reader in &active.readers {
                reader.abort();
            }
        }
    }
}

/// Forwards every line of `reader` to the event stream as `Output`.
fn forward_lines<R>(reader: R, events: UnboundedSender<ProcessEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(text)) => {
                    if events.send(ProcessEvent::Output { text }).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read process output: {}", e);
                    break;
                }
            }
        }
    })
}
