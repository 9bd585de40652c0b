/// Notifications emitted while a command queue runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A command was launched.
    Started { command: String },
    /// One line of merged stdout/stderr, or a status message.
    Output { text: String },
    /// A command exited with status 0.
    Finished { command: String, exit_code: i32 },
    /// A command exited non-zero, was killed by a signal, or could not be
    /// spawned (`exit_code` is `None` for the last two). The rest of the queue
    /// was discarded.
    Failed {
        command: String,
        exit_code: Option<i32>,
    },
    /// The run was cancelled through `stop()`.
    Stopped,
    /// Every queued command finished successfully.
    Completed,
}

/// Orchestrator state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    /// The last run ended on this command. New runs are accepted.
    Failed {
        command: String,
        exit_code: Option<i32>,
    },
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }
}
