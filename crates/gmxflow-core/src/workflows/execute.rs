use crate::process::{ExecutionError, ProcessOrchestrator, RunState};
use std::future::Future;
use tracing::{info, instrument};

/// How a driven run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed {
        command: String,
        exit_code: Option<i32>,
    },
    /// The cancellation future resolved first; the active command was killed.
    Stopped,
}

/// Runs `commands` on `orchestrator` until they finish or `cancel` resolves.
///
/// Progress is reported on the orchestrator's event stream; this function
/// only drives it.
#[instrument(skip_all, name = "execute_workflow", fields(commands = commands.len()))]
pub async fn execute<C>(
    orchestrator: &mut ProcessOrchestrator,
    commands: Vec<String>,
    cancel: C,
) -> Result<RunOutcome, ExecutionError>
where
    C: Future<Output = ()>,
{
    orchestrator.run(commands)?;
    tokio::pin!(cancel);

    while orchestrator.is_running() {
        tokio::select! {
            _ = orchestrator.step() => {}
            _ = &mut cancel => {
                info!("Cancellation requested; stopping the run");
                orchestrator.stop();
                return Ok(RunOutcome::Stopped);
            }
        }
    }

    Ok(match orchestrator.state() {
        RunState::Failed { command, exit_code } => RunOutcome::Failed {
            command: command.clone(),
            exit_code: *exit_code,
        },
        RunState::Idle | RunState::Running => RunOutcome::Completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ExecutionEnvironmentBuilder, ProcessEvent};
    use std::time::Duration;

    fn orchestrator(
        dir: &tempfile::TempDir,
    ) -> (ProcessOrchestrator, tokio::sync::mpsc::UnboundedReceiver<ProcessEvent>) {
        let env = ExecutionEnvironmentBuilder::new()
            .workdir(dir.path())
            .shell("/bin/sh")
            .shell_arg("-c")
            .build()
            .unwrap();
        ProcessOrchestrator::new(env)
    }

    #[tokio::test]
    async fn uncancelled_run_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (mut orch, _rx) = orchestrator(&dir);
        let outcome = execute(&mut orch, vec!["true".into(), "true".into()], std::future::pending())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
    }

    #[tokio::test]
    async fn failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (mut orch, _rx) = orchestrator(&dir);
        let outcome = execute(&mut orch, vec!["exit 2".into()], std::future::pending())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Failed { command: "exit 2".into(), exit_code: Some(2) }
        );
    }

    #[tokio::test]
    async fn cancellation_stops_the_active_command() {
        let dir = tempfile::tempdir().unwrap();
        let (mut orch, mut rx) = orchestrator(&dir);
        let outcome = execute(
            &mut orch,
            vec!["sleep 5".into(), "echo never".into()],
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(orch.state(), &RunState::Idle);
        let mut saw_stopped = false;
        while let Ok(event) = rx.try_recv() {
            saw_stopped |= event == ProcessEvent::Stopped;
        }
        assert!(saw_stopped);
    }
}
