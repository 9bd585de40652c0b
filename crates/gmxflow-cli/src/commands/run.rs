use crate::cli::{ConfigArgs, RunArgs};
use crate::config::{CliOverrides, build_config, user_config_path};
use crate::error::{CliError, Result};
use crate::ui::{UiEvent, forward_process_events};
use crate::utils::discovery;
use gmxflow::process::{ExecutionEnvironment, ProcessOrchestrator};
use gmxflow::workflows::{self, RunOutcome};
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(
    args: RunArgs,
    config_args: &ConfigArgs,
    ui_sender: mpsc::Sender<UiEvent>,
) -> Result<()> {
    let overrides = CliOverrides {
        ordering: args.ordering,
        workdir: args.workdir.clone(),
        gmxrc: args.gmxrc.clone(),
    };
    let config = build_config(config_args, user_config_path().as_deref(), &overrides)?;

    let (pipeline, index) = super::open_session(&config, &args.session)?;
    let commands = pipeline.commands(&super::selection(&index, &args.nodes)?)?;
    if commands.is_empty() {
        warn!("The session contains no nodes to run.");
        println!("Nothing to run.");
        return Ok(());
    }

    let mut environment = config.environment(&super::session_dir(&args.session))?;
    if environment.gmxrc.is_none() && !args.no_discover {
        environment.gmxrc = discovery::discover_gmxrc(&config.execution.gmx_program).await;
    }
    std::fs::create_dir_all(environment.workdir())?;
    info!(
        "Running {} command(s) in {:?}",
        commands.len(),
        environment.workdir()
    );

    match execute_commands(environment, commands, ui_sender, interrupted()).await? {
        RunOutcome::Completed => Ok(()),
        RunOutcome::Failed { command, exit_code } => {
            Err(CliError::CommandFailed { command, exit_code })
        }
        RunOutcome::Stopped => Err(CliError::Interrupted),
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed the run is not cancellable.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Drives one run and relays every event to the UI before returning.
async fn execute_commands<C>(
    environment: ExecutionEnvironment,
    commands: Vec<String>,
    ui_sender: mpsc::Sender<UiEvent>,
    cancel: C,
) -> Result<RunOutcome>
where
    C: Future<Output = ()>,
{
    let total = commands.len();
    if ui_sender.send(UiEvent::RunStarted { total }).await.is_err() {
        warn!("UI channel closed before the run started.");
    }

    let (mut orchestrator, events) = ProcessOrchestrator::new(environment);
    let forwarder = forward_process_events(events, ui_sender);

    let outcome = workflows::execute(&mut orchestrator, commands, cancel).await;
    drop(orchestrator);
    forwarder
        .await
        .map_err(|e| CliError::Other(anyhow::anyhow!("Event forwarding task failed: {}", e)))?;

    Ok(outcome?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmxflow::process::{ExecutionEnvironmentBuilder, ProcessEvent};

    fn sh_environment(dir: &std::path::Path) -> ExecutionEnvironment {
        ExecutionEnvironmentBuilder::new()
            .workdir(dir)
            .shell("/bin/sh")
            .shell_arg("-c")
            .build()
            .unwrap()
    }

    fn drain(receiver: &mut mpsc::Receiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn every_event_reaches_the_ui_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let (sender, mut receiver) = mpsc::channel(64);

        let outcome = execute_commands(
            sh_environment(dir.path()),
            vec!["echo hello".into(), "touch done.txt".into()],
            sender,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert!(dir.path().join("done.txt").exists());

        let events = drain(&mut receiver);
        assert!(matches!(events.first(), Some(UiEvent::RunStarted { total: 2 })));
        assert!(events.iter().any(|e| matches!(
            e,
            UiEvent::Process(ProcessEvent::Output { text }) if text == "hello"
        )));
        assert!(matches!(
            events.last(),
            Some(UiEvent::Process(ProcessEvent::Completed))
        ));
    }

    #[tokio::test]
    async fn failing_command_ends_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let (sender, _receiver) = mpsc::channel(64);

        let outcome = execute_commands(
            sh_environment(dir.path()),
            vec!["exit 4".into(), "touch never.txt".into()],
            sender,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Failed {
                command: "exit 4".into(),
                exit_code: Some(4)
            }
        );
        assert!(!dir.path().join("never.txt").exists());
    }

    #[tokio::test]
    async fn cancellation_stops_the_active_command() {
        let dir = tempfile::tempdir().unwrap();
        let (sender, mut receiver) = mpsc::channel(64);

        let outcome = execute_commands(
            sh_environment(dir.path()),
            vec!["sleep 5".into()],
            sender,
            async {},
        )
        .await
        .unwrap();

        assert_eq!(outcome, RunOutcome::Stopped);
        assert!(matches!(
            drain(&mut receiver).last(),
            Some(UiEvent::Process(ProcessEvent::Stopped))
        ));
    }
}
