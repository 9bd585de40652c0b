use gmxflow::process::ProcessEvent;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug)]
pub enum UiEvent {
    /// A run of `total` commands is about to start.
    RunStarted { total: usize },
    Process(ProcessEvent),
}

pub struct UiManager {
    mp: Arc<MultiProgress>,
    state: RunDisplay,
    event_receiver: mpsc::Receiver<UiEvent>,
    shutdown_receiver: watch::Receiver<bool>,
    _sentinel_bar: ProgressBar,
}

#[derive(Default)]
struct RunDisplay {
    active_bar: Option<ProgressBar>,
    total: usize,
    started: usize,
}

impl RunDisplay {
    fn clear_bar(&mut self) {
        if let Some(bar) = self.active_bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, event_receiver) = mpsc::channel(1024);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mp = Arc::new(MultiProgress::new());
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let _sentinel_bar = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            state: RunDisplay::default(),
            event_receiver,
            shutdown_receiver,
            _sentinel_bar,
        };

        (manager, event_sender, shutdown_sender)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.event_receiver.recv() => {
                    self.handle_event(event);
                }
                result = self.shutdown_receiver.changed() => {
                    if result.is_err() || *self.shutdown_receiver.borrow() {
                        break;
                    }
                }
            }
        }
        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_event(event);
        }
        self.state.clear_bar();
        self._sentinel_bar.finish_and_clear();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::RunStarted { total } => {
                self.state.clear_bar();
                self.state.total = total;
                self.state.started = 0;
            }
            UiEvent::Process(event) => self.handle_process(event),
        }
    }

    fn handle_process(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Started { command } => {
                self.state.clear_bar();
                self.state.started += 1;

                let pb = self.mp.add(ProgressBar::new_spinner());
                pb.enable_steady_tick(Duration::from_millis(80));
                pb.set_style(Self::spinner_style());
                pb.set_message(self.step_label(&command));

                self.state.active_bar = Some(pb);
            }
            ProcessEvent::Output { text } => {
                self.mp.println(format!("  {}", text)).ok();
            }
            ProcessEvent::Finished { command, .. } => {
                self.state.clear_bar();
                self.mp.println(format!("✓ {}", command)).ok();
            }
            ProcessEvent::Failed { command, exit_code } => {
                self.state.clear_bar();
                let status = match exit_code {
                    Some(code) => format!("exit code {}", code),
                    None => "did not exit normally".to_string(),
                };
                self.mp.println(format!("✗ {} ({})", command, status)).ok();
            }
            ProcessEvent::Stopped => {
                self.state.clear_bar();
                self.mp.println("■ Run stopped").ok();
            }
            ProcessEvent::Completed => {
                self.state.clear_bar();
                self.mp
                    .println(format!("✓ {} command(s) completed", self.state.started))
                    .ok();
            }
        }
    }

    fn step_label(&self, command: &str) -> String {
        if self.state.total == 0 {
            command.to_string()
        } else {
            format!("[{}/{}] {}", self.state.started, self.state.total, command)
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} {elapsed:.dim}")
            .expect("Invalid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }
}

/// Relays orchestrator events to the UI until the orchestrator is dropped.
pub fn forward_process_events(
    mut events: mpsc::UnboundedReceiver<ProcessEvent>,
    sender: mpsc::Sender<UiEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Err(e) = sender.send(UiEvent::Process(event)).await {
                warn!("Failed to send process event to UI channel: {}", e);
                break;
            }
        }
    })
}
