//! Controller event loop
//!
//! Runs a [`MonitoringController`] on its own task. Presentation commands and
//! subscription deliveries are handled one at a time on that task, so state is
//! only ever mutated by a single writer.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::controller::MonitoringController;
use crate::types::{MonitoringState, Phase};

/// Requests the presentation layer can make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RequestAuthorization,
    Start,
    Stop,
    Toggle,
    SetMaxHeartRate { age: u32 },
    FetchLatest,
    Shutdown,
}

/// Cloneable handle to a running controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<MonitoringState>,
}

impl ControllerHandle {
    /// Queue a command. Returns false if the loop has exited.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn request_authorization(&self) -> bool {
        self.send(Command::RequestAuthorization)
    }

    pub fn start(&self) -> bool {
        self.send(Command::Start)
    }

    pub fn stop(&self) -> bool {
        self.send(Command::Stop)
    }

    pub fn toggle(&self) -> bool {
        self.send(Command::Toggle)
    }

    pub fn set_max_heart_rate(&self, age: u32) -> bool {
        self.send(Command::SetMaxHeartRate { age })
    }

    pub fn fetch_latest(&self) -> bool {
        self.send(Command::FetchLatest)
    }

    pub fn shutdown(&self) -> bool {
        self.send(Command::Shutdown)
    }

    /// Latest published state
    pub fn state(&self) -> MonitoringState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<MonitoringState> {
        self.state.clone()
    }
}

/// Spawn the controller loop on the current runtime.
///
/// The join handle yields the controller back once the loop shuts down, so the
/// final session can be inspected.
pub fn spawn(controller: MonitoringController) -> (ControllerHandle, JoinHandle<MonitoringController>) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let handle = ControllerHandle {
        commands: commands_tx,
        state: controller.watch(),
    };
    let task = tokio::spawn(run(controller, commands_rx));
    (handle, task)
}

/// Drive the controller until `Shutdown` or every handle is dropped
pub async fn run(
    mut controller: MonitoringController,
    mut commands: mpsc::UnboundedReceiver<Command>,
) -> MonitoringController {
    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => execute(&mut controller, command).await,
            },
            Some(delivery) = controller.next_delivery() => controller.handle_delivery(delivery),
        }
    }

    if controller.phase() == Phase::Monitoring {
        controller.stop();
    }
    info!("controller loop exited");
    controller
}

async fn execute(controller: &mut MonitoringController, command: Command) {
    debug!(?command, "executing command");
    match command {
        Command::RequestAuthorization => controller.request_authorization().await,
        Command::Start => controller.start(),
        Command::Stop => controller.stop(),
        Command::Toggle => controller.toggle(),
        Command::SetMaxHeartRate { age } => controller.set_max_heart_rate(age),
        Command::FetchLatest => controller.fetch_latest().await,
        Command::Shutdown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::feedback::RecordingHaptics;
    use crate::source::ChannelSource;
    use crate::types::{FeedbackEffect, Sample};
    use crate::zone::Zone;
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_loop_serializes_commands_and_batches() {
        let (feeder, source) = ChannelSource::create();
        let haptics = Arc::new(RecordingHaptics::new());
        let controller = MonitoringController::new(
            Arc::new(source),
            haptics.clone(),
            &MonitorConfig::default(),
        )
        .unwrap();

        let (handle, task) = spawn(controller);
        let mut state = handle.watch();

        handle.request_authorization();
        handle.start();
        state.wait_for(|s| s.is_monitoring).await.unwrap();

        feeder.push(vec![Sample::new(120.0, Utc::now())]);
        feeder.push(vec![Sample::new(170.0, Utc::now())]);
        state.wait_for(|s| s.stats.count == 2).await.unwrap();
        assert_eq!(handle.state().current_zone, Zone::Peak);

        handle.shutdown();
        let controller = task.await.unwrap();

        assert!(!controller.state().is_monitoring);
        assert_eq!(controller.session().len(), 2);
        assert_eq!(
            haptics.effects(),
            vec![
                FeedbackEffect::BeginSession,
                FeedbackEffect::Escalate,
                FeedbackEffect::Warning,
                FeedbackEffect::EndSession,
            ]
        );
    }

    #[tokio::test]
    async fn test_dropping_handles_ends_loop() {
        let controller = MonitoringController::new(
            Arc::new(ChannelSource::default()),
            Arc::new(RecordingHaptics::new()),
            &MonitorConfig::default(),
        )
        .unwrap();

        let (handle, task) = spawn(controller);
        drop(handle);

        let controller = task.await.unwrap();
        assert_eq!(controller.phase(), Phase::Unauthorized);
    }
}
