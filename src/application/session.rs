// Console session - Owns a live visual console, its refresh timer and navigation
use crate::application::console_api::ConsoleApi;
use crate::application::loader::{LoadHandle, LoadOutcome, load};
use crate::application::renderer::ConsoleRenderer;
use crate::domain::console::{ConsoleData, ConsoleError, VisualConsole};
use crate::domain::link::{ClickDisposition, ItemLink};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

const LOG_TARGET: &str = "visual_console";
const API_LOG_TARGET: &str = "visual_console::api";

/// Called with the previous and the new console properties after every update.
pub type UpdateCallback = Box<dyn FnMut(&Value, &Value) + Send>;

#[derive(Default)]
pub struct SessionConfig {
    /// Time between refreshes; `None` or zero disables them.
    pub update_interval: Option<Duration>,
    pub on_update: Option<UpdateCallback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No refresh timer.
    Idle,
    /// Timer running, nothing in flight.
    Polling,
    /// Timer running, a refresh is in flight.
    Fetching,
    /// A navigation is in flight, timer paused.
    Navigating,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsoleSnapshot {
    pub id: u64,
    pub properties: Value,
    pub items: Vec<Value>,
    pub state: SessionState,
    pub updated_at: Option<DateTime<Utc>>,
}

enum Command {
    Navigate(u64),
    StopUpdates,
    StartUpdates,
    Snapshot(oneshot::Sender<ConsoleSnapshot>),
}

enum Completion {
    Refresh { seq: u64, outcome: LoadOutcome },
    Navigation { seq: u64, outcome: LoadOutcome },
}

/// Handle to a running console session.
///
/// The session lives until every clone of the handle is dropped.
#[derive(Clone)]
pub struct ConsoleSession {
    commands: mpsc::UnboundedSender<Command>,
}

impl ConsoleSession {
    /// Build the console and start its session task.
    pub fn spawn<R: ConsoleRenderer>(
        api: Arc<dyn ConsoleApi>,
        mut renderer: R,
        props: Value,
        items: Value,
        config: SessionConfig,
    ) -> Result<Self, ConsoleError> {
        let console = VisualConsole::new(props, items)?;
        renderer.update_elements(console.items());

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let mut task = SessionTask {
            console,
            renderer: Box::new(renderer),
            api,
            update_interval: config.update_interval.filter(|d| !d.is_zero()),
            on_update: config.on_update,
            timer: None,
            refresh: None,
            navigation: None,
            next_seq: 0,
            updated_at: None,
            commands: commands_rx,
            completions: completions_rx,
            completions_tx,
        };
        task.start_timer();
        tokio::spawn(task.run());

        Ok(Self {
            commands: commands_tx,
        })
    }

    /// Like [`ConsoleSession::spawn`], logging a construction error instead
    /// of returning it.
    pub fn create<R: ConsoleRenderer>(
        api: Arc<dyn ConsoleApi>,
        renderer: R,
        props: Value,
        items: Value,
        config: SessionConfig,
    ) -> Option<Self> {
        match Self::spawn(api, renderer, props, items, config) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::error!(target: LOG_TARGET, "{}", e);
                None
            }
        }
    }

    /// Handle a click on a console item. Links to another local console are
    /// intercepted and loaded in place of the current one.
    pub fn click(&self, link: &ItemLink) -> ClickDisposition {
        match link.navigation_target() {
            Some(id) if self.commands.send(Command::Navigate(id)).is_ok() => {
                ClickDisposition::Intercepted
            }
            _ => ClickDisposition::Default,
        }
    }

    pub fn stop_updates(&self) {
        let _ = self.commands.send(Command::StopUpdates);
    }

    pub fn start_updates(&self) {
        let _ = self.commands.send(Command::StartUpdates);
    }

    pub async fn snapshot(&self) -> Option<ConsoleSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    pub async fn state(&self) -> Option<SessionState> {
        self.snapshot().await.map(|snapshot| snapshot.state)
    }
}

struct SessionTask {
    console: VisualConsole,
    renderer: Box<dyn ConsoleRenderer>,
    api: Arc<dyn ConsoleApi>,
    update_interval: Option<Duration>,
    on_update: Option<UpdateCallback>,
    timer: Option<Interval>,
    refresh: Option<(u64, LoadHandle)>,
    navigation: Option<(u64, LoadHandle)>,
    next_seq: u64,
    updated_at: Option<DateTime<Utc>>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions: mpsc::UnboundedReceiver<Completion>,
    completions_tx: mpsc::UnboundedSender<Completion>,
}

impl SessionTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
                _ = next_tick(&mut self.timer) => self.start_refresh(),
            }
        }

        tracing::debug!(target: LOG_TARGET, "Session for console {} closed", self.console.id());
        for (_, handle) in self.refresh.take().into_iter().chain(self.navigation.take()) {
            handle.cancel();
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Navigate(id) => self.navigate(id),
            Command::StopUpdates => self.stop_timer(),
            Command::StartUpdates => self.start_timer(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Refresh { seq, outcome } => {
                // Superseded by a newer refresh or cancelled by a navigation
                if !is_current(&self.refresh, seq) {
                    return;
                }
                self.refresh = None;
                match outcome {
                    LoadOutcome::Loaded(data) => self.apply(data),
                    LoadOutcome::Failed(e) => tracing::error!(target: API_LOG_TARGET, "{}", e),
                    LoadOutcome::Aborted => {}
                }
            }
            Completion::Navigation { seq, outcome } => {
                if !is_current(&self.navigation, seq) {
                    return;
                }
                self.navigation = None;
                match outcome {
                    LoadOutcome::Loaded(data) => {
                        if let Some((_, handle)) = self.refresh.take() {
                            handle.cancel();
                        }
                        self.apply(data);
                        self.start_timer();
                    }
                    // The timer stays paused after a failed navigation
                    LoadOutcome::Failed(e) => tracing::error!(target: API_LOG_TARGET, "{}", e),
                    LoadOutcome::Aborted => {}
                }
            }
        }
    }

    fn start_refresh(&mut self) {
        if let Some((_, previous)) = self.refresh.take() {
            previous.cancel();
        }

        let seq = self.take_seq();
        let tx = self.completions_tx.clone();
        let handle = load(self.api.clone(), self.console.id(), move |outcome| {
            let _ = tx.send(Completion::Refresh { seq, outcome });
        });
        tracing::trace!(target: LOG_TARGET, "Refreshing console {}", handle.console_id());
        self.refresh = Some((seq, handle));
    }

    fn navigate(&mut self, console_id: u64) {
        if let Some((_, previous)) = self.navigation.take() {
            previous.cancel();
        }
        self.stop_timer();

        tracing::debug!(target: LOG_TARGET, "Navigating to console {}", console_id);
        let seq = self.take_seq();
        let tx = self.completions_tx.clone();
        let handle = load(self.api.clone(), console_id, move |outcome| {
            let _ = tx.send(Completion::Navigation { seq, outcome });
        });
        self.navigation = Some((seq, handle));
    }

    /// Replace the console with freshly loaded data. Malformed payloads drop
    /// the update.
    fn apply(&mut self, data: ConsoleData) {
        let decoded = match data.decode() {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!(target: LOG_TARGET, "Ignoring console update: {}", e);
                return;
            }
        };

        let previous = self.console.replace(decoded.properties, decoded.items);
        self.renderer.update_elements(self.console.items());
        self.updated_at = Some(Utc::now());
        if let Some(on_update) = self.on_update.as_mut() {
            on_update(&previous, self.console.props());
        }
    }

    fn start_timer(&mut self) {
        let Some(period) = self.update_interval else {
            return;
        };
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
    }

    fn stop_timer(&mut self) {
        self.timer = None;
    }

    fn take_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn state(&self) -> SessionState {
        if self.navigation.is_some() {
            SessionState::Navigating
        } else if self.timer.is_none() {
            SessionState::Idle
        } else if self.refresh.is_some() {
            SessionState::Fetching
        } else {
            SessionState::Polling
        }
    }

    fn snapshot(&self) -> ConsoleSnapshot {
        ConsoleSnapshot {
            id: self.console.id(),
            properties: self.console.props().clone(),
            items: self.console.items().to_vec(),
            state: self.state(),
            updated_at: self.updated_at,
        }
    }
}

fn is_current(slot: &Option<(u64, LoadHandle)>, seq: u64) -> bool {
    slot.as_ref().is_some_and(|(current, _)| *current == seq)
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
