use std::{collections::VecDeque, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{
    config::LiveConfig,
    indicator::StatusIndicator,
    refresh::{RefreshAction, RefreshOutcome},
    state::{ConnectionEvent, ConnectionMachine, ConnectionStatus, Effect, NamedEvent},
    transport::{EventTransport, TransportEvent},
};

// Set to false to silence connection diagnostics from this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub reconnect_attempts: u32,
    pub polling: bool,
    pub endpoint: String,
    pub last_event_at: Option<DateTime<Utc>>,
}

enum Command {
    Event(ConnectionEvent),
    Stream {
        generation: u64,
        event: TransportEvent,
    },
    RetryIndicator,
}

/// Keeps a dashboard up to date from the server's event stream.
///
/// The connection state lives on a single driver task; every stream event,
/// timer and visibility change reaches it as a message and is handled to
/// completion before the next one.
pub struct LiveUpdateClient {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<ConnectionSnapshot>,
    shutdown: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl LiveUpdateClient {
    /// Spawns the driver; the first connection attempt follows after the
    /// configured startup delay. Must be called inside a tokio runtime.
    pub fn start(
        config: LiveConfig,
        transport: Arc<dyn EventTransport>,
        indicator: Arc<dyn StatusIndicator>,
        refresh: Arc<dyn RefreshAction>,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let machine = ConnectionMachine::new(config);
        let (snapshot_tx, snapshot) = watch::channel(snapshot_of(&machine, None));

        let driver = Driver {
            machine,
            transport,
            indicator,
            refresh,
            commands: commands.clone(),
            snapshot: snapshot_tx,
            shutdown: shutdown.clone(),
            generation: 0,
            stream_cancel: None,
            fallback: None,
            indicator_retry_pending: false,
            last_event_at: None,
        };

        log_info!("Live update client initializing...");
        let _ = commands.send(Command::Event(ConnectionEvent::Start));
        let handle = tokio::spawn(driver.run(receiver));

        Self {
            commands,
            snapshot,
            shutdown,
            driver: Some(handle),
        }
    }

    /// The page became visible again; reconnects if the stream is gone.
    pub fn notify_visible(&self) {
        log_info!("Became visible, checking stream connection...");
        if self
            .commands
            .send(Command::Event(ConnectionEvent::VisibilityRegained))
            .is_err()
        {
            log_warn!("Live update client is no longer running");
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.snapshot.borrow().status
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.snapshot.clone()
    }

    /// Closes the stream, stops polling and waits for the driver to finish.
    pub async fn stop(mut self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(handle) = self.driver.take() {
            handle
                .await
                .context("live update driver failed to join")?;
        }
        Ok(())
    }
}

impl Drop for LiveUpdateClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Driver {
    machine: ConnectionMachine,
    transport: Arc<dyn EventTransport>,
    indicator: Arc<dyn StatusIndicator>,
    refresh: Arc<dyn RefreshAction>,
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Sender<ConnectionSnapshot>,
    shutdown: CancellationToken,
    /// Bumped on every open; events tagged with an older value are stale.
    generation: u64,
    stream_cancel: Option<CancellationToken>,
    fallback: Option<JoinHandle<()>>,
    indicator_retry_pending: bool,
    last_event_at: Option<DateTime<Utc>>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.dispatch(ConnectionEvent::Stop);
                    break;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }

        self.close_stream();
        if let Some(handle) = self.fallback.take() {
            handle.abort();
        }
        log_info!("Live update client stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Event(event) => self.dispatch(event),
            Command::Stream { generation, event } => {
                if generation != self.generation {
                    log_debug!("Dropping {:?} from superseded stream #{}", event, generation);
                    return;
                }
                if let Some(event) = self.translate(event) {
                    self.dispatch(event);
                } else {
                    self.publish();
                }
            }
            Command::RetryIndicator => {
                self.indicator_retry_pending = false;
                self.show(self.machine.status());
            }
        }
    }

    fn translate(&mut self, event: TransportEvent) -> Option<ConnectionEvent> {
        match event {
            TransportEvent::Open => {
                log_info!("Event stream opened");
                Some(ConnectionEvent::Opened)
            }
            TransportEvent::Message(message) => {
                self.last_event_at = Some(Utc::now());
                match NamedEvent::from_name(&message.event) {
                    Some(kind) => {
                        log_info!("Stream event '{}': {}", message.event, message.data);
                        Some(ConnectionEvent::Named(kind))
                    }
                    None => {
                        log_debug!("Ignoring stream event '{}'", message.event);
                        None
                    }
                }
            }
            TransportEvent::Error { closed } => {
                log_warn!(
                    "Event stream error ({})",
                    if closed { "closed" } else { "reconnecting" }
                );
                Some(ConnectionEvent::StreamError { closed })
            }
        }
    }

    fn dispatch(&mut self, event: ConnectionEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            for effect in self.machine.transition(event) {
                if let Some(next) = self.execute(effect) {
                    pending.push_back(next);
                }
            }
        }
        self.publish();
    }

    fn execute(&mut self, effect: Effect) -> Option<ConnectionEvent> {
        match effect {
            Effect::ShowStatus(status) => self.show(status),
            Effect::OpenStream { url } => return self.open_stream(&url),
            Effect::CloseStream => self.close_stream(),
            Effect::ScheduleConnect(delay) => {
                let attempts = self.machine.reconnect_attempts();
                if attempts > 0 {
                    log_info!("Reconnecting in {:?}... attempt {}", delay, attempts);
                }
                self.schedule(delay, Command::Event(ConnectionEvent::Connect));
            }
            Effect::StartFallback(interval) => self.start_fallback(interval),
            Effect::StopFallback => {
                if let Some(handle) = self.fallback.take() {
                    handle.abort();
                    log_info!("Stopped fallback polling");
                }
            }
            Effect::Refresh => match self.refresh.trigger() {
                RefreshOutcome::Triggered => log_info!("Triggered dashboard refresh"),
                RefreshOutcome::Missing => log_warn!("Refresh action not available"),
            },
        }
        None
    }

    fn open_stream(&mut self, url: &str) -> Option<ConnectionEvent> {
        self.close_stream();
        self.generation += 1;
        let generation = self.generation;
        let cancel = self.shutdown.child_token();

        log_info!("Connecting to event stream: {}", url);
        match self.transport.open(url, cancel.clone()) {
            Ok(mut events) => {
                let commands = self.commands.clone();
                let forward_cancel = cancel.clone();
                tokio::spawn(async move {
                    loop {
                        let event = tokio::select! {
                            _ = forward_cancel.cancelled() => break,
                            event = events.recv() => event,
                        };
                        let Some(event) = event else { break };
                        if commands.send(Command::Stream { generation, event }).is_err() {
                            break;
                        }
                    }
                });
                self.stream_cancel = Some(cancel);
                None
            }
            Err(err) => {
                log_error!("Failed to open event stream {}: {}", url, err);
                Some(ConnectionEvent::OpenFailed)
            }
        }
    }

    fn close_stream(&mut self) {
        if let Some(cancel) = self.stream_cancel.take() {
            cancel.cancel();
        }
    }

    fn start_fallback(&mut self, interval: Duration) {
        if let Some(handle) = self.fallback.take() {
            handle.abort();
        }

        let commands = self.commands.clone();
        self.fallback = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if commands
                    .send(Command::Event(ConnectionEvent::FallbackTick))
                    .is_err()
                {
                    break;
                }
            }
        }));
        log_warn!("Started fallback polling every {:?}", interval);
    }

    fn schedule(&self, delay: Duration, command: Command) {
        let commands = self.commands.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = time::sleep(delay) => {
                    let _ = commands.send(command);
                }
            }
        });
    }

    fn show(&mut self, status: ConnectionStatus) {
        match self.indicator.show(status) {
            Ok(()) => log_debug!("Live status: {}", status.as_str()),
            Err(err) => {
                if self.indicator_retry_pending {
                    return;
                }
                let retry = self.machine.config().indicator_retry;
                log_info!("{}, retrying in {:?}", err, retry);
                self.indicator_retry_pending = true;
                self.schedule(retry, Command::RetryIndicator);
            }
        }
    }

    fn publish(&self) {
        self.snapshot
            .send_replace(snapshot_of(&self.machine, self.last_event_at));
    }
}

fn snapshot_of(machine: &ConnectionMachine, last_event_at: Option<DateTime<Utc>>) -> ConnectionSnapshot {
    ConnectionSnapshot {
        status: machine.status(),
        reconnect_attempts: machine.reconnect_attempts(),
        polling: machine.is_polling(),
        endpoint: machine.config().endpoint_url(),
        last_event_at,
    }
}
