use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::LiveConfig;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Fallback,
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Fallback => "fallback",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }

    /// Indicator colour for this status.
    pub fn color(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "#10b981",
            ConnectionStatus::Connecting | ConnectionStatus::Fallback => "#f59e0b",
            ConnectionStatus::Disconnected => "#ef4444",
        }
    }

    /// Indicator text for this status.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "Live (SSE)",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Fallback => "Polling (fallback)",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }
}

/// Condition of the current stream handle, as the transport reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCondition {
    Absent,
    Connecting,
    Open,
    Closed,
}

/// Named stream events the client reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedEvent {
    Connected,
    Checkin,
    Update,
}

impl NamedEvent {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "connected" => Some(NamedEvent::Connected),
            "checkin" => Some(NamedEvent::Checkin),
            "update" => Some(NamedEvent::Update),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Client started; connect after the startup delay.
    Start,
    /// Open a fresh stream, closing any previous one.
    Connect,
    /// Transport-level open of the current stream.
    Opened,
    Named(NamedEvent),
    /// `closed` is false while the transport is retrying on its own.
    StreamError { closed: bool },
    /// The stream could not be constructed at all.
    OpenFailed,
    FallbackTick,
    VisibilityRegained,
    Stop,
}

/// Work the driver must carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ShowStatus(ConnectionStatus),
    OpenStream { url: String },
    CloseStream,
    ScheduleConnect(Duration),
    StartFallback(Duration),
    StopFallback,
    Refresh,
}

/// Reconnect/fallback state machine for the live-update stream.
///
/// Pure: it owns no timers or sockets, it only answers each event with the
/// effects to perform. Once stopped it ignores every further event.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    config: LiveConfig,
    status: ConnectionStatus,
    stream: StreamCondition,
    reconnect_attempts: u32,
    polling: bool,
    stopped: bool,
}

impl ConnectionMachine {
    pub fn new(config: LiveConfig) -> Self {
        Self {
            config,
            status: ConnectionStatus::Disconnected,
            stream: StreamCondition::Absent,
            reconnect_attempts: 0,
            polling: false,
            stopped: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn stream(&self) -> StreamCondition {
        self.stream
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn transition(&mut self, event: ConnectionEvent) -> Vec<Effect> {
        if self.stopped {
            return Vec::new();
        }

        match event {
            ConnectionEvent::Start => vec![Effect::ScheduleConnect(self.config.startup_delay)],
            ConnectionEvent::Connect => self.connect(),
            ConnectionEvent::Opened => {
                self.stream = StreamCondition::Open;
                self.reconnect_attempts = 0;
                let mut effects = self.stop_polling();
                effects.push(self.show(ConnectionStatus::Connected));
                effects
            }
            ConnectionEvent::Named(NamedEvent::Connected) => {
                vec![self.show(ConnectionStatus::Connected)]
            }
            ConnectionEvent::Named(NamedEvent::Checkin | NamedEvent::Update) => {
                vec![Effect::Refresh]
            }
            ConnectionEvent::StreamError { closed: false } => {
                self.stream = StreamCondition::Connecting;
                Vec::new()
            }
            ConnectionEvent::StreamError { closed: true } => {
                self.stream = StreamCondition::Closed;
                let mut effects = vec![Effect::CloseStream];
                if self.reconnect_attempts < self.config.max_reconnect_attempts {
                    self.reconnect_attempts += 1;
                    effects.push(self.show(ConnectionStatus::Connecting));
                    effects.push(Effect::ScheduleConnect(self.config.reconnect_delay));
                } else {
                    effects.extend(self.start_polling());
                }
                effects
            }
            ConnectionEvent::OpenFailed => {
                self.stream = StreamCondition::Closed;
                self.start_polling()
            }
            ConnectionEvent::FallbackTick => {
                if self.polling {
                    vec![Effect::Refresh]
                } else {
                    Vec::new()
                }
            }
            ConnectionEvent::VisibilityRegained => match self.stream {
                StreamCondition::Absent | StreamCondition::Closed => {
                    self.reconnect_attempts = 0;
                    self.connect()
                }
                StreamCondition::Connecting | StreamCondition::Open => Vec::new(),
            },
            ConnectionEvent::Stop => {
                let mut effects = Vec::new();
                if matches!(self.stream, StreamCondition::Connecting | StreamCondition::Open) {
                    effects.push(Effect::CloseStream);
                }
                self.stream = StreamCondition::Absent;
                effects.extend(self.stop_polling());
                effects.push(self.show(ConnectionStatus::Disconnected));
                self.stopped = true;
                effects
            }
        }
    }

    fn connect(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if matches!(self.stream, StreamCondition::Connecting | StreamCondition::Open) {
            effects.push(Effect::CloseStream);
        }
        self.stream = StreamCondition::Connecting;
        effects.push(self.show(ConnectionStatus::Connecting));
        effects.push(Effect::OpenStream {
            url: self.config.endpoint_url(),
        });
        effects
    }

    fn start_polling(&mut self) -> Vec<Effect> {
        if self.polling {
            // Timer already running; only bring the indicator back.
            return vec![self.show(ConnectionStatus::Fallback)];
        }
        self.polling = true;
        vec![
            self.show(ConnectionStatus::Fallback),
            Effect::StartFallback(self.config.fallback_interval),
        ]
    }

    fn stop_polling(&mut self) -> Vec<Effect> {
        if !self.polling {
            return Vec::new();
        }
        self.polling = false;
        vec![Effect::StopFallback]
    }

    fn show(&mut self, status: ConnectionStatus) -> Effect {
        self.status = status;
        Effect::ShowStatus(status)
    }
}
