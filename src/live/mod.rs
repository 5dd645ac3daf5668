//! Live dashboard updates over server-sent events, with bounded reconnects
//! and a polling fallback.

pub mod config;
pub mod controller;
pub mod indicator;
pub mod refresh;
pub mod sse;
pub mod state;
pub mod transport;

pub use config::LiveConfig;
pub use controller::{ConnectionSnapshot, LiveUpdateClient};
pub use indicator::{IndicatorUnavailable, LogIndicator, StatusIndicator};
pub use refresh::{HttpRefresh, RefreshAction, RefreshOutcome};
pub use state::{ConnectionEvent, ConnectionMachine, ConnectionStatus, Effect};
pub use transport::{EventTransport, HttpEventTransport, TransportError, TransportEvent};
