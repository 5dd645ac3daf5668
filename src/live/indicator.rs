use log::info;
use thiserror::Error;

use super::state::ConnectionStatus;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("status indicator is not available yet")]
pub struct IndicatorUnavailable;

/// Where the connection status is shown to the user.
///
/// An indicator may not exist yet when the client starts (the page is still
/// rendering); returning [`IndicatorUnavailable`] makes the client try again
/// shortly with whatever the status is by then.
pub trait StatusIndicator: Send + Sync + 'static {
    fn show(&self, status: ConnectionStatus) -> Result<(), IndicatorUnavailable>;
}

/// Writes every status change to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn show(&self, status: ConnectionStatus) -> Result<(), IndicatorUnavailable> {
        info!(
            "Live status: {} [{}] ({})",
            status.label(),
            status.color(),
            status.as_str()
        );
        Ok(())
    }
}
