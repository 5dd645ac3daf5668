use log::{info, warn};
use reqwest::{Client, Url};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Triggered,
    /// Nothing to activate; the refresh was skipped.
    Missing,
}

/// The dashboard's own refresh operation. The client only pulls the trigger;
/// fetching and re-rendering data is up to the implementation.
pub trait RefreshAction: Send + Sync + 'static {
    fn trigger(&self) -> RefreshOutcome;
}

/// Refreshes by fetching a dashboard URL in the background.
#[derive(Clone)]
pub struct HttpRefresh {
    client: Client,
    target: Option<Url>,
}

impl HttpRefresh {
    /// An unparsable or absent URL leaves the action without a target.
    pub fn new(client: Client, target: Option<&str>) -> Self {
        let target = target.and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!("Ignoring refresh URL '{raw}': {err}");
                None
            }
        });
        Self { client, target }
    }

    pub fn target(&self) -> Option<&Url> {
        self.target.as_ref()
    }
}

impl RefreshAction for HttpRefresh {
    fn trigger(&self) -> RefreshOutcome {
        let Some(url) = self.target.clone() else {
            return RefreshOutcome::Missing;
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            match client.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    let bytes = response.bytes().await.map(|b| b.len()).unwrap_or(0);
                    info!("Dashboard refreshed from {url} ({bytes} bytes)");
                }
                Ok(response) => warn!("Dashboard refresh got HTTP {} from {url}", response.status()),
                Err(err) => warn!("Dashboard refresh failed: {err}"),
            }
        });

        RefreshOutcome::Triggered
    }
}
