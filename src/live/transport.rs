use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{
    header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE},
    Client, StatusCode, Url,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::sse::{SseEvent, SseParser};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const EVENT_BUFFER: usize = 64;
const LAST_EVENT_ID: &str = "Last-Event-ID";

/// What a stream reports back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(SseEvent),
    /// `closed` means the stream gave up; otherwise it is reconnecting itself.
    Error { closed: bool },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid stream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported stream URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("unexpected content type '{0}' (expected text/event-stream)")]
    ContentType(String),

    #[error("Reqwest error: {0}")]
    Request(Box<reqwest::Error>),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        TransportError::Request(Box::new(error))
    }
}

impl TransportError {
    /// Fatal errors close the stream for good; the rest are retried.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Request(_))
    }
}

/// Opens event streams. Construction may fail synchronously; everything
/// after that is reported through the returned channel.
pub trait EventTransport: Send + Sync + 'static {
    fn open(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;
}

/// `text/event-stream` over HTTP, behaving like a browser `EventSource`:
/// network drops are retried internally after the reconnection time, while a
/// bad status or content type closes the stream.
#[derive(Clone)]
pub struct HttpEventTransport {
    client: Client,
    default_retry: Duration,
}

impl HttpEventTransport {
    pub fn new(client: Client, default_retry: Duration) -> Self {
        Self {
            client,
            default_retry,
        }
    }
}

impl EventTransport for HttpEventTransport {
    fn open(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        let url = Url::parse(url).map_err(|err| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(stream_loop(
            self.client.clone(),
            url,
            self.default_retry,
            tx,
            cancel,
        ));
        Ok(rx)
    }
}

async fn stream_loop(
    client: Client,
    url: Url,
    mut retry: Duration,
    tx: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
) {
    let mut last_event_id = String::new();

    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return,
            outcome = read_stream(&client, &url, &mut retry, &mut last_event_id, &tx) => outcome,
        };

        match outcome {
            Ok(()) => log_info!("Event stream {} ended, reconnecting in {:?}", url, retry),
            Err(err) if err.is_fatal() => {
                log_warn!("Event stream {} failed: {}", url, err);
                let _ = tx.send(TransportEvent::Error { closed: true }).await;
                return;
            }
            Err(err) => log_warn!("Event stream {} dropped: {}; reconnecting in {:?}", url, err, retry),
        }

        if tx.send(TransportEvent::Error { closed: false }).await.is_err() {
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(retry) => {}
        }
    }
}

async fn read_stream(
    client: &Client,
    url: &Url,
    retry: &mut Duration,
    last_event_id: &mut String,
    tx: &mpsc::Sender<TransportEvent>,
) -> Result<(), TransportError> {
    let mut request = client
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if !last_event_id.is_empty() {
        request = request.header(LAST_EVENT_ID, last_event_id.as_str());
    }

    let response = request.send().await?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(TransportError::Status {
            status,
            url: url.to_string(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !content_type.starts_with("text/event-stream") {
        return Err(TransportError::ContentType(content_type));
    }

    if tx.send(TransportEvent::Open).await.is_err() {
        return Ok(());
    }

    let mut parser = SseParser::resuming(last_event_id);
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let events = parser.feed(&chunk);

        if let Some(requested) = parser.retry() {
            *retry = requested;
        }
        *last_event_id = parser.last_event_id().to_string();

        for event in events {
            log_debug!("Stream event '{}' ({} bytes)", event.event, event.data.len());
            if tx.send(TransportEvent::Message(event)).await.is_err() {
                return Ok(());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        time::timeout,
    };

    /// Serves each canned response once, in order, then stops accepting.
    async fn serve(responses: Vec<&'static str>) -> String {
        serve_recording(responses).await.0
    }

    /// Like [`serve`], also handing back each raw request head.
    async fn serve_recording(
        responses: Vec<&'static str>,
    ) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (requests_tx, requests) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 2048];
                let read = socket.read(&mut buf).await.unwrap_or(0);
                let _ = requests_tx.send(String::from_utf8_lossy(&buf[..read]).to_lowercase());
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        (format!("http://{addr}/api/events/stream"), requests)
    }

    async fn next(rx: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for stream event")
            .expect("stream channel closed")
    }

    fn transport() -> HttpEventTransport {
        HttpEventTransport::new(Client::new(), Duration::from_millis(50))
    }

    const EVENTS: &str = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/event-stream\r\n\
        Connection: close\r\n\r\n\
        retry: 20\n\
        event: connected\ndata: hello\n\n\
        : ping\n\n\
        event: checkin\nid: 3\ndata: {\"name\":\"Viktor\"}\n\n";

    #[tokio::test]
    async fn delivers_open_and_events_then_reconnects() {
        let url = serve(vec![EVENTS, EVENTS]).await;
        let cancel = CancellationToken::new();
        let mut rx = transport().open(&url, cancel.clone()).unwrap();

        assert_eq!(next(&mut rx).await, TransportEvent::Open);
        match next(&mut rx).await {
            TransportEvent::Message(event) => {
                assert_eq!(event.event, "connected");
                assert_eq!(event.data, "hello");
            }
            other => panic!("unexpected {other:?}"),
        }
        match next(&mut rx).await {
            TransportEvent::Message(event) => {
                assert_eq!(event.event, "checkin");
                assert_eq!(event.id.as_deref(), Some("3"));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(next(&mut rx).await, TransportEvent::Error { closed: false });
        assert_eq!(next(&mut rx).await, TransportEvent::Open);
        cancel.cancel();
    }

    #[tokio::test]
    async fn reconnect_resends_last_event_id_until_cleared() {
        let (url, mut requests) = serve_recording(vec![
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
             id: 3\ndata: first\n\n",
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
             id\ndata: second\n\n",
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
        ])
        .await;
        let cancel = CancellationToken::new();
        let mut rx = transport().open(&url, cancel.clone()).unwrap();

        for _ in 0..2 {
            assert_eq!(next(&mut rx).await, TransportEvent::Open);
            assert!(matches!(next(&mut rx).await, TransportEvent::Message(_)));
            assert_eq!(next(&mut rx).await, TransportEvent::Error { closed: false });
        }
        assert_eq!(next(&mut rx).await, TransportEvent::Open);
        cancel.cancel();

        let first = requests.recv().await.unwrap();
        let second = requests.recv().await.unwrap();
        let third = requests.recv().await.unwrap();
        assert!(first.starts_with("get /api/events/stream "));
        assert!(!first.contains("last-event-id"));
        assert!(second.contains("last-event-id: 3\r\n"));
        assert!(!third.contains("last-event-id"));
    }

    #[tokio::test]
    async fn error_status_closes_stream() {
        let url = serve(vec![
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ])
        .await;
        let mut rx = transport().open(&url, CancellationToken::new()).unwrap();

        assert_eq!(next(&mut rx).await, TransportEvent::Error { closed: true });
        assert!(timeout(Duration::from_secs(5), rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_content_type_closes_stream() {
        let url = serve(vec![
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 2\r\nConnection: close\r\n\r\nhi",
        ])
        .await;
        let mut rx = transport().open(&url, CancellationToken::new()).unwrap();

        assert_eq!(next(&mut rx).await, TransportEvent::Error { closed: true });
    }

    #[tokio::test]
    async fn relative_or_odd_urls_fail_to_open() {
        let err = transport()
            .open("/api/events/stream", CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));

        let err = transport()
            .open("ftp://example.se/stream", CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedScheme(_)));
    }

    #[test]
    fn only_request_errors_are_retried() {
        assert!(TransportError::ContentType("text/html".into()).is_fatal());
        assert!(TransportError::Status {
            status: StatusCode::NOT_FOUND,
            url: "http://x".into()
        }
        .is_fatal());
    }
}
