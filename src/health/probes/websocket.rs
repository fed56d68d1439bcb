//! WebSocket health probe: dial, optionally send a message, optionally read
//! one frame and substring-match, then close with a normal-closure code on
//! every exit path.

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::health::ssrf;
use crate::health::types::{ProbeOutcome, WebSocketParams};

pub async fn probe(params: &WebSocketParams, _timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();

    let url = if params.url.contains("://") {
        params.url.clone()
    } else {
        format!("ws://{}", params.url)
    };

    let parsed = match url::Url::parse(&url) {
        Ok(u) => u,
        Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("invalid url: {e}")),
    };
    if let Some(host) = parsed.host_str() {
        if let Err(e) = ssrf::check_host(host) {
            return ProbeOutcome::failure(elapsed_ms(start), e.to_string());
        }
    }

    let (mut stream, _response) = match tokio_tungstenite::connect_async(url).await {
        Ok(pair) => pair,
        Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("dial failed: {e}")),
    };

    if let Some(message) = &params.message {
        if let Err(e) = stream.send(Message::Text(message.clone().into())).await {
            let _ = close_normally(&mut stream).await;
            return ProbeOutcome::failure(elapsed_ms(start), format!("send failed: {e}"));
        }
    }

    if let Some(expected) = &params.expected_response_contains {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let _ = close_normally(&mut stream).await;
                if !text.contains(expected.as_str()) {
                    return ProbeOutcome::failure(
                        elapsed_ms(start),
                        format!("response does not contain '{expected}'"),
                    );
                }
            }
            Some(Ok(other)) => {
                let _ = close_normally(&mut stream).await;
                return ProbeOutcome::failure(
                    elapsed_ms(start),
                    format!("unexpected frame type: {other:?}"),
                );
            }
            Some(Err(e)) => {
                let _ = close_normally(&mut stream).await;
                return ProbeOutcome::failure(elapsed_ms(start), format!("read failed: {e}"));
            }
            None => {
                let _ = close_normally(&mut stream).await;
                return ProbeOutcome::failure(elapsed_ms(start), "connection closed before response");
            }
        }
    } else {
        let _ = close_normally(&mut stream).await;
    }

    ProbeOutcome::success(elapsed_ms(start))
}

async fn close_normally(
    stream: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    stream
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "probe complete".into(),
        }))
        .await
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dial_failure_reports_down() {
        let params = WebSocketParams {
            url: "127.0.0.1:1".to_string(),
            message: None,
            expected_response_contains: None,
        };
        let outcome = probe(&params, Duration::from_secs(1)).await;
        assert!(!outcome.ok);
    }

    #[tokio::test]
    async fn auto_prefixes_missing_scheme() {
        // No scheme, bad port -> dial failure, but must not panic on URL parse.
        let params = WebSocketParams {
            url: "localhost:1".to_string(),
            message: None,
            expected_response_contains: None,
        };
        let outcome = probe(&params, Duration::from_secs(1)).await;
        assert!(!outcome.ok);
    }
}
