use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use indexer_types::{
    GatewayHelloData, GatewayIdentifyData, GatewayIdentifyProperties, GatewayOpcode,
    GatewayReceivePayload, GatewaySendPayload,
};
use tokio::sync::watch;
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};
use crate::events::GatewayEvent;

/// Fixed reconnect backoff (§4.E) — no exponential growth, no jitter.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

const NO_SEQUENCE: i64 = -1;

/// A single long-lived gateway connection (§4.E).
///
/// Deliberately does not retain `session_id` across reconnects: every
/// `run_once` identifies cold, per the "no resume" design note (§9).
pub struct GatewaySession {
    url: String,
    token: String,
    intents: u64,
}

impl GatewaySession {
    pub fn new(url: impl Into<String>, token: impl Into<String>, intents: u64) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            intents,
        }
    }

    /// Runs forever. Every disconnect — clean or not, including op 7/9 —
    /// is followed by a fixed 5s sleep and a cold re-identify (§4.E's
    /// `CLOSED` state, §9).
    pub async fn run<F>(&self, mut on_event: F)
    where
        F: FnMut(GatewayEvent) + Send,
    {
        loop {
            match self.run_once(&mut on_event).await {
                Ok(()) => info!("gateway session ended cleanly"),
                Err(e) => warn!(error = %e, "gateway session failed"),
            }
            info!(delay_secs = RECONNECT_DELAY.as_secs(), "reconnecting to gateway");
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn run_once<F>(&self, on_event: &mut F) -> Result<()>
    where
        F: FnMut(GatewayEvent) + Send,
    {
        let (stream, _) = tokio_tungstenite::connect_async(&self.url).await?;
        let (mut write, mut read) = stream.split();

        // CONNECTING -> HELLO: the first frame must be op 10.
        let hello_frame = read.next().await.ok_or(GatewayError::Closed)??;
        let hello_payload = decode_frame(&hello_frame)?.ok_or(GatewayError::Closed)?;
        let heartbeat_interval_ms = match hello_payload.op {
            GatewayOpcode::Hello => {
                let data: GatewayHelloData =
                    serde_json::from_value(hello_payload.d.unwrap_or(serde_json::Value::Null))?;
                data.heartbeat_interval
            }
            _ => return Err(GatewayError::Closed),
        };

        let last_sequence = Arc::new(AtomicI64::new(NO_SEQUENCE));

        // HELLO -> READY: send IDENTIFY while we still hold the write
        // half directly, then hand it off to the heartbeat task, which
        // becomes its sole owner for the rest of the session (§4.E).
        let identify = GatewaySendPayload {
            op: GatewayOpcode::Identify,
            d: GatewayIdentifyData {
                token: self.token.clone(),
                intents: self.intents,
                properties: GatewayIdentifyProperties {
                    os: std::env::consts::OS.to_string(),
                    browser: "indexer".to_string(),
                    device: "indexer".to_string(),
                },
            },
        };
        let identify_json = serde_json::to_string(&identify)?;
        write.send(WsMessage::Text(identify_json.into())).await?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let heartbeat_handle = tokio::spawn(run_heartbeat(
            write,
            heartbeat_interval_ms,
            last_sequence.clone(),
            stop_rx,
        ));

        let result = self
            .read_dispatch_loop(&mut read, &last_sequence, on_event)
            .await;

        let _ = stop_tx.send(true);
        let _ = heartbeat_handle.await;
        result
    }

    async fn read_dispatch_loop<F>(
        &self,
        read: &mut (impl StreamExt<Item = std::result::Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
        last_sequence: &Arc<AtomicI64>,
        on_event: &mut F,
    ) -> Result<()>
    where
        F: FnMut(GatewayEvent) + Send,
    {
        loop {
            let Some(frame) = read.next().await else {
                return Ok(());
            };
            let frame = frame?;

            if matches!(frame, WsMessage::Close(_)) {
                debug!("gateway socket closed by peer");
                return Ok(());
            }

            let Some(payload) = decode_frame(&frame)? else {
                continue;
            };

            if let Some(seq) = payload.s {
                last_sequence.store(seq as i64, Ordering::SeqCst);
            }

            match payload.op {
                GatewayOpcode::Dispatch => {
                    if payload.t.as_deref() == Some("MESSAGE_CREATE") {
                        if let Some(d) = payload.d {
                            on_event(GatewayEvent::MessageCreate(d));
                        }
                    }
                }
                GatewayOpcode::Reconnect => {
                    info!("gateway requested reconnect (op 7)");
                    return Ok(());
                }
                GatewayOpcode::InvalidSession => {
                    warn!("gateway reported invalid session (op 9)");
                    return Ok(());
                }
                GatewayOpcode::HeartbeatAck | GatewayOpcode::Hello => {}
                other => {
                    debug!(?other, "ignoring unexpected gateway opcode");
                }
            }
        }
    }
}

type WriteHalf = SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;

async fn run_heartbeat(
    mut write: WriteHalf,
    interval_ms: u64,
    last_sequence: Arc<AtomicI64>,
    mut stop_rx: watch::Receiver<bool>,
) -> Result<()> {
    // First heartbeat after a full interval, not `interval * rand()` —
    // an intentional, documented deviation from the upstream protocol
    // (§9 heartbeat jitter note).
    let mut ticker = interval(Duration::from_millis(interval_ms));
    ticker.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let seq = last_sequence.load(Ordering::SeqCst);
                let payload = GatewaySendPayload {
                    op: GatewayOpcode::Heartbeat,
                    d: if seq == NO_SEQUENCE { None } else { Some(seq as u64) },
                };
                let json = serde_json::to_string(&payload)?;
                write.send(WsMessage::Text(json.into())).await?;
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

fn decode_frame(frame: &WsMessage) -> Result<Option<GatewayReceivePayload>> {
    match frame {
        WsMessage::Text(text) => Ok(Some(serde_json::from_str(text)?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hello_frame() {
        let frame = WsMessage::Text(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#.into());
        let payload = decode_frame(&frame).unwrap().unwrap();
        assert_eq!(payload.op, GatewayOpcode::Hello);
        assert_eq!(payload.s, None);
    }

    #[test]
    fn decodes_dispatch_frame_with_sequence() {
        let frame = WsMessage::Text(
            r#"{"op":0,"d":{"id":"1"},"s":7,"t":"MESSAGE_CREATE"}"#.into(),
        );
        let payload = decode_frame(&frame).unwrap().unwrap();
        assert_eq!(payload.op, GatewayOpcode::Dispatch);
        assert_eq!(payload.s, Some(7));
        assert_eq!(payload.t.as_deref(), Some("MESSAGE_CREATE"));
    }

    #[test]
    fn non_text_frames_decode_to_none() {
        let frame = WsMessage::Ping(Vec::new().into());
        assert!(decode_frame(&frame).unwrap().is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let frame = WsMessage::Text("not json".into());
        assert!(decode_frame(&frame).is_err());
    }
}
