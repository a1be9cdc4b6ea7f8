// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport using tokio-tungstenite.
//!
//! Each opened channel runs its own task. Outbound requests are wrapped in
//! data envelopes; inbound envelopes are unwrapped and reported through the
//! [`EventSink`]. Messages larger than [`MAX_FRAME_SIZE`] travel as a frame
//! count followed by that many text frames, in both directions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tw_core::{Control, Envelope, Request, PROTOCOL_VERSION};

use crate::transport::{ConnectionId, EventSink, OpenRequest, RealtimeChannel, Transport, TransportEvent};

/// Largest text frame sent to the server, in bytes.
pub const MAX_FRAME_SIZE: usize = 16384;

/// Idle time after which a keepalive frame is sent.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(45);

/// Error type for a single socket's lifetime.
#[derive(Debug, thiserror::Error)]
pub enum WebSocketError {
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;

/// Opens WebSocket channels to the endpoint's host, or to the host the
/// server last redirected to.
#[derive(Debug, Default)]
pub struct WebSocketTransport {
    redirect_host: Arc<Mutex<Option<String>>>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, mut request: OpenRequest, sink: EventSink) -> Box<dyn RealtimeChannel> {
        if let Some(host) = self
            .redirect_host
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            request.endpoint.host = host;
        }
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let id = request.id;

        tokio::spawn(run_socket(
            request,
            sink,
            outbound_rx,
            cancel.clone(),
            Arc::clone(&self.redirect_host),
        ));

        Box::new(WebSocketChannel {
            id,
            outbound: outbound_tx,
            cancel,
        })
    }
}

struct WebSocketChannel {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl RealtimeChannel for WebSocketChannel {
    fn send_request(&mut self, request: &Request) {
        let message = match serde_json::to_value(request) {
            Ok(message) => message,
            Err(e) => {
                warn!(attempt = %self.id, "failed to serialize request: {}", e);
                return;
            }
        };
        if self.outbound.send(Envelope::Data(message).to_json()).is_err() {
            debug!(attempt = %self.id, "request dropped: socket closed");
        }
    }

    fn close(&mut self) {
        self.cancel.cancel();
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Runs one socket to completion, then reports the disconnect.
async fn run_socket(
    request: OpenRequest,
    sink: EventSink,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    redirect_host: Arc<Mutex<Option<String>>>,
) {
    let id = request.id;
    match serve(request, &sink, &mut outbound, &cancel, &redirect_host).await {
        Ok(()) => debug!(attempt = %id, "websocket closed"),
        Err(e) => debug!(attempt = %id, "websocket ended: {}", e),
    }
    sink.send(TransportEvent::Disconnected);
}

async fn serve(
    request: OpenRequest,
    sink: &EventSink,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
    redirect_host: &Mutex<Option<String>>,
) -> Result<(), WebSocketError> {
    let url = request
        .endpoint
        .connection_url(request.last_session_id.as_deref())?;
    debug!(attempt = %request.id, %url, "websocket connecting");

    let (ws, _) = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        result = tokio_tungstenite::connect_async(url.as_str()) => {
            result.map_err(|e| WebSocketError::ConnectionFailed(e.to_string()))?
        }
    };
    let (mut writer, mut reader) = ws.split();
    let mut frames = FrameAssembler::default();
    let mut keepalive = tokio::time::interval_at(
        tokio::time::Instant::now() + KEEPALIVE_INTERVAL,
        KEEPALIVE_INTERVAL,
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = writer.close().await;
                return Ok(());
            }

            Some(text) = outbound.recv() => {
                send_message(&mut writer, &text).await?;
                keepalive.reset();
            }

            _ = keepalive.tick() => {
                send_frame(&mut writer, "0").await?;
            }

            message = reader.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    keepalive.reset();
                    let Some(full) = frames.push(text.as_str()) else {
                        continue;
                    };
                    if !handle_envelope(&full, sink, &mut writer, redirect_host).await? {
                        let _ = writer.close().await;
                        return Ok(());
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(WebSocketError::ReceiveFailed(e.to_string())),
            },
        }
    }
}

/// Applies one complete inbound envelope. Returns false when the socket
/// should be closed.
async fn handle_envelope(
    text: &str,
    sink: &EventSink,
    writer: &mut WsSink,
    redirect_host: &Mutex<Option<String>>,
) -> Result<bool, WebSocketError> {
    let envelope = match Envelope::from_json(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(attempt = %sink.id(), "dropping malformed frame: {}", e);
            return Ok(true);
        }
    };
    match envelope {
        Envelope::Data(message) => {
            sink.send(TransportEvent::Message(message));
        }
        Envelope::Control(Control::Hello(hello)) => {
            if hello.version != PROTOCOL_VERSION {
                warn!("protocol version mismatch detected");
            }
            sink.send(TransportEvent::Ready {
                timestamp: hello.timestamp,
                session_id: hello.session_id,
            });
        }
        Envelope::Control(Control::Shutdown(reason)) => {
            sink.send(TransportEvent::Killed(reason));
            return Ok(false);
        }
        Envelope::Control(Control::Reset(host)) => {
            debug!(attempt = %sink.id(), %host, "server requested reset");
            *redirect_host.lock().unwrap_or_else(|e| e.into_inner()) = Some(host);
            return Ok(false);
        }
        Envelope::Control(Control::Error(message)) => {
            warn!(attempt = %sink.id(), "server error: {}", message);
        }
        Envelope::Control(Control::Ping) => {
            send_message(writer, &Envelope::Control(Control::Pong).to_json()).await?;
        }
        Envelope::Control(Control::Pong | Control::EndTransmission) => {}
    }
    Ok(true)
}

async fn send_message(writer: &mut WsSink, text: &str) -> Result<(), WebSocketError> {
    let frames = split_frames(text, MAX_FRAME_SIZE);
    if frames.len() > 1 {
        send_frame(writer, &frames.len().to_string()).await?;
    }
    for frame in frames {
        send_frame(writer, frame).await?;
    }
    Ok(())
}

async fn send_frame(writer: &mut WsSink, text: &str) -> Result<(), WebSocketError> {
    writer
        .send(Message::Text(text.to_string().into()))
        .await
        .map_err(|e| WebSocketError::SendFailed(e.to_string()))
}

/// Splits `text` into pieces of at most `max` bytes on char boundaries.
fn split_frames(text: &str, max: usize) -> Vec<&str> {
    let mut frames = Vec::new();
    let mut rest = text;
    while rest.len() > max {
        let mut end = max;
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (head, tail) = rest.split_at(end);
        frames.push(head);
        rest = tail;
    }
    frames.push(rest);
    frames
}

/// Reassembles messages the server split across several frames.
#[derive(Debug, Default)]
struct FrameAssembler {
    expected: usize,
    buffer: Vec<String>,
}

impl FrameAssembler {
    /// Feeds one frame; returns a message once it is complete.
    fn push(&mut self, frame: &str) -> Option<String> {
        if self.expected == 0 {
            match parse_frame_count(frame) {
                Some(0) => return None,
                Some(count) => {
                    self.expected = count;
                    return None;
                }
                None => return Some(frame.to_string()),
            }
        }
        self.buffer.push(frame.to_string());
        if self.buffer.len() < self.expected {
            return None;
        }
        self.expected = 0;
        Some(self.buffer.drain(..).collect())
    }
}

/// A frame count is a short, purely numeric frame.
fn parse_frame_count(frame: &str) -> Option<usize> {
    if frame.len() > 6 {
        return None;
    }
    frame.parse().ok()
}

#[cfg(test)]
#[path = "websocket_tests.rs"]
mod tests;
