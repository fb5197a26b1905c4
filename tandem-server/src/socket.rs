use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures_util::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use log::{debug, info, warn};
use tandem_relay::{DeliveryError, Frame, Outbox, Relay};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::{interval_at, timeout, Instant, Interval},
};

use crate::ServerConfig;

/// How long the writer gets to flush its close frame before it is aborted.
const WRITER_GRACE: Duration = Duration::from_secs(2);

type Sink = SplitSink<WebSocket, Message>;

/// The [Outbox] of a WebSocket connection, feeding its writer task.
struct SocketOutbox {
    sender: mpsc::Sender<Frame>,
}

enum Control {
    Ping,
    Close(CloseFrame<'static>),
}

impl Outbox for SocketOutbox {
    fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    fn deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.sender.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(relay): State<Arc<Relay>>,
    State(config): State<Arc<ServerConfig>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, addr, relay, config))
}

async fn run_connection(
    socket: WebSocket,
    addr: SocketAddr,
    relay: Arc<Relay>,
    config: Arc<ServerConfig>,
) {
    let (sink, mut stream) = socket.split();
    let (frame_tx, frame_rx) = mpsc::channel(config.outbox_capacity);
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let mut writer = tokio::spawn(write_frames(sink, frame_rx, control_rx));

    let handle = relay.connect(Arc::new(SocketOutbox { sender: frame_tx }));
    let id = handle.id();

    info!("Connection {} opened from {}", id, addr);

    let mut heartbeat = config
        .ping_interval
        .map(|period| interval_at(Instant::now() + period, period));
    let mut last_seen = Instant::now();

    let close = loop {
        tokio::select! {
            incoming = stream.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(err)) => {
                        debug!("Connection {} errored: {}", id, err);
                        break None;
                    }
                    None => break None,
                };

                last_seen = Instant::now();

                match message {
                    Message::Text(text) => {
                        if let Err(err) = handle.receive(&text) {
                            if err.is_fatal() {
                                break Some(CloseFrame {
                                    code: close_code::ERROR,
                                    reason: "internal error".into(),
                                });
                            }
                        }
                    }
                    Message::Binary(_) => {
                        warn!("Dropped binary frame from {}, only text is supported", id)
                    }
                    Message::Close(_) => break None,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            _ = tick(&mut heartbeat) => {
                if last_seen.elapsed() >= config.idle_timeout {
                    info!("Connection {} has been idle for too long", id);

                    break Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "idle timeout".into(),
                    });
                }

                if control_tx.send(Control::Ping).is_err() {
                    break None;
                }
            }
        }
    };

    // Leave the room before the socket goes away, so nobody is sent to a dead peer
    drop(handle);

    let frame = close.unwrap_or(CloseFrame {
        code: close_code::NORMAL,
        reason: "".into(),
    });
    control_tx.send(Control::Close(frame)).ok();

    if timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }

    info!("Connection {} from {} closed", id, addr);
}

/// Writes queued frames to the socket until it closes.
async fn write_frames(
    mut sink: Sink,
    mut frames: mpsc::Receiver<Frame>,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    loop {
        let message = tokio::select! {
            biased;

            control = control.recv() => match control {
                Some(Control::Ping) => Message::Ping(Vec::new()),
                Some(Control::Close(frame)) => {
                    sink.send(Message::Close(Some(frame))).await.ok();
                    break;
                }
                None => break,
            },
            frame = frames.recv() => match frame {
                Some(frame) => Message::Text(frame.to_string()),
                None => break,
            },
        };

        if sink.send(message).await.is_err() {
            break;
        }
    }

    frames.close();
    sink.close().await.ok();
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
