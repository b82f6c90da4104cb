// WebSocket fan-out of auction snapshots to projector processes.
//
// The operator console runs the server half: every projector that connects
// on the channel path gets its own subscription and receives each snapshot
// as a JSON text frame. Projectors use the client half to turn those frames
// back into `BroadcastMessage`s.

use std::net::SocketAddr;

use futures_util::stream::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastMessage, Broadcaster, Subscription};

/// Well-known path projectors connect to.
pub const CHANNEL_PATH: &str = "/auction_sync";

// ---------------------------------------------------------------------------
// Server half
// ---------------------------------------------------------------------------

/// Bind `host:port` and serve projectors until the task is cancelled.
pub async fn run(host: &str, port: u16, broadcaster: Broadcaster) -> anyhow::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    serve(listener, broadcaster).await
}

/// Accept projector connections on an already bound listener. Each
/// connection is handled on its own task so a stalled projector never holds
/// up the others.
pub async fn serve(listener: TcpListener, broadcaster: Broadcaster) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("Broadcast hub listening on ws://{local_addr}{CHANNEL_PATH}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let subscription = broadcaster.subscribe();
        tokio::spawn(async move {
            let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, check_path).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {addr}: {e}");
                    return;
                }
            };
            info!("Projector connected from {addr}");
            serve_projector(ws_stream, subscription, addr).await;
            info!("Projector {addr} disconnected");
        });
    }
}

fn check_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == CHANNEL_PATH {
        return Ok(response);
    }
    let mut rejection = ErrorResponse::new(Some(format!(
        "unknown channel {}, expected {CHANNEL_PATH}",
        request.uri().path()
    )));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}

async fn serve_projector<S>(ws: WebSocketStream<S>, mut subscription: Subscription, addr: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            update = subscription.next() => {
                let Some(message) = update else { break };
                if let Err(e) = send_message(&mut write, &message).await {
                    warn!("Failed to send snapshot to {addr}: {e}");
                    break;
                }
            }
            incoming = read.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!("WebSocket error from {addr}: {e}");
                    break;
                }
                // Projectors are read-only; anything else they send is ignored.
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Encode one message as a JSON text frame and send it.
pub async fn send_message<Si>(sink: &mut Si, message: &BroadcastMessage) -> anyhow::Result<()>
where
    Si: Sink<Message> + Unpin,
    Si::Error: std::error::Error + Send + Sync + 'static,
{
    let json = serde_json::to_string(message)?;
    sink.send(Message::text(json)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Client half
// ---------------------------------------------------------------------------

/// Connect to a hub and forward decoded snapshots through `tx` until the
/// connection closes or the receiver is dropped.
pub async fn subscribe_remote(url: &str, tx: mpsc::Sender<BroadcastMessage>) -> anyhow::Result<()> {
    let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
    info!("Connected to broadcast hub at {url}");
    let (_write, read) = ws_stream.split();
    // A closed receiver just means the view went away.
    let _ = process_message_stream(read, &tx).await;
    Ok(())
}

/// Decode text frames from any [`Stream`] of WebSocket messages and forward
/// them through `tx`. Frames that are not valid snapshots are skipped.
/// Returns `Err(())` if the channel is closed.
pub async fn process_message_stream<St>(
    mut stream: St,
    tx: &mpsc::Sender<BroadcastMessage>,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<BroadcastMessage>(&text) {
                Ok(message) => {
                    if tx.send(message).await.is_err() {
                        return Err(());
                    }
                }
                Err(e) => debug!("Ignoring unrecognised broadcast frame: {e}"),
            },
            Ok(Message::Close(_)) => {
                info!("Broadcast hub sent close frame");
                break;
            }
            Err(e) => {
                warn!("Broadcast hub connection error: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}
