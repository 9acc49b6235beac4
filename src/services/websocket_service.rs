use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::GuessOutboundMessage,
    services::guess_protocol::{GuessConnection, Reaction},
    state::{SharedState, session::SessionId},
};

/// The writer task is gone; the connection must be torn down.
#[derive(Debug, Error)]
#[error("connection closed")]
struct ConnectionClosed;

/// Handle the full lifecycle of a player's guessing connection.
pub async fn handle_socket(state: SharedState, session_id: SessionId, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut connection = match GuessConnection::open(state.sessions(), session_id, state.now()) {
        Ok(connection) => connection,
        Err(refusal) => {
            info!(session_id = %session_id, reply = ?refusal, "refusing guess connection");
            let _ = send_message_to_websocket(&outbound_tx, &refusal);
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    info!(session_id = %session_id, "player connected");

    while let Some(message) = receiver.next().await {
        let reaction = match message {
            Ok(Message::Text(text)) => {
                connection.on_text(state.sessions(), text.as_str(), state.now())
            }
            Ok(Message::Binary(_)) => connection.on_binary(state.sessions(), state.now()),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(frame)) => {
                info!(session_id = %session_id, "player closed the connection");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "websocket error");
                break;
            }
        };

        match deliver(&state, &outbound_tx, reaction).await {
            Ok(true) => {
                let _ = outbound_tx.send(Message::Close(None));
                break;
            }
            Ok(false) => {}
            Err(ConnectionClosed) => {
                info!(session_id = %session_id, "writer closed, terminating");
                break;
            }
        }
    }

    release_session(&state, &connection);
    finalize(writer_task, outbound_tx).await;
}

/// Hand the session back to the store once its owning connection has ended.
fn release_session(state: &SharedState, connection: &GuessConnection) {
    let session_id = connection.session_id();
    let phase = connection.phase();
    if state.sessions().release(&session_id, state.now()).is_some() {
        info!(session_id = %session_id, ?phase, "player disconnected; session released");
    }
}

/// Send the replies of a reaction, then the song reveal if any. Returns whether to close.
async fn deliver(
    state: &SharedState,
    tx: &mpsc::UnboundedSender<Message>,
    reaction: Reaction,
) -> Result<bool, ConnectionClosed> {
    for reply in &reaction.replies {
        send_message_to_websocket(tx, reply)?;
    }

    if let Some(song_id) = reaction.reveal_song {
        let reveal = song_reveal(state, song_id).await;
        send_message_to_websocket(tx, &reveal)?;
    }

    Ok(reaction.close)
}

/// Look up the finished round's song; failures become an error payload.
async fn song_reveal(state: &SharedState, song_id: Uuid) -> GuessOutboundMessage {
    let storage = match state.require_storage().await {
        Ok(storage) => storage,
        Err(err) => {
            warn!(song_id = %song_id, error = %err, "cannot reveal song");
            return GuessOutboundMessage::error("song details are unavailable");
        }
    };

    match storage.content.song_metadata(song_id).await {
        Ok(Some(metadata)) => GuessOutboundMessage::Song(metadata.into()),
        Ok(None) => {
            warn!(song_id = %song_id, "song of a finished round is missing from the catalog");
            GuessOutboundMessage::error("song details are unavailable")
        }
        Err(err) => {
            warn!(song_id = %song_id, error = %err, "failed to load song metadata");
            GuessOutboundMessage::error("song details are unavailable")
        }
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// A serialization failure is logged and swallowed; a closed writer is reported.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
