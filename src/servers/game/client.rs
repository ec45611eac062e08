use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::GameState;
use crate::game::types::EntityId;
use crate::network::packet::{JoinAccepted, Packet};
use crate::network::sink::PacketSink;
use crate::network::{read_framed_packet, write_framed_packet};

/// Runs one client session. The first frame must be a `JoinGame`; after
/// that every frame is decoded and handed to the logic service until the
/// connection drops.
pub async fn handle_client(state: Arc<GameState>, stream: TcpStream, peer: SocketAddr) {
    let (mut reader, mut writer) = stream.into_split();
    let max_len = state.codec.max_size();

    let first = match read_framed_packet(&mut reader, max_len).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!("[game] [handshake_failed] peer={} error={}", peer, e);
            return;
        }
    };
    let join = match state.codec.decode_client(&first) {
        Ok(Packet::JoinGame(join)) => join,
        Ok(other) => {
            tracing::warn!("[game] [handshake_rejected] peer={} type={:?}", peer, other.packet_type());
            return;
        }
        Err(e) => {
            tracing::warn!("[game] [handshake_rejected] peer={} error={}", peer, e);
            return;
        }
    };
    let player = join.player_id;
    // an earlier session may still be saving the character
    if state.sink.is_connected(player) || state.logic.world.is_online(player) {
        tracing::warn!("[game] [duplicate_login] peer={} player={}", peer, player);
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    state.sink.register(player, tx);
    state.sink.send_packet(
        player,
        &Packet::JoinAccepted(JoinAccepted { player_id: player, server_time: state.logic.world.now() }),
    );

    let writer_task = tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if write_framed_packet(&mut writer, &bytes).await.is_err() {
                break;
            }
        }
    });

    let logic = Arc::clone(&state.logic);
    let name = join.name.clone();
    let placed = tokio::task::spawn_blocking(move || logic.login(player, &name)).await;
    if !matches!(placed, Ok(Some(_))) {
        tracing::warn!("[game] [login_failed] peer={} player={}", peer, player);
        disconnect(&state, player, writer_task).await;
        return;
    }
    tracing::info!("[game] [session_open] peer={} player={} name={}", peer, player, join.name);

    loop {
        let body = match read_framed_packet(&mut reader, max_len).await {
            Ok(body) => body,
            Err(_) => break,
        };
        match state.codec.decode_client(&body) {
            Ok(Packet::JoinGame(_)) => {
                tracing::warn!("[game] [packet_ignored] player={} type=JoinGame", player);
            }
            Ok(packet) => state.logic.handle_packet(player, packet),
            Err(e) => tracing::warn!("[game] [packet_dropped] player={} error={}", player, e),
        }
    }

    disconnect(&state, player, writer_task).await;
    tracing::info!("[game] [session_closed] peer={} player={}", peer, player);
}

/// Logs the player out before releasing the connection slot, so a new
/// session for the same player cannot join until the old one is saved.
async fn disconnect(state: &Arc<GameState>, player: EntityId, writer_task: tokio::task::JoinHandle<()>) {
    let logic = Arc::clone(&state.logic);
    if tokio::task::spawn_blocking(move || logic.logout(player)).await.is_err() {
        tracing::error!("[game] [logout_panicked] player={}", player);
    }
    state.sink.unregister(player);
    writer_task.abort();
}
