//! TCP front-end: accepts game clients and bridges them to the logic service.

pub mod client;

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;

use super::logic::LogicService;
use crate::core::SharedServerState;
use crate::network::codec::PacketCodec;
use crate::network::sink::ChannelSink;

pub struct GameState {
    pub logic: Arc<LogicService>,
    /// Same sink the world sends through; sessions register their channels here.
    pub sink: Arc<ChannelSink>,
    pub codec: PacketCodec,
    pub server: SharedServerState,
}

impl GameState {
    pub fn new(logic: Arc<LogicService>, sink: Arc<ChannelSink>, codec: PacketCodec, server: SharedServerState) -> Self {
        Self { logic, sink, codec, server }
    }

    pub async fn run(state: Arc<Self>, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        tracing::info!("[game] [ready] addr={}", bind_addr);
        Self::serve(state, listener).await
    }

    /// Accept loop on an already bound listener.
    pub async fn serve(state: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            if state.server.should_shutdown() {
                tracing::info!("[game] [refused] peer={} reason=shutting_down", peer);
                continue;
            }
            let s = Arc::clone(&state);
            tokio::spawn(async move {
                client::handle_client(s, stream, peer).await;
            });
        }
    }
}
