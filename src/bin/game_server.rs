use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Notify;
use realm::config::ServerConfig;
use realm::core::create_server_state;
use realm::database::store::YamlStore;
use realm::database::GameDatabase;
use realm::network::codec::PacketCodec;
use realm::network::sink::ChannelSink;
use realm::servers::game::GameState;
use realm::servers::logic::LogicService;
use realm::servers::world::World;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut conf_file = "conf/server.yaml".to_string();

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "--h" | "--?" | "/?" => {
                println!("Usage: game_server [--conf FILE]");
                return Ok(());
            }
            "--conf" => {
                if i + 1 < args.len() {
                    i += 1;
                    conf_file = args[i].clone();
                } else {
                    eprintln!("Error: --conf requires a FILE argument");
                    return Ok(());
                }
            }
            _ => {}
        }
        i += 1;
    }

    let config = ServerConfig::from_file(&conf_file)
        .with_context(|| format!("Cannot load config: {}", conf_file))?;

    let db = GameDatabase::load_dir(&config.data_dir)
        .with_context(|| format!("Cannot load game data: {}", config.data_dir))?;
    let store = Arc::new(YamlStore::new(&config.save_dir));
    let codec = PacketCodec::new(config.compression_level, config.max_packet_size);
    let sink = Arc::new(ChannelSink::new(codec));
    let bind = format!("{}:{}", config.game_ip, config.game_port);
    let tick = Duration::from_millis(config.logic.tick_ms);

    let world = Arc::new(World::new(config, db, sink.clone(), store));
    let logic = Arc::new(LogicService::new(world)?);
    let server = create_server_state();
    let stop = Arc::new(Notify::new());
    let term_stop = Arc::clone(&stop);
    server.set_term_func(move || {
        tracing::info!("[game] [shutdown_requested]");
        term_stop.notify_one();
    });

    let cycle_logic = Arc::clone(&logic);
    let cycle_server = Arc::clone(&server);
    let cycle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        while !cycle_server.should_shutdown() {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.notified() => break,
            }
            let logic = Arc::clone(&cycle_logic);
            let report = tokio::task::spawn_blocking(move || {
                let now = logic.world.now();
                logic.run_cycle(now)
            })
            .await;
            match report {
                Ok(report) if report.transfers > 0 || report.unloaded > 0 => {
                    tracing::debug!(
                        "[logic] [cycle] instances={} transfers={} unloaded={}",
                        report.instances,
                        report.transfers,
                        report.unloaded
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!("[logic] [cycle_panicked] error={}", e),
            }
        }
    });

    tracing::info!("[game] [started] Game Server Started");

    let state = Arc::new(GameState::new(Arc::clone(&logic), sink, codec, Arc::clone(&server)));
    tokio::select! {
        result = GameState::run(state, &bind) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("[game] [shutdown] reason=signal");
        }
    }

    server.request_shutdown();
    let _ = cycle.await;
    let saver = Arc::clone(&logic);
    let saved = tokio::task::spawn_blocking(move || saver.save_all()).await?;
    tracing::info!("[game] [stopped] saved={}", saved);
    Ok(())
}
