//! Wyrmhold Engine - Main entry point.

use std::sync::Arc;

use wyrmhold_engine::infrastructure::{
    cache::TtlCache, config::EngineConfig, master_data, persistence::SqlitePlayerStore, telemetry,
};
use wyrmhold_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine is usually run from `crates/engine`).
    load_dotenv_from_repo_root();

    telemetry::init("wyrmhold_engine=debug");

    tracing::info!("Starting Wyrmhold Engine");

    let config = EngineConfig::from_env()?;

    let master = master_data::install(master_data::load(config.master_data_path.as_deref())?)?;
    tracing::info!(
        missions = master.missions().count(),
        "Master data installed"
    );

    tracing::info!(path = %config.player_db, "Opening player database");
    let players = Arc::new(SqlitePlayerStore::new(&config.player_db).await?);

    let sessions = Arc::new(TtlCache::<String, Vec<u8>>::new(config.dungeon_expiry));
    let cleanup = sessions.spawn_cleanup(config.session_cleanup_interval);

    // Refuses to start when a reward kind has no handler.
    let app = App::new(&config, master, players, sessions)?;
    tracing::info!(
        daily_reset_hour = config.daily_reset.hour_utc(),
        dungeon_expiry_secs = config.dungeon_expiry.as_secs(),
        kinds = app.use_cases.rewards.kinds().len(),
        "Wyrmhold Engine ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    cleanup.abort();

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
