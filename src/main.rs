mod config;
mod error;
mod routes;
mod services;
mod session;
mod settings;
mod state;
mod sync_bridge;

use settings::HubSettings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::HubConfig::from_env()?;
    let settings = match &config.settings_path {
        Some(path) => {
            let settings = HubSettings::load(path)?;
            tracing::info!(path = %path.display(), "hub settings loaded");
            settings
        }
        None => {
            tracing::warn!("HUB_SETTINGS not set, running with default devices");
            HubSettings::default()
        }
    };

    let simulation = services::Simulation::from_settings(&settings);
    let _ticker = services::spawn_simulation_ticker(simulation.clone(), config.simulation_tick);

    let port = config.port;
    let state = state::AppState::new(simulation.collaborators(), config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "hubsocket listening");
    axum::serve(listener, app).await?;
    Ok(())
}
