/// carnage-nn API server
///
/// Accounts, model training and inference over a small JSON API, served by
/// a synchronous tiny_http server. Trained models are stored as JSON files
/// under the configured data directory.
///
/// Run with:
///   cargo run --bin server --release
/// Configuration comes from `CARNAGE_CONFIG` (a JSON file) and `CARNAGE_*`
/// environment variables; `RUST_LOG` controls log output.

mod config;
mod error;
mod handlers;
mod routes;
mod state;
mod store;
mod util;

use log::info;
use std::sync::Arc;
use tiny_http::Server;

use config::ServerConfig;
use state::AppState;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::load()?;
    let addr = config.bind_addr.clone();
    let state = Arc::new(AppState::open(config)?);
    let server = Server::http(&addr)?;

    info!("listening on http://{addr}");

    // One thread per request: a training request blocks its thread for the
    // whole run and must not stall other clients.
    for request in server.incoming_requests() {
        let state = Arc::clone(&state);
        std::thread::spawn(move || routes::dispatch(request, state));
    }
    Ok(())
}
