use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info, warn};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use vigil::api::{self, AppState};
use vigil::config::Config;
use vigil::persistence::{EventStore, SqliteStore};

/// HTTP server entry point for the vigil service
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load configuration
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let mut config = if config_path.exists() {
        match Config::from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config {:?}: {}", config_path, e);
                std::process::exit(1);
            }
        }
    } else {
        warn!("Config file not found, using defaults");
        Config::default()
    };

    apply_env_overrides(&mut config);

    // Open the store and bootstrap tables before accepting requests
    let store = match SqliteStore::open(&config.database.path) {
        Ok(store) => {
            info!("Opened database at {:?}", config.database.path);
            store
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn EventStore> = Arc::new(store);
    let state = AppState::new(store);
    let allowed_origins = config.cors.allowed_origins.clone();

    info!(
        "Starting vigil server on {}:{}",
        config.server.host, config.server.port
    );
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(build_cors(&allowed_origins))
            .app_data(web::Data::new(state.clone()))
            .app_data(api::json_config())
            .app_data(api::query_config())
            .configure(api::configure)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}

/// Environment variables take precedence over the config file
fn apply_env_overrides(config: &mut Config) {
    if let Ok(host) = env::var("HOST") {
        config.server.host = host;
    }
    if let Ok(port) = env::var("PORT") {
        match port.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!("Ignoring non-numeric PORT value: {}", port),
        }
    }
    if let Ok(path) = env::var("DATABASE_PATH") {
        config.database.path = PathBuf::from(path);
    }
}

fn build_cors(allowed_origins: &[String]) -> Cors {
    if allowed_origins.iter().any(|origin| origin == "*") {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600)
    } else {
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);
        for origin in allowed_origins {
            cors = cors.allowed_origin(origin);
        }
        cors
    }
}
