use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use kotipolku_server::config::CorsConfig;
use kotipolku_server::proxy::SyncTrigger;
use kotipolku_server::{api, scheduler, AppError, AppState, Settings};
use std::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

fn cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default().allow_any_origin()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::AUTHORIZATION,
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::ACCEPT,
        ])
        .max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> kotipolku_server::Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();

    let config = Settings::new()?;
    info!("Configuration loaded ({} environment)", config.environment);

    let state = AppState::new(config.clone()).await?;
    if config.database.run_migrations {
        state.db.run_migrations().await?;
        info!("Database migrations applied");
    }

    let mut jobs = scheduler::start(state.clone()).await?;
    if config.crime.enabled && config.crime.run_on_startup {
        let startup_state = state.clone();
        tokio::spawn(async move {
            scheduler::run_crime_sync(&startup_state, SyncTrigger::Startup).await;
        });
    }

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Listening on http://{}:{}", config.server.host, config.server.port);

    let data = web::Data::new(state.clone());
    let cors_config = config.cors.clone();
    let result = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors(&cors_config))
            .app_data(data.clone())
            .configure(api::configure)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await;

    info!("Server stopped, shutting down background jobs");
    if let Err(e) = jobs.shutdown().await {
        warn!("Scheduler shutdown failed: {}", e);
    }
    state.shutdown().await?;

    result.map_err(|e| {
        error!("Server error: {}", e);
        AppError::InternalError(e.to_string())
    })
}
