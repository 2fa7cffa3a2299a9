use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
};
use dotenv::dotenv;
use eyre::WrapErr;
use mimalloc::MiMalloc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use config::{Env, ServerConfig};
use poetry::{
    Poetry,
    repository::{MemoryStore, PgStore},
};

mod config;
mod error;
mod identity;
mod json;
mod poetry;
mod schema;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Clone)]
pub struct App {
    pub poetry: Poetry,
    pub config: Arc<ServerConfig>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    let (config, warnings) = ServerConfig::new_from_env().map_err(|e| eyre::eyre!(e))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("poetry_api=debug,tower_http=info"));
    if config.env == Env::Production {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    for warning in warnings {
        tracing::warn!("{warning}");
    }

    let poetry = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections)
                .wrap_err("Could not build the database pool")?;
            Poetry::new(Arc::new(store), config.like_toggle_max_attempts)
        }
        None => Poetry::new(
            Arc::new(MemoryStore::new()),
            config.like_toggle_max_attempts,
        ),
    };

    let cors = cors_layer(&config.cors_allowed_origins)?;
    let listen_addr = config.listen_addr;

    let app = Router::new()
        .merge(poetry::routes::route())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(App {
            poetry,
            config: Arc::new(config),
        });

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .wrap_err_with(|| format!("Could not bind to {listen_addr}"))?;
    tracing::info!("Listening on {}", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> eyre::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o))
        .collect::<Result<Vec<_>, _>>()
        .wrap_err("Invalid origin in CORS_ALLOWED_ORIGINS")?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(identity::USER_ID_HEADER),
            HeaderName::from_static(identity::PRIVILEGED_HEADER),
        ]))
}
