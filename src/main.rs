//! Tape Configurator
//!
//! Backend of a custom printed tape configurator: tape model catalog and
//! pricing, artwork compositing onto the tape texture with stretch
//! compensation, and per-user sessions that keep the 3D preview's texture
//! and mesh scale in step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

mod api;
mod config;
mod domain;
mod engine;

use crate::config::Settings;
use crate::domain::Catalog;
use crate::engine::{
    Compositor, EditorOptions, EngineContext, FontBook, SessionRegistry, StretchCompensation, TextureLibrary,
};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub engine: Arc<EngineContext>,
    pub sessions: Arc<SessionRegistry>,
    pub started_at: Instant,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tape_configurator=info".parse()?)
                .add_directive("actix_web=info".parse()?),
        )
        .json()
        .init();

    let settings = Settings::load().context("Failed to load configuration")?;
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_addr = %bind_addr,
        "Starting Tape Configurator"
    );

    let catalog = match &settings.assets.catalog_path {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("Failed to load catalog from {}", path.display()))?,
        None => Catalog::builtin(),
    };
    info!(models = catalog.len(), default_model = %catalog.default_model().key, "Catalog ready");

    // Decode every material's base texture into memory at startup
    let textures = TextureLibrary::load(
        &catalog,
        &settings.assets.root,
        Duration::from_secs(settings.assets.fetch_timeout_secs),
    )
    .await
    .context("Failed to load material textures")?;
    info!(textures = textures.texture_count(), "Loaded material textures");

    let fonts = match FontBook::load_dir(&settings.editor.font_dir) {
        Ok(fonts) => fonts,
        Err(e) => {
            warn!(error = %e, font_dir = %settings.editor.font_dir.display(), "No fonts loaded, text objects are unavailable");
            FontBook::new()
        }
    };

    let compensation = StretchCompensation::from_settings(&settings.compositing)
        .context("Invalid stretch correction table")?;
    let editor_options = EditorOptions::from_settings(&settings.compositing, &settings.editor)
        .context("Invalid editor settings")?;

    let engine = Arc::new(EngineContext {
        catalog: Arc::new(catalog),
        textures: Arc::new(textures),
        compositor: Compositor::new(compensation),
        fonts: Arc::new(fonts),
        editor_options,
    });
    let sessions = Arc::new(SessionRegistry::new(
        engine.clone(),
        settings.sessions.max_sessions,
        Duration::from_secs(settings.sessions.idle_timeout_secs),
    ));

    // Periodically drop abandoned sessions
    {
        let sessions = sessions.clone();
        let period = Duration::from_secs(settings.sessions.sweep_interval_secs.max(1));
        actix_rt::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                sessions.evict_idle(Utc::now());
            }
        });
    }

    let workers = settings.server.workers.unwrap_or_else(|| num_cpus::get() * 2);

    // Create shared application state
    let app_state = web::Data::new(AppState {
        settings,
        engine,
        sessions,
        started_at: Instant::now(),
    });

    // Configure and start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(web::JsonConfig::default().limit(16 * 1024 * 1024))
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "tape-configurator"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION"))),
            )
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await
    .context("HTTP server failed")
}
