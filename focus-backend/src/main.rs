use actix_cors::Cors;
use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;

use focus_backend::config::{self, Config};
use focus_backend::controllers;
use focus_backend::notes::{ChangeWatcher, NoteBroadcaster, NotesStore};
use focus_backend::AppState;
use tokio_util::sync::CancellationToken;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    log::info!("focus-backend v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Notes file: {:?}", config.notes_file);

    if let Err(e) = config::initialize_storage(&config) {
        log::error!("Failed to prepare the notes directory: {}", e);
    }

    let store = Arc::new(NotesStore::new(config.notes_file.clone()));
    let broadcaster = Arc::new(NoteBroadcaster::new(Arc::clone(&store)));

    let watcher = ChangeWatcher::start(
        Arc::clone(&store),
        Arc::clone(&broadcaster),
        config.watch_mode,
        Duration::from_millis(config.poll_interval_ms),
    );

    let keepalive_cancel = CancellationToken::new();
    let keepalive = Arc::clone(&broadcaster).start_keepalive(keepalive_cancel.clone());

    let serve_static = config.public_dir.is_dir();
    if serve_static {
        log::info!("Serving static UI from {:?}", config.public_dir);
    } else {
        log::warn!(
            "Public directory {:?} not found - static UI disabled",
            config.public_dir
        );
    }

    let port = config.port;
    let public_dir = config.public_dir.clone();
    let state_config = config.clone();
    let state_store = Arc::clone(&store);
    let state_broadcaster = Arc::clone(&broadcaster);
    let started_at = std::time::Instant::now();

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let mut app = App::new()
            .app_data(web::Data::new(AppState {
                config: state_config.clone(),
                store: Arc::clone(&state_store),
                broadcaster: Arc::clone(&state_broadcaster),
                started_at,
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::auth::config)
            .configure(controllers::content::config);

        if serve_static {
            app = app.service(Files::new("/", public_dir.clone()).index_file("index.html"));
        }

        app
    })
    .bind(("0.0.0.0", port))?
    .run();

    log::info!("Focus notes server listening on http://0.0.0.0:{}", port);

    let server_handle = server.handle();

    // Ctrl+C: stop the background tasks first so no timer outlives the
    // subscriber set, then drain the HTTP server.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        log::info!("Received Ctrl+C, shutting down...");

        keepalive_cancel.cancel();
        let _ = keepalive.await;
        watcher.shutdown().await;

        log::info!("Stopping HTTP server...");
        server_handle.stop(true).await;
        log::info!("Shutdown complete");
    });

    server.await
}
