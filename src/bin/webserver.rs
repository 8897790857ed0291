// This is where we create the default webserver for running the binary
// locally: two listeners (public API, private metrics), the ingest writer,
// and the optional bus subscribers.

use anyhow::Result;
use axum::routing::{delete, get, post};
use axum::Extension;
use clap::Parser;
use searchd::{
    application::{application::Application, config::configuration::Configuration},
    ingest::{self, IngestJob},
    metrics, subscriber, webserver,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};
use tracing::{debug, error, info};

pub type Router<S = Application> = axum::Router<S>;

/// Drain budget once a shutdown signal arrives.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env files are fine; whatever they hold feeds the env-backed
    // Configuration flags below.
    for file in [".env.local", ".env"] {
        _ = dotenvy::from_filename(file);
    }
    let configuration = Configuration::parse();

    debug!("installing logging to local file");
    Application::install_logging(&configuration);
    configuration.print();

    let (application, ingest_jobs) = Application::initialize(configuration).await?;
    debug!("initialized application");

    run(application, ingest_jobs).await
}

pub async fn run(application: Application, ingest_jobs: flume::Receiver<IngestJob>) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        _ = shutdown_tx.send(true);
    });

    // The single writer draining the ingest queue, and the gauge sampler.
    tokio::spawn(ingest::run_writer(
        application.index.clone(),
        ingest_jobs,
    ));
    tokio::spawn(metrics::sample_system(application.ingest.clone()));

    // Subscribers are cancelled last on shutdown.
    let mut subscriber_tasks: Vec<JoinHandle<()>> = Vec::new();
    let deliver = subscriber::deliver_to_queue(application.ingest.clone());
    for stream in subscriber::streams_from_config(&application.config) {
        let name = stream.name();
        let deliver = deliver.clone();
        info!(name, "starting subscriber");
        subscriber_tasks.push(tokio::spawn(async move {
            if let Err(err) = stream.run(deliver).await {
                error!(?err, name, "subscriber failed");
            }
        }));
    }

    let mut joins = tokio::task::JoinSet::new();
    joins.spawn(start_public(application.clone(), shutdown_rx.clone()));
    joins.spawn(start_private(application.clone(), shutdown_rx.clone()));

    let mut shutdown_watch = shutdown_rx;
    let result = loop {
        tokio::select! {
            joined = joins.join_next() => match joined {
                None => break Ok(()),
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(err))) => {
                    error!(?err, "server failed");
                    break Err(err);
                }
                Some(Err(err)) => {
                    error!(?err, "server task panicked");
                    break Err(err.into());
                }
            },
            _ = shutdown_watch.changed() => {
                info!("shutdown signal received, draining requests");
                let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
                    while joins.join_next().await.is_some() {}
                })
                .await;
                if drained.is_err() {
                    error!("drain budget exceeded, aborting servers");
                    joins.abort_all();
                }
                break Ok(());
            }
        }
    };

    for task in &subscriber_tasks {
        task.abort();
    }
    info!("searchd stopped");
    result
}

async fn start_public(
    app: Application,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> Result<()> {
    let bind = SocketAddr::new(app.config.host.parse()?, app.config.public_port);
    let api = api_router()
        .layer(axum::middleware::from_fn(metrics::track))
        .layer(Extension(app.clone()))
        .with_state(app)
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new());

    let router = axum::Router::new().nest("/api/v1", api);

    info!(%bind, "public api listening");
    axum::Server::bind(&bind)
        .serve(router.into_make_service())
        .with_graceful_shutdown(async move {
            _ = shutdown.changed().await;
        })
        .await?;

    Ok(())
}

async fn start_private(
    app: Application,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> Result<()> {
    let bind = SocketAddr::new(app.config.host.parse()?, app.config.private_port);
    let router = axum::Router::new()
        .route("/metrics", get(metrics::serve))
        .route("/health", get(webserver::health::health));

    info!(%bind, "private listener up");
    axum::Server::bind(&bind)
        .serve(router.into_make_service())
        .with_graceful_shutdown(async move {
            _ = shutdown.changed().await;
        })
        .await?;

    Ok(())
}

fn api_router() -> Router {
    Router::new()
        .route("/addDoc", post(webserver::documents::add))
        .route("/updateDoc", post(webserver::documents::update))
        .route("/deleteDoc", delete(webserver::documents::remove))
        .route("/getAllDoc", get(webserver::documents::get_all))
        .route("/getDocId", get(webserver::documents::get_by_id))
        .route("/reindex", get(webserver::config::reindex))
        .route("/rebuild", get(webserver::config::rebuild))
        .route("/indexStruct", get(webserver::search::index_struct))
        .route("/search", get(webserver::search::search))
        .route("/simpleSearch", get(webserver::search::simple_search))
        .route("/filtersByCategory", get(webserver::config::filters_by_category))
        .route("/category", get(webserver::config::categories))
        .route("/getConfig/index", get(webserver::config::get_index_config))
        .route("/getConfig/filter", get(webserver::config::get_filter_config))
        .route("/getConfig/ranking", get(webserver::config::get_rank_config))
        .route("/config/index", post(webserver::config::update_index_config))
        .route("/config/index/revert", get(webserver::config::revert_index_config))
        .route("/config/index/isbuild", get(webserver::config::is_built))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(?err, "could not install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
