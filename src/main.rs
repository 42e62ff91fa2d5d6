use dotenvy::dotenv;
use snafu::ResultExt as _;

use listing_views::api::{self, App};
use listing_views::error::{
    ApplicationError, BindAddressSnafu, ConnectDatabaseSnafu, OpenStoreSnafu, WebServerSnafu,
};
use listing_views::recorder::ViewRecorder;
use listing_views::retention::RetentionTask;
use listing_views::store::{global, ViewEventStore};
use listing_views::{config, database, logger};

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = config::load()?;

    let _guard = logger::init(&config.server)?;

    let database = database::connect(&config.database)
        .await
        .context(ConnectDatabaseSnafu)?;
    let store = ViewEventStore::open(database, config.store.store_config())
        .await
        .context(OpenStoreSnafu)?;
    let store = global::install(store).context(OpenStoreSnafu)?.clone();

    let retention = config
        .retention
        .horizon
        .map(|horizon| RetentionTask::spawn(store.clone(), horizon, config.retention.every));

    let (recorder, recorder_task) = ViewRecorder::spawn(store.clone(), config.server.recorder_capacity);
    let app = App::new(store, recorder, config.trending.clone());

    let address = config.server.host;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .context(BindAddressSnafu { address })?;
    tracing::info!(%address, "serving listing views");

    axum::serve(listener, api::create_router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(WebServerSnafu)?;

    recorder_task.finish().await;
    if let Some(retention) = retention {
        retention.shutdown().await;
    }

    tracing::info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "could not listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
}
