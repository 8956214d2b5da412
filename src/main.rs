use std::{path::Path, sync::Arc};

use affiliate_books::{
    books_api::BooksApi, config::Config, firestore_client::FirestoreClient,
    remote::{PollingCollection, RemoteCollection},
};
use anyhow::Context;
use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type AffiliateBooksResult<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> AffiliateBooksResult<()> {
    // Respect RUST_LOG if set, default to info for our crate and warn for deps.
    let default_filter = format!(
        "{}=info,poem=info,reqwest=warn,h2=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting affiliate books"
    );
    // Load environment variables from .env files
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load()?;
    if let Err(e) = config.validate() {
        return Err(anyhow::anyhow!(e));
    }

    let client = FirestoreClient::new(
        &config.firestore_base_url,
        &config.firestore_project_id,
        config.request_timeout,
    )
    .with_context(|| "Failed to build Firestore client")?
    .with_api_key(&config.firestore_api_key);
    let has_api_key = !config.firestore_api_key.is_empty();
    tracing::info!(
        firestore_base = %config.firestore_base_url,
        project = %config.firestore_project_id,
        has_api_key,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        request_timeout_ms = config.request_timeout.as_millis() as u64,
        "configured Firestore client"
    );

    let collection: Arc<dyn RemoteCollection> =
        Arc::new(PollingCollection::new(Arc::new(client), config.poll_interval));
    run_poem(collection, &config.bind_addr).await
}

pub async fn run_poem(
    collection: Arc<dyn RemoteCollection>,
    bind_addr: &str,
) -> AffiliateBooksResult<()> {
    let version = env!("CARGO_PKG_VERSION");
    let api = BooksApi { collection };
    let api_service = OpenApiService::new(api, "Affiliate Books API", version)
        .server(format!("http://{}", bind_addr));
    let ui = api_service.rapidoc();
    let spec = api_service.spec();
    let route = Route::new()
        .nest("/", api_service)
        .nest("/ui", ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
        .with(Cors::new())
        .with(PoemTracing);

    tracing::info!(%bind_addr, "starting HTTP server");
    Server::new(TcpListener::bind(bind_addr.to_string()))
        .run(route)
        .await
        .with_context(|| format!("HTTP server on {} failed", bind_addr))?;
    Ok(())
}
