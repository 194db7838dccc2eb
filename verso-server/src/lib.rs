use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use verso_collab::Verso;

mod auth;
mod bands;
mod context;
mod docs;
mod errors;
mod logging;
mod registry;
mod rehearsals;
mod schemas;
mod serialized;
mod setlists;
mod shared;
mod songs;
mod sse;

pub use context::ServerContext;
pub use logging::init_logger;

use registry::SyncRegistry;
use sse::ServerSentEvents;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9160;

pub type Router = axum::Router<ServerContext>;

/// Starts the verso server
pub async fn run_server(verso: Arc<Verso>) {
    let port = env::var("VERSO_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let sse = ServerSentEvents::new();
    let _ = sse::forward_events(verso.listen(), sse.clone());

    let context = ServerContext {
        syncs: Arc::new(SyncRegistry::new(verso.clone())),
        verso,
        sse,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/bands", bands::router())
        .nest("/workspace", bands::workspace_router())
        .nest("/songs", songs::router())
        .nest("/setlists", setlists::router())
        .nest("/rehearsals", rehearsals::router())
        .nest("/shared", shared::router())
        .nest("/events", sse::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", axum::routing::get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {port}");

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}
