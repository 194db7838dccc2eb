use std::sync::Arc;

use axum::extract::FromRef;
use verso_collab::Verso;

use crate::{registry::SyncRegistry, sse::ServerSentEvents};

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub verso: Arc<Verso>,
    pub sse: Arc<ServerSentEvents>,
    pub syncs: Arc<SyncRegistry>,
}
