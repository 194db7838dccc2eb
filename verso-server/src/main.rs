use std::sync::Arc;

use log::info;
use verso_collab::{Composer, MemoryStore, TokenIdentity, Verso};
use verso_server::{init_logger, run_server};

#[tokio::main]
async fn main() {
    init_logger();

    info!("Starting verso...");

    let store = Arc::new(MemoryStore::new());
    let verso = Verso::new(store, Arc::new(TokenIdentity), Composer::from_env());

    run_server(Arc::new(verso)).await;
}
