use std::sync::Arc;

use rest_api::RestServer;
use todo_core::MemoryStore;
use tracing::info;

/// Create the process-lifetime entity store, initialized empty.
pub fn create_store() -> Arc<MemoryStore> {
    info!("Creating in-memory entity store");
    Arc::new(MemoryStore::new())
}

/// Create and configure the REST server over a store handle.
pub fn create_server(store: Arc<MemoryStore>) -> RestServer<MemoryStore> {
    info!("Creating REST server");
    RestServer::new(store)
}

/// Initialize the complete application: store plus server.
pub fn initialize_app() -> RestServer<MemoryStore> {
    let store = create_store();
    create_server(store)
}
