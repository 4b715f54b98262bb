use std::sync::Arc;
use std::time::Duration;

use dstore_protocol::{
    dispatch, CachingDataStoreServer, DstoreCodec, ProtocolResult, Request, Response,
};
use dstore_types::NodeId;
use dstore_store::BackingStore;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::data_store::CachingDataStore;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Directory server: node request listener plus admin HTTP listener.
pub struct DstoreServer {
    config: ServerConfig,
}

impl DstoreServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start serving requests against `store`.
    pub async fn serve(self, store: Arc<dyn BackingStore>) -> ServerResult<()> {
        let data_store = Arc::new(CachingDataStore::new(&self.config, store));
        let requests = TcpListener::bind(self.config.bind_addr).await?;
        let admin = TcpListener::bind(self.config.admin_addr).await?;
        info!(
            bind_addr = %self.config.bind_addr,
            admin_addr = %self.config.admin_addr,
            "dstore server listening"
        );

        let app = build_router(Arc::clone(&data_store));
        let admin_task = tokio::spawn(async move { axum::serve(admin, app).await });
        let served = serve_requests(requests, data_store, self.config.max_connections).await;
        admin_task.abort();
        served
    }
}

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept node connections on `listener`, at most `max_connections` at once.
///
/// Only returns on failure.
pub async fn serve_requests<S>(
    listener: TcpListener,
    server: Arc<S>,
    max_connections: usize,
) -> ServerResult<()>
where
    S: CachingDataStoreServer + 'static,
{
    let permits = Arc::new(Semaphore::new(max_connections.max(1)));
    loop {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            debug!(%peer, "node connected");
            if let Err(error) = handle_connection(stream, server.as_ref()).await {
                warn!(%peer, %error, "node connection failed");
            }
            drop(permit);
        });
    }
}

/// Serve one node connection. Nodes registered over it are declared dead
/// when it ends, however it ends.
async fn handle_connection<S>(stream: TcpStream, server: &S) -> ProtocolResult<()>
where
    S: CachingDataStoreServer + ?Sized,
{
    let mut registered = Vec::new();
    let served = serve_connection(stream, server, &mut registered).await;
    for node in registered {
        match server.node_disconnected(node).await {
            Ok(true) => info!(%node, "node disconnected"),
            Ok(false) => {}
            Err(error) => warn!(%node, %error, "cannot retire disconnected node"),
        }
    }
    served
}

async fn serve_connection<S>(
    mut stream: TcpStream,
    server: &S,
    registered: &mut Vec<NodeId>,
) -> ProtocolResult<()>
where
    S: CachingDataStoreServer + ?Sized,
{
    stream.set_nodelay(true)?;
    while let Some(request) = DstoreCodec::read_frame::<_, Request>(&mut stream).await? {
        let response = dispatch(server, request).await;
        if let Response::Registered(registration) = &response {
            registered.push(registration.node_id);
        }
        DstoreCodec::write_frame(&mut stream, &response).await?;
    }
    Ok(())
}
