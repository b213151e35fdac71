//! TCP chat server
//!
//! Accepts connections and runs one `ConnectionSession` per connection.
//! Every session task is owned by a `JoinSet`, so finished sessions are
//! reaped as they end and shutdown can wait for (or abort) the rest.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::history::{ChatHistory, DiscardHistory, FileHistory};
use crate::registry::ClientRegistry;
use crate::router::MessageRouter;
use crate::session::{ConnectionSession, SessionOptions};

/// Written to a connection turned away by the admission check
pub const SERVER_FULL_MESSAGE: &str = "Server is full, try again later.\n";

/// The chat server
pub struct ChatServer {
    listener: TcpListener,
    router: MessageRouter,
    config: Config,
    history: Option<FileHistory>,
}

impl ChatServer {
    /// Bind the listener and set up the registry and chat history
    pub async fn bind(config: Config) -> Result<Self, AppError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Chat server listening on {}", listener.local_addr()?);

        let history = if config.history_enabled {
            let file = FileHistory::open(&config.history_path).await?;
            info!("Appending chat history to {}", file.path().display());
            Some(file)
        } else {
            None
        };
        let sink: Arc<dyn ChatHistory> = match &history {
            Some(file) => Arc::new(file.clone()),
            None => Arc::new(DiscardHistory),
        };

        let router = MessageRouter::new(ClientRegistry::spawn(), sink);

        Ok(Self {
            listener,
            router,
            config,
            history,
        })
    }

    /// Get the local address the server is bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the live participant registry
    pub fn registry(&self) -> ClientRegistry {
        self.router.registry().clone()
    }

    /// Accept connections until `shutdown` completes
    ///
    /// Accept failures are logged and skipped. On shutdown the listener is
    /// closed, running sessions get `shutdown_grace_secs` to finish and
    /// are then aborted.
    pub async fn run<F>(self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        let ChatServer {
            listener,
            router,
            config,
            history,
        } = self;
        let options = SessionOptions::from(&config);
        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        warn!("Session task failed: {}", e);
                    }
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if let Some(limit) = config.max_clients {
                                if sessions.len() >= limit {
                                    warn!("Rejecting {}: {} connections active", addr, limit);
                                    tokio::spawn(reject(stream));
                                    continue;
                                }
                            }

                            info!("New connection from {}", addr);
                            let session = ConnectionSession::new(router.clone(), options, addr.to_string());
                            sessions.spawn(async move {
                                match session.run(stream).await {
                                    Ok(()) => {}
                                    Err(AppError::HandshakeFailed) => {
                                        debug!("{} left before choosing a name", addr);
                                    }
                                    Err(e) => error!("Connection handler error for {}: {}", addr, e),
                                }
                            });
                            debug!("Active connections: {}", sessions.len());
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        drop(listener);
        drain(&mut sessions, config.shutdown_grace()).await;

        if let Some(history) = history {
            history.flush().await;
        }

        info!("Chat server stopped");
        Ok(())
    }
}

/// Tell a rejected connection why and close it
async fn reject(mut stream: TcpStream) {
    let _ = stream.write_all(SERVER_FULL_MESSAGE.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Wait up to `grace` for sessions to finish, then abort the rest
async fn drain(sessions: &mut JoinSet<()>, grace: std::time::Duration) {
    if sessions.is_empty() {
        return;
    }

    info!("Waiting for {} sessions to finish", sessions.len());
    let waited = tokio::time::timeout(grace, async {
        while sessions.join_next().await.is_some() {}
    })
    .await;

    if waited.is_err() {
        warn!("Aborting {} sessions after grace period", sessions.len());
        sessions.shutdown().await;
    }
}
