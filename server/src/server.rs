//! TCP accept loop wiring sessions to the dispatcher

use crate::command::RequestDispatcher;
use crate::config::{ConfigError, ServerConfig};
use crate::fleet::{AbortSignal, FleetRegistry};
use crate::session::{ClientSession, SessionManager};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub struct FleetServer {
    config: ServerConfig,
    dispatcher: RequestDispatcher,
    sessions: Arc<SessionManager>,
    abort: AbortSignal,
}

impl FleetServer {
    /// Build a server with a fresh registry populated from the config's seed
    /// list. This is the one place a config is validated.
    pub async fn from_config(config: ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(FleetRegistry::new());
        config.fleet.apply(&registry).await?;

        let abort = AbortSignal::new();
        let dispatcher = RequestDispatcher::new(registry, abort.clone());

        Ok(Self {
            config,
            dispatcher,
            sessions: Arc::new(SessionManager::new()),
            abort,
        })
    }

    pub fn registry(&self) -> &Arc<FleetRegistry> {
        self.dispatcher.registry()
    }

    /// Accept clients until `shutdown` resolves. Then stop accepting, abort
    /// calls before their next drone, and wait for every session to send the
    /// response it owes before returning.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let local = listener.local_addr()?;
        info!(addr = %local, "Fleet server listening");

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!("Accept failed: {}", e);
                            continue;
                        }
                    };
                    info!(%addr, "Connection accepted");

                    let session = ClientSession::new(
                        stream,
                        addr,
                        self.config.idle_timeout(),
                        self.config.max_frame_bytes,
                    );
                    tasks.spawn(session.serve(
                        self.dispatcher.clone(),
                        self.sessions.clone(),
                        stop_rx.clone(),
                    ));
                }
                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = finished {
                        warn!("Session task failed: {}", e);
                    }
                }
                _ = &mut shutdown => break,
            }
        }

        drop(listener);
        self.abort.abort();
        let _ = stop_tx.send(true);

        let clients = self.sessions.client_ids().await;
        info!(sessions = tasks.len(), ?clients, "Shutting down, draining sessions");

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                warn!("Session task failed: {}", e);
            }
        }

        info!("Fleet server stopped");
        Ok(())
    }
}
