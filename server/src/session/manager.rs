//! Session manager for tracking connected clients

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Tracks open client sessions by peer address
pub struct SessionManager {
    /// Client ID per peer, empty until the first frame arrives
    sessions: Arc<RwLock<HashMap<SocketAddr, String>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, addr: SocketAddr) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(addr, String::new());
    }

    pub async fn unregister(&self, addr: SocketAddr) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&addr);
    }

    /// Remember the client ID `addr` introduced itself with
    pub async fn identify(&self, addr: SocketAddr, client_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(id) = sessions.get_mut(&addr) {
            if id.is_empty() {
                *id = client_id.to_string();
            }
        }
    }

    /// Client IDs of every open session, sorted
    pub async fn client_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.values().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
