use crate::connection::ConnectionEvent;
use drawboard_system::ConnectionId;
use std::collections::HashMap;

pub type ConnectionTx = tokio::sync::mpsc::Sender<ConnectionEvent>;

pub struct ConnectionTxStorage {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    /// Best-effort delivery: a missing or closed channel is logged and
    /// otherwise ignored, it never fails the caller.
    pub async fn send(&mut self, to: &ConnectionId, message: ConnectionEvent) {
        if let Some(tx) = self.connection_txs.get_mut(to) {
            if tx.send(message).await.is_err() {
                log::warn!("connection {} channel is closed, dropping message", to);
            }
        } else {
            log::debug!("no channel for connection {}, dropping message", to);
        }
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id)
    }
}
