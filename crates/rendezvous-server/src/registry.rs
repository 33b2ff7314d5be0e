use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use rendezvous_common::{Error, Result};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifies one accepted socket, independently of the user key it claims.
pub type ConnectionId = Uuid;

/// Outbound half of a connection.
pub type OutboundSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Write side of a live connection.
///
/// Every writer (the connection itself, peers relaying to it, roster
/// broadcasts) goes through the same lock, so frames never interleave and
/// a write completes before the next one starts.
#[derive(Clone)]
pub struct PeerChannel {
    id: ConnectionId,
    sink: Arc<Mutex<OutboundSink>>,
}

impl PeerChannel {
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<Message, Error = axum::Error> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            sink: Arc::new(Mutex::new(Box::pin(sink))),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Exclusive access to the socket until the guard is dropped.
    pub async fn lock(&self) -> MutexGuard<'_, OutboundSink> {
        self.sink.lock().await
    }

    async fn write_text(&self, text: &str, timeout: Duration) -> Result<()> {
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(timeout, sink.send(Message::Text(text.to_owned()))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(Error::transport(err)),
            Err(_) => Err(Error::transport(format!(
                "write timed out after {:?}",
                timeout
            ))),
        }
    }

    /// Close the socket. Later writes fail.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(err) = sink.close().await {
            debug!("closing connection {}: {}", self.id, err);
        }
    }
}

/// Live connections keyed by user key.
///
/// At most one channel is reachable per key. The map lock is only held for
/// lookups and updates; writes happen afterwards under the channel's own
/// lock, and a channel released while a write is pending fails that write.
#[derive(Clone)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, PeerChannel>>>,
    write_timeout: Duration,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::with_write_timeout(DEFAULT_WRITE_TIMEOUT)
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose sends give up on a peer that does not accept a frame
    /// within `write_timeout`.
    pub fn with_write_timeout(write_timeout: Duration) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            write_timeout,
        }
    }

    /// Insert or replace the channel for `user_key`.
    ///
    /// A displaced channel is not closed; it just stops being reachable by
    /// key. Returns the id of the displaced connection, if any.
    pub fn register(&self, user_key: &str, channel: PeerChannel) -> Option<ConnectionId> {
        let id = channel.id();
        let replaced = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_key.to_string(), channel);

        match &replaced {
            Some(previous) => info!(
                "connection {} replaced {} for key {}",
                id,
                previous.id(),
                user_key
            ),
            None => debug!("connection {} registered for key {}", id, user_key),
        }
        replaced.map(|previous| previous.id())
    }

    /// Remove whatever is registered under `user_key`. Absent keys are a no-op.
    pub fn unregister(&self, user_key: &str) -> bool {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_key)
            .is_some()
    }

    /// Remove `user_key` only while it still points at connection `id`.
    ///
    /// Used by a closing connection so it cannot evict a newer connection
    /// that took over its key.
    pub fn release(&self, user_key: &str, id: ConnectionId) -> bool {
        let mut guard = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.get(user_key) {
            Some(current) if current.id() == id => {
                guard.remove(user_key);
                debug!("connection {} unregistered for key {}", id, user_key);
                true
            }
            _ => false,
        }
    }

    fn lookup(&self, user_key: &str) -> Option<PeerChannel> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_key)
            .cloned()
    }

    /// Write `text` to the connection registered as `user_key`.
    ///
    /// Resolves once the socket write finished. Returns false when the key
    /// is unknown or the write fails or times out. Nothing is queued for
    /// later and a failed write does not unregister the peer.
    pub async fn send(&self, user_key: &str, text: &str) -> bool {
        let Some(channel) = self.lookup(user_key) else {
            warn!("target user not connected: {}", user_key);
            return false;
        };

        match channel.write_text(text, self.write_timeout).await {
            Ok(()) => true,
            Err(err) => {
                warn!("failed to send signaling message to {}: {}", user_key, err);
                false
            }
        }
    }

    /// Send the same payload to every key in order, each independently.
    /// Returns how many writes succeeded.
    pub async fn send_many<I, K>(&self, user_keys: I, text: &str) -> usize
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut delivered = 0;
        for user_key in user_keys {
            if self.send(user_key.as_ref(), text).await {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn contains(&self, user_key: &str) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(user_key)
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped registration of one connection.
///
/// Dropping it releases the key, so every exit path of the owning loop
/// (close frame, read error, panic) leaves the registry clean.
pub struct Registration {
    registry: ConnectionRegistry,
    user_key: String,
    id: ConnectionId,
}

impl Registration {
    pub fn new(registry: ConnectionRegistry, user_key: String, channel: PeerChannel) -> Self {
        let id = channel.id();
        registry.register(&user_key, channel);
        Self {
            registry,
            user_key,
            id,
        }
    }

    pub fn user_key(&self) -> &str {
        &self.user_key
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.release(&self.user_key, self.id);
    }
}
