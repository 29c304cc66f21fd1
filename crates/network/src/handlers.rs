//! # Play Packet Handlers
//!
//! Play-state packets the connection engine does not consume itself are
//! routed here by packet id.
//!
//! # Thread Safety
//!
//! Handlers can be called from multiple connection tasks concurrently.
//! State they touch must be protected accordingly.
//!
//! # Example
//!
//! ```no_run
//! use basalt_network::HandlerRegistry;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! // Chat message
//! registry.register_function(0x03, |ctx| async move {
//!     tracing::info!("Chat from {}: {} bytes", ctx.session.id(), ctx.packet.len());
//!     Ok(())
//! });
//! ```

use basalt_core::Result;
use basalt_protocol::Packet;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::session::SessionHandle;

/// A decoded Play packet and the session it arrived on
#[derive(Debug, Clone)]
pub struct PlayContext {
    pub packet: Packet,
    pub session: SessionHandle,
}

/// Type for packet handler functions
pub type HandlerFunction =
    Arc<dyn Fn(PlayContext) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Registry of Play handlers keyed by packet id
pub struct HandlerRegistry {
    handlers: HashMap<i32, HandlerFunction>,
}

impl HandlerRegistry {
    #[inline]
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Register an async closure for `packet_id`, replacing any previous one
    pub fn register_function<F, Fut>(&mut self, packet_id: i32, handler: F)
    where
        F: Fn(PlayContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler: HandlerFunction = Arc::new(move |ctx: PlayContext| -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
            Box::pin(handler(ctx))
        });

        tracing::debug!("Registered handler for packet 0x{:02X}", packet_id);
        self.handlers.insert(packet_id, handler);
    }

    /// Handler for `packet_id`, cloned out so no lock is held while it runs
    pub fn get(&self, packet_id: i32) -> Option<HandlerFunction> {
        self.handlers.get(&packet_id).cloned()
    }

    /// Run the handler for `ctx.packet`
    ///
    /// The handler is cloned out of the lock before it is awaited, so other
    /// connections and registrations are never blocked by a running handler.
    ///
    /// # Returns
    /// - `Ok(true)` - handled
    /// - `Ok(false)` - no handler for this id
    /// - `Err(e)` - the handler failed
    pub async fn dispatch(handlers: &RwLock<HandlerRegistry>, ctx: PlayContext) -> Result<bool> {
        let handler = handlers.read().get(ctx.packet.id);
        match handler {
            Some(handler) => handler(ctx).await.map(|_| true),
            None => Ok(false),
        }
    }

    pub fn has_handler(&self, packet_id: i32) -> bool {
        self.handlers.contains_key(&packet_id)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.handlers.keys().collect();
        ids.sort();
        f.debug_struct("HandlerRegistry").field("packet_ids", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue;
    use crate::session::SessionShared;
    use basalt_core::{BasaltError, ConnectionId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    fn context(id: i32) -> PlayContext {
        let cancel = CancellationToken::new();
        let shared = Arc::new(SessionShared::new(ConnectionId::new(1), cancel.clone(), 3));
        let (sender, _queue) = queue::channel(cancel);
        PlayContext {
            packet: Packet::serverbound(id, vec![1, 2, 3]),
            session: SessionHandle::new(shared, sender),
        }
    }

    #[tokio::test]
    async fn test_registry_register() {
        let mut registry = HandlerRegistry::new();
        registry.register_function(0x03, |_ctx| async move { Ok(()) });

        assert!(registry.has_handler(0x03));
        assert!(!registry.has_handler(0x04));
        assert_eq!(registry.handler_count(), 1);
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();

        let counter = calls.clone();
        registry.register_function(0x03, move |ctx| {
            let counter = counter.clone();
            async move {
                assert_eq!(&ctx.packet.payload[..], &[1, 2, 3]);
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let registry = RwLock::new(registry);
        assert!(HandlerRegistry::dispatch(&registry, context(0x03)).await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_registry_no_handler() {
        let registry = RwLock::new(HandlerRegistry::new());
        assert!(!HandlerRegistry::dispatch(&registry, context(0x2C)).await.unwrap());
    }

    #[tokio::test]
    async fn test_registration_during_dispatch() {
        let registry = Arc::new(RwLock::new(HandlerRegistry::new()));

        let inner = registry.clone();
        registry.write().register_function(0x03, move |_ctx| {
            let inner = inner.clone();
            async move {
                // the lock is free while the handler runs
                inner.write().register_function(0x04, |_ctx| async move { Ok(()) });
                Ok(())
            }
        });

        assert!(HandlerRegistry::dispatch(&registry, context(0x03)).await.unwrap());
        assert!(registry.read().has_handler(0x04));
        assert_eq!(registry.read().handler_count(), 2);
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let mut registry = HandlerRegistry::new();
        registry.register_function(0x05, |_ctx| async move {
            Err(BasaltError::ProtocolViolation("bad settings".into()))
        });
        let registry = RwLock::new(registry);
        assert!(HandlerRegistry::dispatch(&registry, context(0x05)).await.is_err());
    }
}
