//! Connection ID generation

use crate::ConnectionId;
use std::sync::atomic::{AtomicU32, Ordering};

/// Thread-safe monotonically increasing ID generator
///
/// IDs wrap around after `u32::MAX`; zero is never handed out.
pub struct IdGenerator {
    next_id: AtomicU32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
        }
    }

    /// Get the next available ID
    pub fn next_id(&self) -> ConnectionId {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return ConnectionId::new(id);
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let gen = IdGenerator::new();
        let id1 = gen.next_id();
        let id2 = gen.next_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.get(), 1);
    }

    #[test]
    fn test_id_wraps_without_zero() {
        let gen = IdGenerator {
            next_id: AtomicU32::new(u32::MAX),
        };
        assert_eq!(gen.next_id().get(), u32::MAX);
        assert_eq!(gen.next_id().get(), 1);
    }
}
