//! Session lifecycle hooks
//!
//! Gameplay code learns about joins and leaves through [`SessionEvents`].
//! The join hook is where the join broadcast and initial world data go.

use async_trait::async_trait;
use basalt_core::Result;

use crate::session::SessionHandle;

#[async_trait]
pub trait SessionEvents: Send + Sync {
    /// A login completed; the session is in Play and registered
    ///
    /// An error here is fatal for the joining connection.
    async fn on_join(&self, _session: &SessionHandle) -> Result<()> {
        Ok(())
    }

    /// A registered session is being torn down
    ///
    /// Runs on the teardown path and must not block.
    fn on_leave(&self, _session: &SessionHandle) {}
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl SessionEvents for NoopEvents {}
