//! Application state shared across all request handlers.

use sam_core::status::SharedLoopStatus;
use sam_core::store::SeenEventStore;
use std::sync::Arc;

/// Read-only view of the announcer for the status API.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SeenEventStore>,
    pub status: SharedLoopStatus,
    /// Organization slug being followed.
    pub organization: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SeenEventStore>,
        status: SharedLoopStatus,
        organization: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            store,
            status,
            organization: organization.into(),
        }
    }
}
