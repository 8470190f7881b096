// =============================================================================
// Central Application State
// =============================================================================
//
// Everything the HTTP layer needs, tied together behind one `Arc`:
// the immutable settings, the bar store, and the streaming status published
// by the supervisor. There is deliberately no other shared mutable state —
// the store is the single source of truth and the analytical pipeline is
// stateless.
// =============================================================================

use std::sync::Arc;

use crate::settings::Settings;
use crate::storage::BarStore;
use crate::streaming::StreamingStatus;

/// Shared application state for HTTP handlers.
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<BarStore>,
    pub streaming: Arc<StreamingStatus>,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<BarStore>,
        streaming: Arc<StreamingStatus>,
    ) -> Self {
        Self {
            settings,
            store,
            streaming,
        }
    }
}
