use std::sync::Arc;

use parking_lot::RwLock;

use crate::decoder::Protocol;
use crate::log::LogId;
use crate::session::SessionId;
use crate::unit::Origin;

#[derive(Default)]
struct ActiveState {
    origin: Option<Origin>,
    protocol: Option<Arc<dyn Protocol>>,
    generation: u64,
}

/// The session's current protocol and log attachment, shared with the
/// decode worker so it can recognise work orphaned by a switch.
pub struct ActiveContext {
    session: SessionId,
    state: RwLock<ActiveState>,
}

impl ActiveContext {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            state: RwLock::new(ActiveState::default()),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn protocol(&self) -> Option<Arc<dyn Protocol>> {
        self.state.read().protocol.clone()
    }

    /// Swap the active protocol, returning the previous one.
    pub fn replace_protocol(&self, protocol: Option<Arc<dyn Protocol>>) -> Option<Arc<dyn Protocol>> {
        std::mem::replace(&mut self.state.write().protocol, protocol)
    }

    /// Start a new log attachment (or none). Every call starts a new
    /// generation, so units of an earlier attachment of the same log are stale.
    pub fn attach_log(&self, log: Option<LogId>) -> Option<Origin> {
        let mut state = self.state.write();
        state.generation += 1;
        let generation = state.generation;
        state.origin = log.map(|log| Origin {
            session: self.session,
            log,
            generation,
        });
        state.origin
    }

    pub fn origin(&self) -> Option<Origin> {
        self.state.read().origin
    }

    pub fn is_current(&self, origin: &Origin) -> bool {
        self.state.read().origin.as_ref() == Some(origin)
    }
}
