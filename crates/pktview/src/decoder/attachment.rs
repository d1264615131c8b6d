use parking_lot::Mutex;

use crate::error::{ViewerError, ViewerResult};
use crate::session::SessionId;

/// Detached / Attached(session) state of a protocol.
#[derive(Debug, Default)]
pub struct Attachment {
    session: Mutex<Option<SessionId>>,
}

impl Attachment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detached -> Attached. Fails without changing state if already attached.
    pub fn attach(&self, name: &str, session: SessionId) -> ViewerResult<()> {
        let mut current = self.session.lock();
        if current.is_some() {
            return Err(ViewerError::AlreadyAttached(name.to_string()));
        }
        *current = Some(session);
        Ok(())
    }

    /// Attached -> Detached, returning the session it was attached to.
    pub fn detach(&self, name: &str) -> ViewerResult<SessionId> {
        self.session
            .lock()
            .take()
            .ok_or_else(|| ViewerError::NotAttached(name.to_string()))
    }

    pub fn session(&self) -> Option<SessionId> {
        *self.session.lock()
    }
}
