//! Scoped remote sessions

use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::traits::RemoteSession;

/// Closes the wrapped session when dropped
pub struct SessionGuard {
    session: Box<dyn RemoteSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn RemoteSession>) -> Self {
        Self { session }
    }
}

impl Deref for SessionGuard {
    type Target = dyn RemoteSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let host = self.session.host().to_string();
        match self.session.close() {
            Ok(()) => debug!(host = %host, "remote session closed"),
            Err(e) => warn!(host = %host, error = %e, "failed to close remote session"),
        }
    }
}
