//! Session context and staleness detection.
//!
//! Long-running client operations (signing, oracle round trips) take a
//! [`StalenessGuard`] snapshot before their first suspension point and
//! re-check it after every await. If the chain, the signer or the target
//! ledger changed in the meantime the result is thrown away.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::{Address, LedgerAddress, LedgerError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub chain_id: u64,
    pub signer: Address,
    pub ledger: LedgerAddress,
}

/// Publisher side of the current session.
#[derive(Debug)]
pub struct SessionHandle {
    tx: watch::Sender<SessionContext>,
}

impl SessionHandle {
    pub fn new(context: SessionContext) -> Self {
        let (tx, _rx) = watch::channel(context);
        Self { tx }
    }

    pub fn current(&self) -> SessionContext {
        *self.tx.borrow()
    }

    /// Publishes a new context. In-flight operations become stale.
    pub fn switch(&self, context: SessionContext) {
        let previous = self.tx.send_replace(context);
        if previous != context {
            debug!(?previous, current = ?context, "session switched");
        }
    }

    pub fn guard(&self) -> StalenessGuard {
        let rx = self.tx.subscribe();
        let snapshot = *rx.borrow();
        StalenessGuard {
            snapshot,
            rx: Some(rx),
        }
    }
}

/// Snapshot of the session taken when an operation started.
#[derive(Debug, Clone)]
pub struct StalenessGuard {
    snapshot: SessionContext,
    rx: Option<watch::Receiver<SessionContext>>,
}

impl StalenessGuard {
    /// A guard that never goes stale, for callers without a live session.
    pub fn fixed(context: SessionContext) -> Self {
        Self {
            snapshot: context,
            rx: None,
        }
    }

    pub fn snapshot(&self) -> &SessionContext {
        &self.snapshot
    }

    pub fn is_stale(&self) -> bool {
        match &self.rx {
            Some(rx) => *rx.borrow() != self.snapshot,
            None => false,
        }
    }

    /// Fails with [`LedgerError::Stale`] if the session moved on.
    pub fn ensure_fresh(&self, operation: &str) -> Result<(), LedgerError> {
        if self.is_stale() {
            debug!(operation, "discarding result of stale operation");
            return Err(LedgerError::Stale(format!(
                "session changed during {operation}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(chain_id: u64) -> SessionContext {
        SessionContext {
            chain_id,
            signer: Address::from_label("alice"),
            ledger: Address::from_label("ledger"),
        }
    }

    #[test]
    fn guard_goes_stale_on_switch() {
        let session = SessionHandle::new(context(1));
        let guard = session.guard();
        assert!(guard.ensure_fresh("test").is_ok());

        session.switch(context(2));
        assert!(guard.is_stale());
        assert!(matches!(
            guard.ensure_fresh("test"),
            Err(LedgerError::Stale(_))
        ));
        assert!(!session.guard().is_stale());
    }

    #[test]
    fn republishing_same_context_is_not_stale() {
        let session = SessionHandle::new(context(1));
        let guard = session.guard();
        session.switch(context(1));
        assert!(!guard.is_stale());
    }

    #[test]
    fn fixed_guard_never_stale() {
        assert!(!StalenessGuard::fixed(context(7)).is_stale());
    }
}
