//! Cancel: One-way stop signalling shared across a rewrite invocation.
//!
//! A single [`StopSignal`] is created per invocation and handed to the
//! provider call, observed by the chunk-forwarding loop, and exposed to
//! the host so a "stop" affordance can abort the stream. Signalling is
//! a one-way transition: once raised, the flag stays raised.

use tokio_util::sync::CancellationToken;

/// A clonable, single-use cancellation flag.
///
/// All clones observe the same underlying flag. Checking the flag twice
/// gives the same answer, and signalling an already-signalled flag is a
/// no-op.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
}

impl StopSignal {
    /// Create a fresh, unsignalled stop flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Idempotent.
    pub fn signal(&self) {
        self.token.cancel();
    }

    /// Check whether the flag has been raised.
    pub fn is_signalled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the flag is raised.
    ///
    /// Completes immediately if the flag was raised before the call.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
