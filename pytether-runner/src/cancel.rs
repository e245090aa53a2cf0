// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cooperative batch cancellation.

use std::sync::Arc;
use tokio::sync::watch;

/// A sticky cancellation flag shared between the runner and its host.
///
/// Cloning produces handles to the same flag. Once fired the flag stays
/// set; there is no reset.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelHandle {
    /// Creates a new handle in the not-cancelled state.
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any
    /// clone of this handle.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the flag is set. Resolves immediately if it already
    /// is, and is safe to use inside `select!`.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // Every clone holds the sender, so the channel cannot close while
        // a handle still waits on it.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}
