// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `pendingPeerRequests` table (spec.md §5's shared resource #3):
//! routes continuation frames for a plugin-initiated `REQ` to whatever
//! [`crate::router::CapRouter`] picked to service it.

use std::collections::HashMap;
use std::sync::Mutex;

use capns_frame::Frame;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Maps an in-flight peer-invoked request id to the sender its servicing
/// task is reading from.
#[derive(Default)]
pub struct PeerRequests {
    inner: Mutex<HashMap<Uuid, mpsc::Sender<Frame>>>,
}

impl PeerRequests {
    /// Register the sender that continuation frames for `id` should be
    /// forwarded to.
    pub fn insert(&self, id: Uuid, sender: mpsc::Sender<Frame>) {
        self.inner.lock().expect("peer requests lock poisoned").insert(id, sender);
    }

    /// Forward `frame` to `id`'s servicing task, if still registered.
    /// Returns `true` if a route was found (whether or not the send
    /// itself succeeded).
    pub async fn forward(&self, id: Uuid, frame: Frame) -> bool {
        let sender = {
            let table = self.inner.lock().expect("peer requests lock poisoned");
            table.get(&id).cloned()
        };
        match sender {
            Some(sender) => {
                let _ = sender.send(frame).await;
                true
            }
            None => false,
        }
    }

    /// Remove `id`'s entry (its request has terminated).
    pub fn remove(&self, id: &Uuid) {
        self.inner.lock().expect("peer requests lock poisoned").remove(id);
    }
}
