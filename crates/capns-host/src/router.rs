// SPDX-License-Identifier: MIT OR Apache-2.0
//! Servicing a `REQ` frame that arrives from the plugin — the host acting
//! as a peer invoked by its own child (spec.md §4.I "Peer invoke").

use async_trait::async_trait;
use capns_frame::Frame;
use capns_urn::CapUrn;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::HostError;

/// A live peer-invoked request: every continuation frame the plugin sends
/// under the originating request id is pushed through `forward_frame`;
/// `responses` yields the frames to relay back as that request's
/// response (terminated by `END` or `ERR`).
pub struct PeerRequestHandle {
    to_handler: mpsc::Sender<Frame>,
    /// Frames to forward back to the plugin as this peer request's
    /// response, in order.
    pub responses: mpsc::Receiver<Frame>,
}

impl PeerRequestHandle {
    /// Construct a handle from its two halves. Routers that service a
    /// request locally (e.g. dispatching to another in-process `Host`)
    /// build one of these directly; `to_handler`'s matching receiver is
    /// whatever actually executes the cap.
    #[must_use]
    pub fn new(to_handler: mpsc::Sender<Frame>, responses: mpsc::Receiver<Frame>) -> Self {
        Self { to_handler, responses }
    }

    /// Forward one continuation frame (`STREAM_START`/`CHUNK`/
    /// `STREAM_END`/`END`/`ERR`) bearing the peer request's id to
    /// whatever is servicing it.
    ///
    /// # Errors
    ///
    /// [`HostError::Closed`] if the servicing side has already finished
    /// or dropped its receiver.
    pub async fn forward_frame(&self, frame: Frame) -> Result<(), HostError> {
        self.to_handler.send(frame).await.map_err(|_| HostError::Closed)
    }

    /// A clone of the sender half, for registering this request's id in
    /// a continuation-frame routing table.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<Frame> {
        self.to_handler.clone()
    }
}

/// Resolves a `REQ`'s cap URN to a [`PeerRequestHandle`] that will
/// service it. Routing policy (which backend handles which URN) is
/// externalized behind this trait so a relay switch or a local router can
/// both plug into the same `Host` reader loop. `request_id` is handed to
/// the router so the backend can tag its response frames with the id the
/// calling plugin expects.
#[async_trait]
pub trait CapRouter: Send + Sync {
    /// Look up a handler for `cap_urn`, or fail with
    /// [`HostError::NoRouter`] if nothing accepts it.
    async fn route(&self, cap_urn: &CapUrn, request_id: Uuid) -> Result<PeerRequestHandle, HostError>;
}

/// A routing-table entry: a pattern URN and the sink that services
/// requests matching it.
pub struct RouteEntry {
    /// The pattern this entry's backend accepts requests for.
    pub pattern: CapUrn,
    /// Dispatch function building a fresh [`PeerRequestHandle`] for one
    /// accepted request, given that request's id.
    pub dispatch: Box<dyn Fn(Uuid) -> PeerRequestHandle + Send + Sync>,
}

/// Routes peer-invoked requests to the first registered backend whose
/// pattern `accepts` the request URN, in registration order (spec.md
/// §4.I: "picks the first host whose pattern accepts the request").
#[derive(Default)]
pub struct LocalPluginRouter {
    routes: Vec<RouteEntry>,
}

impl LocalPluginRouter {
    /// An empty router; every request fails with [`HostError::NoRouter`]
    /// until routes are registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a backend, tried after all previously registered ones.
    pub fn register(&mut self, entry: RouteEntry) {
        self.routes.push(entry);
    }
}

#[async_trait]
impl CapRouter for LocalPluginRouter {
    async fn route(&self, cap_urn: &CapUrn, request_id: Uuid) -> Result<PeerRequestHandle, HostError> {
        for entry in &self.routes {
            if entry.pattern.accepts(cap_urn) {
                return Ok((entry.dispatch)(request_id));
            }
        }
        Err(HostError::NoRouter(cap_urn.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capns_urn::CapUrn;

    #[tokio::test]
    async fn picks_first_accepting_route() {
        let mut router = LocalPluginRouter::new();
        let pattern = CapUrn::parse("cap:in=media:pdf;out=*").unwrap();
        router.register(RouteEntry {
            pattern,
            dispatch: Box::new(|_request_id| {
                let (to_handler, _rx) = mpsc::channel(4);
                let (_tx, responses) = mpsc::channel(4);
                PeerRequestHandle::new(to_handler, responses)
            }),
        });

        let request = CapUrn::parse("cap:in=media:pdf;out=\"media:image;png\"").unwrap();
        assert!(router.route(&request, Uuid::new_v4()).await.is_ok());

        let unmatched = CapUrn::parse("cap:in=media:txt;out=\"media:image;png\"").unwrap();
        assert!(router.route(&unmatched, Uuid::new_v4()).await.is_err());
    }
}
