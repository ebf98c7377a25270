// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`Switch`]: routes requests and their continuations across N
//! [`crate::Master`]s by cap urn (spec.md §4.K). Maintains three tables —
//! an aggregate cap table rebuilt on manifest change or master death, a
//! request routing table keyed by request id, and the subset of those ids
//! that are peer-invoked (plugin-to-plugin across two different masters)
//! — and reuses the extract-then-notify locking discipline
//! `capns_host::PendingRequests` uses for its own tables.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use capns_catalog::Manifest;
use capns_frame::{Frame, FrameId, FrameType};
use capns_transport::{FrameReader, FrameWriter, Limits};
use capns_urn::CapUrn;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::master::Master;
use crate::RelayError;

/// Where a routed frame came from or is going to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteEndpoint {
    /// The switch's own owner — whatever process is driving it, not any
    /// master (spec.md's `ENGINE_SOURCE` sentinel).
    Engine,
    /// A specific registered master, by index.
    Master(usize),
}

struct Routing {
    source: RouteEndpoint,
    dest: RouteEndpoint,
}

struct MasterSlot<W> {
    master: Arc<Master<W>>,
    caps: Vec<CapUrn>,
    alive: bool,
}

/// Routes `REQ`s and their continuations across every registered master,
/// by aggregate cap urn.
pub struct Switch<W> {
    masters: Mutex<Vec<MasterSlot<W>>>,
    cap_table: Mutex<Vec<(CapUrn, usize)>>,
    request_routing: Mutex<HashMap<Uuid, Routing>>,
    peer_requests: Mutex<HashSet<Uuid>>,
    engine_inbound: mpsc::Sender<Frame>,
}

impl<W> Switch<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Build an empty switch and the receiver its owner (the "engine")
    /// reads routed frames from.
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(256);
        (
            Self {
                masters: Mutex::new(Vec::new()),
                cap_table: Mutex::new(Vec::new()),
                request_routing: Mutex::new(HashMap::new()),
                peer_requests: Mutex::new(HashSet::new()),
                engine_inbound: tx,
            },
            rx,
        )
    }

    /// Connect to a slave over `reader`/`writer`, register the resulting
    /// master, and spawn the task that drives its inbound frames into
    /// this switch. Returns the new master's stable index.
    ///
    /// # Errors
    ///
    /// Propagates [`Master::connect`]'s [`RelayError::HandshakeFailed`],
    /// and [`RelayError::InvalidManifest`] if the slave's announced
    /// manifest doesn't deserialize.
    pub async fn connect_master<R>(self: &Arc<Self>, reader: FrameReader<R>, writer: FrameWriter<W>) -> Result<usize, RelayError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let (master, _reader_task) = Master::connect(reader, writer, inbound_tx).await?;
        let index = self.register_master(Arc::new(master))?;
        tokio::spawn(Arc::clone(self).run_master_inbound(index, inbound_rx));
        Ok(index)
    }

    /// Register an already-connected master at a fresh index, parsing its
    /// manifest and folding its caps into the aggregate cap table.
    ///
    /// # Errors
    ///
    /// [`RelayError::InvalidManifest`] if the master's announced manifest
    /// doesn't deserialize as JSON.
    pub fn register_master(&self, master: Arc<Master<W>>) -> Result<usize, RelayError> {
        let manifest_bytes = master.manifest_bytes();
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes).map_err(|err| RelayError::InvalidManifest(err.to_string()))?;
        let caps = manifest.caps.into_iter().map(|cap| cap.urn).collect();

        let mut masters = self.masters.lock().expect("masters lock poisoned");
        let index = masters.len();
        masters.push(MasterSlot { master, caps, alive: true });
        drop(masters);
        self.rebuild_cap_table();
        Ok(index)
    }

    fn rebuild_cap_table(&self) {
        let table = {
            let masters = self.masters.lock().expect("masters lock poisoned");
            let mut table = Vec::new();
            for (index, slot) in masters.iter().enumerate() {
                if !slot.alive {
                    continue;
                }
                for urn in &slot.caps {
                    table.push((urn.clone(), index));
                }
            }
            table
        };
        *self.cap_table.lock().expect("cap table lock poisoned") = table;
    }

    /// Resolve the master that should service `request`: an exact match
    /// first, else the first master whose registered urn accepts it.
    fn resolve(&self, request: &CapUrn) -> Option<usize> {
        let table = self.cap_table.lock().expect("cap table lock poisoned");
        if let Some((_, index)) = table.iter().find(|(urn, _)| urn == request) {
            return Some(*index);
        }
        table.iter().find(|(urn, _)| urn.accepts(request)).map(|(_, index)| *index)
    }

    /// Drive a registered master's inbound frames into this switch until
    /// its channel closes (the master died), then mark it dead.
    pub async fn run_master_inbound(self: Arc<Self>, index: usize, mut inbound: mpsc::Receiver<Frame>) {
        while let Some(frame) = inbound.recv().await {
            let _ = self.handle_inbound(index, frame).await;
        }
        self.master_died(index).await;
    }

    /// Issue a `REQ` on the engine's behalf: resolve its destination
    /// master by cap urn, record the routing entry, and forward.
    ///
    /// # Errors
    ///
    /// [`RelayError::NoRoute`] if no registered master accepts `cap_urn`;
    /// [`RelayError::MasterDead`]/[`RelayError::SendFailed`] if the
    /// forward fails.
    pub async fn route_engine_request(&self, request_id: Uuid, cap_urn: &CapUrn, frame: Frame) -> Result<(), RelayError> {
        let index = self.resolve(cap_urn).ok_or_else(|| RelayError::NoRoute(cap_urn.to_string()))?;
        self.request_routing.lock().expect("routing lock poisoned").insert(
            request_id,
            Routing {
                source: RouteEndpoint::Engine,
                dest: RouteEndpoint::Master(index),
            },
        );
        self.forward_to(index, frame).await
    }

    /// Forward a continuation frame the engine is sending for a request it
    /// already issued (or was routed a peer `REQ` for).
    ///
    /// # Errors
    ///
    /// [`RelayError::UnknownRequest`] if `request_id` has no open routing
    /// entry whose destination is a master.
    pub async fn forward_from_engine(&self, request_id: Uuid, frame: Frame) -> Result<(), RelayError> {
        let dest = {
            let table = self.request_routing.lock().expect("routing lock poisoned");
            table.get(&request_id).map(|routing| routing.dest)
        };
        let Some(RouteEndpoint::Master(index)) = dest else {
            return Err(RelayError::UnknownRequest(request_id));
        };
        if matches!(frame.frame_type, FrameType::End | FrameType::Err) {
            self.request_routing.lock().expect("routing lock poisoned").remove(&request_id);
            self.peer_requests.lock().expect("peer requests lock poisoned").remove(&request_id);
        }
        self.forward_to(index, frame).await
    }

    /// Handle one frame arriving from master `source`: a fresh `REQ` is
    /// routed as a peer invocation across masters (or to the engine, if no
    /// other master accepts it — treated the same as an engine-bound
    /// continuation, below); any other frame is routed by request id to
    /// whichever side isn't `source`.
    async fn handle_inbound(&self, source: usize, frame: Frame) -> Result<(), RelayError> {
        let id = match &frame.id {
            FrameId::Uuid(id) => *id,
            FrameId::Number(_) => return Ok(()),
        };

        if frame.frame_type == FrameType::Req {
            let cap_text = frame.cap.clone().ok_or_else(|| RelayError::NoRoute("REQ missing cap urn".to_owned()))?;
            let cap_urn = CapUrn::parse(&cap_text).map_err(|_| RelayError::NoRoute(cap_text))?;
            let dest_index = self.resolve(&cap_urn).ok_or_else(|| RelayError::NoRoute(cap_urn.to_string()))?;
            self.request_routing.lock().expect("routing lock poisoned").insert(
                id,
                Routing {
                    source: RouteEndpoint::Master(source),
                    dest: RouteEndpoint::Master(dest_index),
                },
            );
            self.peer_requests.lock().expect("peer requests lock poisoned").insert(id);
            return self.forward_to(dest_index, frame).await;
        }

        let route = {
            let table = self.request_routing.lock().expect("routing lock poisoned");
            table.get(&id).map(|routing| (routing.source, routing.dest))
        };
        let Some((route_source, route_dest)) = route else {
            return Ok(());
        };
        let terminal = matches!(frame.frame_type, FrameType::End | FrameType::Err);
        let target = if route_source == RouteEndpoint::Master(source) { route_dest } else { route_source };

        match target {
            RouteEndpoint::Engine => {
                let _ = self.engine_inbound.send(frame).await;
            }
            RouteEndpoint::Master(index) => {
                self.forward_to(index, frame).await?;
            }
        }

        if terminal {
            self.request_routing.lock().expect("routing lock poisoned").remove(&id);
            self.peer_requests.lock().expect("peer requests lock poisoned").remove(&id);
        }
        Ok(())
    }

    async fn forward_to(&self, index: usize, frame: Frame) -> Result<(), RelayError> {
        let master = {
            let masters = self.masters.lock().expect("masters lock poisoned");
            masters.get(index).filter(|slot| slot.alive).map(|slot| Arc::clone(&slot.master))
        };
        match master {
            Some(master) => master.send(frame).await,
            None => Err(RelayError::MasterDead(index)),
        }
    }

    /// Mark master `index` dead: drop it from the cap table, fail every
    /// routing entry that named it as a destination with a synthetic
    /// `ERR` back to that entry's source, and rebuild aggregate
    /// capabilities. Returns `true` if every registered master is now
    /// dead (the switch has nothing left to route to).
    pub async fn master_died(&self, index: usize) -> bool {
        {
            let mut masters = self.masters.lock().expect("masters lock poisoned");
            if let Some(slot) = masters.get_mut(index) {
                slot.alive = false;
            }
        }
        self.rebuild_cap_table();

        let orphaned: Vec<(Uuid, RouteEndpoint)> = {
            let mut table = self.request_routing.lock().expect("routing lock poisoned");
            let mut found = Vec::new();
            table.retain(|id, routing| {
                if routing.dest == RouteEndpoint::Master(index) {
                    found.push((*id, routing.source));
                    false
                } else {
                    true
                }
            });
            found
        };

        for (id, source) in orphaned {
            self.peer_requests.lock().expect("peer requests lock poisoned").remove(&id);
            let err = master_died_err_frame(id, index);
            match source {
                RouteEndpoint::Engine => {
                    let _ = self.engine_inbound.send(err).await;
                }
                RouteEndpoint::Master(src_index) => {
                    let _ = self.forward_to(src_index, err).await;
                }
            }
        }

        self.all_dead()
    }

    /// `true` iff at least one master has ever been registered and every
    /// one of them has died.
    #[must_use]
    pub fn all_dead(&self) -> bool {
        let masters = self.masters.lock().expect("masters lock poisoned");
        !masters.is_empty() && masters.iter().all(|slot| !slot.alive)
    }

    /// `true` iff `request_id` is a peer-invoked (plugin-to-plugin,
    /// possibly cross-master) request rather than one the engine issued.
    #[must_use]
    pub fn is_peer_request(&self, request_id: Uuid) -> bool {
        self.peer_requests.lock().expect("peer requests lock poisoned").contains(&request_id)
    }
}

fn master_died_err_frame(id: Uuid, index: usize) -> Frame {
    use std::collections::BTreeMap;

    use ciborium::Value;

    let mut meta = BTreeMap::new();
    meta.insert("code".to_owned(), Value::Text("MASTER_DIED".to_owned()));
    meta.insert("message".to_owned(), Value::Text(format!("master {index} died")));
    let mut frame = Frame::new(2, FrameType::Err, FrameId::Uuid(id), 0);
    frame.meta = Some(meta);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use capns_catalog::Cap;
    use capns_transport::SharedLimits;
    use tokio::io::duplex;

    async fn connected_master(manifest: &Manifest) -> (Arc<Master<tokio::io::WriteHalf<tokio::io::DuplexStream>>>, mpsc::Receiver<Frame>, tokio::io::ReadHalf<tokio::io::DuplexStream>) {
        let (slave, switch_side) = duplex(1 << 20);
        let (_slave_reader, mut slave_writer) = tokio::io::split(slave);
        let (switch_reader, switch_writer) = tokio::io::split(switch_side);

        let announce = FrameWriter::new(&mut slave_writer, SharedLimits::default());
        let manifest_bytes = serde_json::to_vec(manifest).unwrap();
        announce.write_frame(&crate::notify::relay_notify_frame(manifest_bytes, Limits::default())).await.unwrap();

        let (tx, rx) = mpsc::channel(64);
        let (master, _task) = Master::connect(
            FrameReader::new(switch_reader, SharedLimits::default()),
            FrameWriter::new(switch_writer, SharedLimits::default()),
            tx,
        )
        .await
        .unwrap();
        (Arc::new(master), rx, _slave_reader)
    }

    fn manifest_with_cap(urn: &str) -> Manifest {
        Manifest {
            name: "n".into(),
            version: "0.1.0".into(),
            description: "d".into(),
            author: None,
            page_url: None,
            caps: vec![Cap {
                urn: CapUrn::parse(urn).unwrap(),
                title: "t".into(),
                description: None,
                command: "c".into(),
                args: vec![],
                output: None,
                media_specs: vec![],
            }],
        }
    }

    #[tokio::test]
    async fn exact_match_wins_over_broader_accepting_pattern() {
        let (switch, _engine_rx) = Switch::new();
        let switch = Arc::new(switch);

        let (narrow, _rx1, _keepalive1) = connected_master(&manifest_with_cap("cap:in=media:pdf;out=media:pdf;op=exact")).await;
        let (broad, _rx2, _keepalive2) = connected_master(&manifest_with_cap("cap:in=media:pdf;out=*;op=*")).await;
        switch.register_master(narrow).unwrap();
        switch.register_master(broad).unwrap();

        let request = CapUrn::parse("cap:in=media:pdf;out=media:pdf;op=exact").unwrap();
        let index = switch.resolve(&request).unwrap();
        assert_eq!(index, 0);
    }

    #[tokio::test]
    async fn no_route_when_nothing_accepts() {
        let (switch, _engine_rx) = Switch::new();
        let (master, _rx, _keepalive) = connected_master(&manifest_with_cap("cap:in=media:pdf;out=media:pdf;op=x")).await;
        switch.register_master(master).unwrap();

        let request = CapUrn::parse("cap:in=media:png;out=media:png;op=y").unwrap();
        let frame = Frame::new(2, FrameType::Req, FrameId::Uuid(Uuid::new_v4()), 0).with_cap(request.to_string());
        let err = switch.route_engine_request(Uuid::new_v4(), &request, frame).await.unwrap_err();
        assert!(matches!(err, RelayError::NoRoute(_)));
    }

    #[tokio::test]
    async fn master_death_orphans_routed_requests_with_synthetic_err() {
        let (switch, mut engine_rx) = Switch::new();
        let (master, _rx, _keepalive) = connected_master(&manifest_with_cap("cap:in=media:pdf;out=media:pdf;op=x")).await;
        let index = switch.register_master(master).unwrap();

        let request = CapUrn::parse("cap:in=media:pdf;out=media:pdf;op=x").unwrap();
        let id = Uuid::new_v4();
        let frame = Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0).with_cap(request.to_string());
        switch.route_engine_request(id, &request, frame).await.unwrap();

        let all_dead = switch.master_died(index).await;
        assert!(all_dead);

        let err_frame = engine_rx.recv().await.unwrap();
        assert_eq!(err_frame.frame_type, FrameType::Err);
        assert_eq!(err_frame.id, FrameId::Uuid(id));
    }

    #[tokio::test]
    async fn peer_req_from_one_master_routes_to_another_and_is_tracked() {
        let (switch, _engine_rx) = Switch::new();
        let (master_a, _rx_a, _keepalive_a) = connected_master(&manifest_with_cap("cap:in=media:txt;out=media:txt;op=a")).await;
        let (master_b, mut rx_b, _keepalive_b) = connected_master(&manifest_with_cap("cap:in=media:txt;out=media:txt;op=b")).await;
        let index_a = switch.register_master(master_a).unwrap();
        let _index_b = switch.register_master(master_b).unwrap();

        let id = Uuid::new_v4();
        let req = Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0).with_cap("cap:in=media:txt;out=media:txt;op=b");
        switch.handle_inbound(index_a, req).await.unwrap();

        assert!(switch.is_peer_request(id));
        let forwarded = rx_b.recv().await.unwrap();
        assert_eq!(forwarded.frame_type, FrameType::Req);

        let end = Frame::new(2, FrameType::End, FrameId::Uuid(id), 1);
        switch.handle_inbound(_index_b, end).await.unwrap();
        assert!(!switch.is_peer_request(id));
    }
}
