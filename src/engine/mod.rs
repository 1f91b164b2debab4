mod conflict;
mod error;
mod lifecycle;
mod mutations;
mod queries;

pub use conflict::{check_admission, Admission};
pub use error::{EngineError, Entity, TransitionError};
pub use lifecycle::{validate_reschedule, validate_transition};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

/// One resource's bookings behind the lock that serializes its admissions.
pub type SharedResourceState = Arc<RwLock<ResourceState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// Waits for one append, drains whatever else is already queued, then pays a
/// single fsync for the whole batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        commit_batch(&mut wal, &mut batch);
        // Non-append commands must observe every append queued before them.
        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event))
        .and_then(|()| wal.flush_sync());
    if let Err(e) = &result {
        // Callers of this batch are told it failed; none of its bytes may
        // stay in front of the next batch.
        tracing::error!("WAL batch of {} failed: {e}", batch.len());
        if let Err(rollback_err) = wal.rollback() {
            tracing::error!("WAL rollback failed: {rollback_err}");
        }
    }
    result
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

pub struct Engine {
    pub state: DashMap<Ulid, SharedResourceState>,
    pub(super) clients: DashMap<Ulid, ClientInfo>,
    /// Client ids whose registration event is still being written.
    pub(super) pending_clients: DashMap<Ulid, ()>,
    /// Reverse lookup: booking id → resource id
    pub(super) booking_to_resource: DashMap<Ulid, Ulid>,
    /// Held shared by every mutation and exclusively by compaction, so a
    /// snapshot never misses an append that is still in flight.
    pub(super) snapshot_gate: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

/// Apply a booking event to its resource. The caller holds the lock.
fn apply_to_resource(rs: &mut ResourceState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::BookingCreated {
            id,
            resource_id,
            client_id,
            interval,
            notes,
        } => {
            rs.insert_booking(Booking {
                id: *id,
                resource_id: *resource_id,
                client_id: *client_id,
                interval: *interval,
                status: BookingStatus::Confirmed,
                cancellation_reason: None,
                notes: notes.clone(),
            });
            index.insert(*id, *resource_id);
        }
        Event::BookingStatusChanged {
            id,
            status,
            cancellation_reason,
            ..
        } => {
            if let Some(b) = rs.booking_mut(*id) {
                b.status = *status;
                b.cancellation_reason = cancellation_reason.clone();
            }
        }
        Event::BookingRescheduled { id, interval, .. } => {
            // Re-insert to keep the start ordering.
            if let Some(mut b) = rs.remove_booking(*id) {
                b.interval = *interval;
                rs.insert_booking(b);
            }
        }
        Event::BookingDeleted { id, .. } => {
            rs.remove_booking(*id);
            index.remove(id);
        }
        // Directory events are handled at the DashMap level, not here
        Event::ResourceRegistered { .. }
        | Event::ResourceRemoved { .. }
        | Event::ClientRegistered { .. }
        | Event::ClientRemoved { .. } => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let clients = DashMap::new();
        let booking_to_resource = DashMap::new();

        // Rebuild plain state first; locks are only wrapped around it once
        // replay is done.
        let mut resources: HashMap<Ulid, ResourceState> = HashMap::new();
        for event in &events {
            match event {
                Event::ResourceRegistered { id, name } => {
                    resources.insert(*id, ResourceState::new(*id, name.clone()));
                }
                Event::ResourceRemoved { id } => {
                    resources.remove(id);
                }
                Event::ClientRegistered { id, name } => {
                    clients.insert(*id, ClientInfo { id: *id, name: name.clone() });
                }
                Event::ClientRemoved { id } => {
                    clients.remove(id);
                }
                other => {
                    if let Some(resource_id) = event_resource_id(other)
                        && let Some(rs) = resources.get_mut(&resource_id)
                    {
                        apply_to_resource(rs, other, &booking_to_resource);
                    }
                }
            }
        }

        tracing::debug!(
            events = events.len(),
            resources = resources.len(),
            clients = clients.len(),
            "replayed WAL {}",
            wal_path.display()
        );

        let state = resources
            .into_iter()
            .map(|(id, rs)| (id, Arc::new(RwLock::new(rs))))
            .collect();

        Ok(Self {
            state,
            clients,
            pending_clients: DashMap::new(),
            booking_to_resource,
            snapshot_gate: RwLock::new(()),
            wal_tx,
        })
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_resource(&self, id: &Ulid) -> Option<SharedResourceState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn get_resource_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_resource.get(booking_id).map(|e| *e.value())
    }

    /// WAL-append then apply. Memory is only touched once the event is durable.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut ResourceState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_resource(rs, event, &self.booking_to_resource);
        Ok(())
    }

    /// Acquire a resource's write lock, refusing resources retired meanwhile.
    pub(super) async fn lock_resource(
        &self,
        resource_id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<ResourceState>, EngineError> {
        let rs = self
            .get_resource(&resource_id)
            .ok_or(EngineError::NotFound(Entity::Resource, resource_id))?;
        let guard = rs.write_owned().await;
        if guard.retired {
            return Err(EngineError::NotFound(Entity::Resource, resource_id));
        }
        Ok(guard)
    }

    /// Lookup booking → resource, acquire the resource's write lock, and make
    /// sure the booking is still there once the lock is held.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<ResourceState>, EngineError> {
        let resource_id = self
            .get_resource_for_booking(booking_id)
            .ok_or(EngineError::NotFound(Entity::Booking, *booking_id))?;
        let guard = self.lock_resource(resource_id).await?;
        if guard.booking(*booking_id).is_none() {
            return Err(EngineError::NotFound(Entity::Booking, *booking_id));
        }
        Ok(guard)
    }
}

/// Extract the resource_id from a booking event.
fn event_resource_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::BookingCreated { resource_id, .. }
        | Event::BookingStatusChanged { resource_id, .. }
        | Event::BookingRescheduled { resource_id, .. }
        | Event::BookingDeleted { resource_id, .. } => Some(*resource_id),
        Event::ResourceRegistered { .. }
        | Event::ResourceRemoved { .. }
        | Event::ClientRegistered { .. }
        | Event::ClientRemoved { .. } => None,
    }
}
