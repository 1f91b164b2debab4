use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_admission, validate_interval};
use super::lifecycle::{validate_reschedule, validate_transition};
use super::{Engine, EngineError, Entity, WalCommand};

fn check_len(value: Option<&str>, max: usize, what: &'static str) -> Result<(), EngineError> {
    match value {
        Some(v) if v.len() > max => Err(EngineError::LimitExceeded(what)),
        _ => Ok(()),
    }
}

impl Engine {
    // ── Directory ────────────────────────────────────────────

    pub async fn register_resource(&self, id: Ulid, name: Option<String>) -> Result<(), EngineError> {
        check_len(name.as_deref(), MAX_NAME_LEN, "resource name too long")?;
        let _gate = self.snapshot_gate.read().await;
        if self.state.len() >= MAX_RESOURCES_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        let event = Event::ResourceRegistered { id, name: name.clone() };

        // Reserve the id with a retired placeholder: it is visible to
        // concurrent registrations but unbookable until the event is durable.
        let mut pending = ResourceState::new(id, name);
        pending.retired = true;
        let rs = Arc::new(RwLock::new(pending));
        match self.state.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(rs.clone());
            }
        }

        if let Err(e) = self.wal_append(&event).await {
            self.state.remove(&id);
            return Err(e);
        }
        rs.write().await.retired = false;
        Ok(())
    }

    /// Remove a resource from the directory. Refused while it holds bookings.
    pub async fn remove_resource(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.snapshot_gate.read().await;
        let mut guard = self.lock_resource(id).await?;
        if !guard.bookings.is_empty() {
            return Err(EngineError::HasBookings(id));
        }
        let event = Event::ResourceRemoved { id };
        self.wal_append(&event).await?;
        guard.retired = true;
        self.state.remove(&id);
        Ok(())
    }

    pub async fn register_client(&self, id: Ulid, name: Option<String>) -> Result<(), EngineError> {
        check_len(name.as_deref(), MAX_NAME_LEN, "client name too long")?;
        let _gate = self.snapshot_gate.read().await;
        if self.clients.len() >= MAX_CLIENTS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many clients"));
        }

        // Reserve first, then look at the directory: a finished registration
        // inserts its client before releasing the reservation.
        match self.pending_clients.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }
        if self.clients.contains_key(&id) {
            self.pending_clients.remove(&id);
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::ClientRegistered { id, name: name.clone() };
        let result = self.wal_append(&event).await;
        if result.is_ok() {
            self.clients.insert(id, ClientInfo { id, name });
        }
        self.pending_clients.remove(&id);
        result
    }

    /// Existing bookings keep their client id; only new bookings are refused.
    pub async fn remove_client(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.snapshot_gate.read().await;
        if !self.clients.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Client, id));
        }
        let event = Event::ClientRemoved { id };
        self.wal_append(&event).await?;
        self.clients.remove(&id);
        Ok(())
    }

    // ── Booking write path ───────────────────────────────────

    /// Admit `interval` on `resource_id` and record a confirmed booking.
    ///
    /// Check and write happen under the resource's write lock, so of two
    /// overlapping concurrent requests exactly one is admitted.
    pub async fn create_booking(
        &self,
        client_id: Ulid,
        resource_id: Ulid,
        interval: Interval,
        notes: Option<String>,
    ) -> Result<Booking, EngineError> {
        validate_interval(&interval)?;
        check_len(notes.as_deref(), MAX_NOTES_LEN, "notes too long")?;
        if !self.client_exists(&client_id) {
            return Err(EngineError::NotFound(Entity::Client, client_id));
        }

        let _gate = self.snapshot_gate.read().await;
        let mut guard = self.lock_resource(resource_id).await?;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_RESOURCE {
            return Err(EngineError::LimitExceeded("too many bookings on resource"));
        }

        let admission = check_admission(&guard, &interval, None);
        let outcome = if admission.is_admitted() { "admitted" } else { "rejected" };
        metrics::counter!(crate::observability::ADMISSIONS_TOTAL, "outcome" => outcome).increment(1);
        admission.into_result()?;

        let id = Ulid::new();
        let event = Event::BookingCreated {
            id,
            resource_id,
            client_id,
            interval,
            notes: notes.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(Booking {
            id,
            resource_id,
            client_id,
            interval,
            status: BookingStatus::Confirmed,
            cancellation_reason: None,
            notes,
        })
    }

    /// Move a booking along the lifecycle. `reason` is required for
    /// cancellation and ignored otherwise.
    pub async fn change_status(
        &self,
        booking_id: Ulid,
        status: BookingStatus,
        reason: Option<String>,
    ) -> Result<Booking, EngineError> {
        check_len(reason.as_deref(), MAX_REASON_LEN, "cancellation reason too long")?;
        let _gate = self.snapshot_gate.read().await;
        let mut guard = self.resolve_booking_write(&booking_id).await?;
        let current = guard
            .booking(booking_id)
            .map(|b| b.status)
            .ok_or(EngineError::NotFound(Entity::Booking, booking_id))?;

        let cancellation_reason = validate_transition(current, status, reason.as_deref())?;

        let event = Event::BookingStatusChanged {
            id: booking_id,
            resource_id: guard.id,
            status,
            cancellation_reason,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(crate::observability::TRANSITIONS_TOTAL, "status" => status.as_str()).increment(1);
        guard
            .booking(booking_id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Booking, booking_id))
    }

    /// Move a confirmed booking to `interval`, checked against every other
    /// booking on the resource. On conflict the booking is left unchanged.
    pub async fn reschedule_booking(
        &self,
        booking_id: Ulid,
        interval: Interval,
    ) -> Result<Booking, EngineError> {
        validate_interval(&interval)?;
        let _gate = self.snapshot_gate.read().await;
        let mut guard = self.resolve_booking_write(&booking_id).await?;
        let current = guard
            .booking(booking_id)
            .map(|b| b.status)
            .ok_or(EngineError::NotFound(Entity::Booking, booking_id))?;
        validate_reschedule(current)?;

        check_admission(&guard, &interval, Some(booking_id)).into_result()?;

        let event = Event::BookingRescheduled {
            id: booking_id,
            resource_id: guard.id,
            interval,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        guard
            .booking(booking_id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Booking, booking_id))
    }

    /// Administrative removal: bypasses the lifecycle and frees the slot.
    pub async fn delete_booking(&self, booking_id: Ulid) -> Result<Booking, EngineError> {
        let _gate = self.snapshot_gate.read().await;
        let mut guard = self.resolve_booking_write(&booking_id).await?;
        let removed = guard
            .booking(booking_id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Booking, booking_id))?;
        let event = Event::BookingDeleted {
            id: booking_id,
            resource_id: guard.id,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(removed)
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.snapshot_gate.write().await;
        let mut events = Vec::new();

        for entry in self.clients.iter() {
            let client = entry.value();
            events.push(Event::ClientRegistered {
                id: client.id,
                name: client.name.clone(),
            });
        }

        let resources: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        for rs in resources {
            let guard = rs.read().await;
            if guard.retired {
                continue;
            }
            events.push(Event::ResourceRegistered {
                id: guard.id,
                name: guard.name.clone(),
            });
            for b in &guard.bookings {
                events.push(Event::BookingCreated {
                    id: b.id,
                    resource_id: b.resource_id,
                    client_id: b.client_id,
                    interval: b.interval,
                    notes: b.notes.clone(),
                });
                if b.status != BookingStatus::Confirmed {
                    events.push(Event::BookingStatusChanged {
                        id: b.id,
                        resource_id: b.resource_id,
                        status: b.status,
                        cancellation_reason: b.cancellation_reason.clone(),
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
