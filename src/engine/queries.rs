use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError, Entity, SharedResourceState};

fn sort_by_start(bookings: &mut [Booking]) {
    bookings.sort_by_key(|b| (b.interval.start(), b.id));
}

impl Engine {
    pub fn resource_exists(&self, id: &Ulid) -> bool {
        self.state.contains_key(id)
    }

    pub fn client_exists(&self, id: &Ulid) -> bool {
        self.clients.contains_key(id)
    }

    /// Snapshot the lock handles so no map shard is held across an await.
    fn resource_handles(&self) -> Vec<SharedResourceState> {
        self.state.iter().map(|e| e.value().clone()).collect()
    }

    /// Run `select` against every resource and return the bookings in start order.
    async fn collect_bookings<F>(&self, select: F) -> Vec<Booking>
    where
        F: FnMut(&ResourceState, &mut Vec<Booking>),
    {
        self.collect_from(self.resource_handles(), select).await
    }

    /// Same as `collect_bookings`, over the given resources only.
    async fn collect_from<F>(&self, handles: Vec<SharedResourceState>, mut select: F) -> Vec<Booking>
    where
        F: FnMut(&ResourceState, &mut Vec<Booking>),
    {
        let mut out = Vec::new();
        for rs in handles {
            let guard = rs.read().await;
            if !guard.retired {
                select(&guard, &mut out);
            }
        }
        sort_by_start(&mut out);
        out
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let rs = self
            .get_resource_for_booking(&id)
            .and_then(|rid| self.get_resource(&rid))
            .ok_or(EngineError::NotFound(Entity::Booking, id))?;
        let guard = rs.read().await;
        guard
            .booking(id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Booking, id))
    }

    /// Bookings of every status overlapping `window`, ordered by start.
    /// Uses the same overlap predicate as admission.
    pub async fn find_overlapping(&self, window: &Interval, resource_id: Option<Ulid>) -> Vec<Booking> {
        let handles = match resource_id {
            Some(rid) => self.get_resource(&rid).into_iter().collect(),
            None => self.resource_handles(),
        };
        self.collect_from(handles, |rs, out| out.extend(rs.overlapping(window).cloned()))
            .await
    }

    pub async fn query_by_window(&self, start: Ms, end: Ms) -> Result<Vec<Booking>, EngineError> {
        let window = Interval::new(start, end)?;
        Ok(self.find_overlapping(&window, None).await)
    }

    /// All bookings on a resource, every status, in start order.
    pub async fn query_by_resource(&self, resource_id: Ulid) -> Vec<Booking> {
        let handles = self.get_resource(&resource_id).into_iter().collect();
        self.collect_from(handles, |rs, out| out.extend(rs.bookings.iter().cloned()))
            .await
    }

    pub async fn query_by_client(&self, client_id: Ulid) -> Vec<Booking> {
        self.collect_bookings(|rs, out| {
            out.extend(rs.bookings.iter().filter(|b| b.client_id == client_id).cloned())
        })
        .await
    }

    pub async fn query_by_status(&self, status: BookingStatus) -> Vec<Booking> {
        self.collect_bookings(|rs, out| {
            out.extend(rs.bookings.iter().filter(|b| b.status == status).cloned())
        })
        .await
    }

    pub async fn all_bookings(&self) -> Vec<Booking> {
        self.collect_bookings(|rs, out| out.extend(rs.bookings.iter().cloned()))
            .await
    }

    pub async fn list_resources(&self) -> Vec<ResourceInfo> {
        let mut out = Vec::new();
        for rs in self.resource_handles() {
            let guard = rs.read().await;
            if !guard.retired {
                out.push(ResourceInfo {
                    id: guard.id,
                    name: guard.name.clone(),
                });
            }
        }
        out.sort_by_key(|r| r.id);
        out
    }

    pub fn list_clients(&self) -> Vec<ClientInfo> {
        let mut out: Vec<ClientInfo> = self.clients.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|c| c.id);
        out
    }
}
