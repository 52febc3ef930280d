use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use radar_common::geo::BoundingBox;
use radar_common::{Developer, DeveloperEvent, GeoPoint, RemovedDeveloper};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

pub type ConnectionId = u64;

/// Above this many cells a subscription is kept in the wide set instead.
const MAX_CELLS_PER_SUBSCRIPTION: usize = 1024;

/// What a client last searched for.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub center: GeoPoint,
    pub techs: Vec<String>,
}

/// A `cell_degrees` grid square, the unit of room membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub lat: i32,
    pub lon: i32,
}

impl CellKey {
    pub fn of(point: &GeoPoint, cell_degrees: f64) -> Self {
        Self {
            lat: (point.latitude() / cell_degrees).floor() as i32,
            lon: (point.longitude() / cell_degrees).floor() as i32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Rooms {
    None,
    Cells(Vec<CellKey>),
    Wide,
}

struct Subscriber {
    tx: mpsc::Sender<DeveloperEvent>,
    subscription: Option<Subscription>,
    rooms: Rooms,
}

#[derive(Default)]
struct HubInner {
    subscribers: HashMap<ConnectionId, Subscriber>,
    rooms: HashMap<CellKey, HashSet<ConnectionId>>,
    wide: HashSet<ConnectionId>,
}

impl HubInner {
    fn leave_rooms(&mut self, id: ConnectionId, rooms: &Rooms) {
        match rooms {
            Rooms::None => {}
            Rooms::Wide => {
                self.wide.remove(&id);
            }
            Rooms::Cells(cells) => {
                for cell in cells {
                    if let Some(members) = self.rooms.get_mut(cell) {
                        members.remove(&id);
                        if members.is_empty() {
                            self.rooms.remove(cell);
                        }
                    }
                }
            }
        }
    }

    fn join_rooms(&mut self, id: ConnectionId, rooms: &Rooms) {
        match rooms {
            Rooms::None => {}
            Rooms::Wide => {
                self.wide.insert(id);
            }
            Rooms::Cells(cells) => {
                for cell in cells {
                    self.rooms.entry(*cell).or_default().insert(id);
                }
            }
        }
    }
}

/// In-memory pub/sub keyed by search area.
///
/// Delivery is best-effort: each connection has a bounded queue and events
/// that do not fit are dropped.
pub struct LiveHub {
    radius_km: f64,
    cell_degrees: f64,
    queue_capacity: usize,
    next_id: AtomicU64,
    inner: RwLock<HubInner>,
}

impl LiveHub {
    pub fn new(radius_km: f64, cell_degrees: f64, queue_capacity: usize) -> Self {
        Self {
            radius_km,
            cell_degrees,
            queue_capacity: queue_capacity.max(1),
            next_id: AtomicU64::new(1),
            inner: RwLock::new(HubInner::default()),
        }
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Register a connection with no subscription yet.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<DeveloperEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.inner.write().subscribers.insert(
            id,
            Subscriber {
                tx,
                subscription: None,
                rooms: Rooms::None,
            },
        );
        debug!("[Hub] connection {} opened", id);
        (id, rx)
    }

    /// Replace a connection's subscription, moving it to the new rooms.
    /// Returns false for an unknown connection.
    pub fn subscribe(&self, id: ConnectionId, subscription: Subscription) -> bool {
        let rooms = self.rooms_for(&subscription.center);
        let mut inner = self.inner.write();

        let Some(subscriber) = inner.subscribers.get_mut(&id) else {
            return false;
        };
        let old_rooms = std::mem::replace(&mut subscriber.rooms, rooms.clone());
        subscriber.subscription = Some(subscription);

        inner.leave_rooms(id, &old_rooms);
        inner.join_rooms(id, &rooms);
        true
    }

    /// Keep the connection but stop delivering to it.
    pub fn unsubscribe(&self, id: ConnectionId) {
        let mut inner = self.inner.write();
        let Some(subscriber) = inner.subscribers.get_mut(&id) else {
            return;
        };
        let old_rooms = std::mem::replace(&mut subscriber.rooms, Rooms::None);
        subscriber.subscription = None;
        inner.leave_rooms(id, &old_rooms);
    }

    pub fn disconnect(&self, id: ConnectionId) {
        let mut inner = self.inner.write();
        if let Some(subscriber) = inner.subscribers.remove(&id) {
            inner.leave_rooms(id, &subscriber.rooms);
            debug!("[Hub] connection {} closed", id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }

    pub fn room_count(&self) -> usize {
        self.inner.read().rooms.len()
    }

    /// Push a new registration to matching subscribers. Returns how many
    /// queues accepted it.
    pub fn publish_new(&self, dev: &Developer) -> usize {
        let event = DeveloperEvent::NewDev(dev.clone());
        let delivered = self.deliver(&dev.location, &event, |sub| dev.has_any_tech(&sub.techs));
        info!(
            "[Hub] new developer {} delivered to {} subscriber(s)",
            dev.github_username, delivered
        );
        delivered
    }

    /// Tell subscribers covering a removed developer's location.
    pub fn publish_removed(&self, dev: &Developer) -> usize {
        let event = DeveloperEvent::RemovedDev(RemovedDeveloper { id: dev.id.clone() });
        self.deliver(&dev.location, &event, |_| true)
    }

    fn deliver<F>(&self, point: &GeoPoint, event: &DeveloperEvent, wants: F) -> usize
    where
        F: Fn(&Subscription) -> bool,
    {
        let cell = CellKey::of(point, self.cell_degrees);
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let inner = self.inner.read();
            let candidates = inner
                .rooms
                .get(&cell)
                .into_iter()
                .flatten()
                .chain(inner.wide.iter());

            for id in candidates {
                let Some(subscriber) = inner.subscribers.get(id) else {
                    continue;
                };
                let Some(subscription) = &subscriber.subscription else {
                    continue;
                };
                if !subscription.center.within_km(point, self.radius_km) || !wants(subscription) {
                    continue;
                }

                match subscriber.tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        debug!("[Hub] queue full for connection {}, dropping event", id);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        for id in closed {
            self.disconnect(id);
        }

        delivered
    }

    fn rooms_for(&self, center: &GeoPoint) -> Rooms {
        let bbox = BoundingBox::around(center, self.radius_km);
        let cell = self.cell_degrees;

        let lat_min = (bbox.min_lat / cell).floor() as i64;
        let lat_max = (bbox.max_lat / cell).floor() as i64;
        let lon_spans: Vec<(i64, i64)> = bbox
            .lon_ranges()
            .into_iter()
            .map(|(min, max)| ((min / cell).floor() as i64, (max / cell).floor() as i64))
            .collect();

        let lat_count = (lat_max - lat_min + 1) as usize;
        let lon_count: usize = lon_spans.iter().map(|(a, b)| (b - a + 1) as usize).sum();
        if lat_count.saturating_mul(lon_count) > MAX_CELLS_PER_SUBSCRIPTION {
            return Rooms::Wide;
        }

        let mut cells = Vec::with_capacity(lat_count * lon_count);
        for lat in lat_min..=lat_max {
            for (lon_min, lon_max) in &lon_spans {
                for lon in *lon_min..=*lon_max {
                    cells.push(CellKey {
                        lat: lat as i32,
                        lon: lon as i32,
                    });
                }
            }
        }
        Rooms::Cells(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn dev(id: &str, techs: &[&str], lat: f64, lon: f64) -> Developer {
        Developer {
            id: id.to_string(),
            github_username: id.to_string(),
            name: id.to_string(),
            avatar_url: String::new(),
            bio: None,
            techs: techs.iter().map(|t| t.to_string()).collect(),
            location: point(lat, lon),
        }
    }

    fn sub(lat: f64, lon: f64, techs: &[&str]) -> Subscription {
        Subscription {
            center: point(lat, lon),
            techs: techs.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_delivers_only_to_matching_area_and_techs() {
        let hub = LiveHub::new(10.0, 0.1, 8);
        let (rust_sp, mut rx_rust_sp) = hub.connect();
        let (java_sp, mut rx_java_sp) = hub.connect();
        let (rust_rio, mut rx_rust_rio) = hub.connect();

        hub.subscribe(rust_sp, sub(-23.55, -46.63, &["Rust"]));
        hub.subscribe(java_sp, sub(-23.55, -46.63, &["Java"]));
        hub.subscribe(rust_rio, sub(-22.90, -43.20, &["Rust"]));

        let new_dev = dev("ferris", &["Rust", "C"], -23.56, -46.65);
        assert_eq!(hub.publish_new(&new_dev), 1);

        match rx_rust_sp.try_recv().unwrap() {
            DeveloperEvent::NewDev(d) => assert_eq!(d.id, "ferris"),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx_java_sp.try_recv().is_err());
        assert!(rx_rust_rio.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribed_connection_gets_nothing() {
        let hub = LiveHub::new(10.0, 0.1, 8);
        let (_id, mut rx) = hub.connect();
        assert_eq!(hub.publish_new(&dev("a", &["Rust"], 0.0, 0.0)), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resubscribe_moves_rooms() {
        let hub = LiveHub::new(10.0, 0.1, 8);
        let (id, mut rx) = hub.connect();

        hub.subscribe(id, sub(-23.55, -46.63, &["Rust"]));
        assert!(hub.room_count() > 0);

        hub.subscribe(id, sub(-22.90, -43.20, &["Rust"]));

        assert_eq!(hub.publish_new(&dev("sp", &["Rust"], -23.55, -46.63)), 0);
        assert_eq!(hub.publish_new(&dev("rio", &["Rust"], -22.90, -43.20)), 1);
        assert!(matches!(rx.try_recv(), Ok(DeveloperEvent::NewDev(d)) if d.id == "rio"));
    }

    #[tokio::test]
    async fn test_point_on_cell_border_is_found() {
        let hub = LiveHub::new(10.0, 0.1, 8);
        let (id, _rx) = hub.connect();
        hub.subscribe(id, sub(0.05, 0.05, &["Rust"]));

        // Different cell from the center, still within 10 km.
        assert_eq!(hub.publish_new(&dev("edge", &["Rust"], -0.01, 0.1)), 1);
    }

    #[tokio::test]
    async fn test_disconnect_and_unsubscribe() {
        let hub = LiveHub::new(10.0, 0.1, 8);
        let (a, _rx_a) = hub.connect();
        let (b, _rx_b) = hub.connect();
        hub.subscribe(a, sub(0.0, 0.0, &["Rust"]));
        hub.subscribe(b, sub(0.0, 0.0, &["Rust"]));

        hub.unsubscribe(a);
        hub.disconnect(b);
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.room_count(), 0);
        assert!(!hub.subscribe(b, sub(0.0, 0.0, &["Rust"])));
    }

    #[tokio::test]
    async fn test_full_queue_drops_and_closed_receiver_is_reaped() {
        let hub = LiveHub::new(10.0, 0.1, 1);
        let (slow, mut rx_slow) = hub.connect();
        let (gone, rx_gone) = hub.connect();
        hub.subscribe(slow, sub(0.0, 0.0, &["Rust"]));
        hub.subscribe(gone, sub(0.0, 0.0, &["Rust"]));
        drop(rx_gone);

        assert_eq!(hub.publish_new(&dev("one", &["Rust"], 0.0, 0.0)), 1);
        assert_eq!(hub.connection_count(), 1);

        assert_eq!(hub.publish_new(&dev("two", &["Rust"], 0.0, 0.0)), 0);
        assert!(matches!(rx_slow.try_recv(), Ok(DeveloperEvent::NewDev(d)) if d.id == "one"));
        assert!(rx_slow.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_polar_subscription_uses_wide_set() {
        let hub = LiveHub::new(10.0, 0.1, 8);
        let (id, mut rx) = hub.connect();
        hub.subscribe(id, sub(89.99, 0.0, &["Rust"]));
        assert_eq!(hub.room_count(), 0);

        assert_eq!(hub.publish_new(&dev("north", &["Rust"], 89.98, 120.0)), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_removed_ignores_tech_filter() {
        let hub = LiveHub::new(10.0, 0.1, 8);
        let (id, mut rx) = hub.connect();
        hub.subscribe(id, sub(0.0, 0.0, &["Go"]));

        assert_eq!(hub.publish_removed(&dev("x", &["Rust"], 0.0, 0.0)), 1);
        assert!(matches!(rx.try_recv(), Ok(DeveloperEvent::RemovedDev(r)) if r.id == "x"));
    }
}
