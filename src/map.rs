//! Marker layer for the map view.
//!
//! [`MapAdapter`] turns each [`ProximitySnapshot`] into marker descriptors and
//! reconciles them by event id instead of rebuilding the layer, so markers
//! that did not change are left alone.

use crate::geo::Coordinate;
use crate::models::EventId;
use crate::view_model::ProximitySnapshot;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerClass {
    User,
    Event,
}

/// Content shown when an event marker is selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub name: String,
    pub host: String,
    pub location_label: String,
    pub distance_miles: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: Coordinate,
    pub class: MarkerClass,
    pub popup: Option<Popup>,
}

/// What the last reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerChanges {
    pub added: Vec<EventId>,
    pub updated: Vec<EventId>,
    pub removed: Vec<EventId>,
    pub recentered: bool,
}

impl MarkerChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty() && !self.recentered
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: Coordinate,
    pub zoom: u8,
}

impl Viewport {
    /// Half the visible latitude span in degrees. Zoom 0 shows the whole
    /// globe, every level halves the span.
    pub fn half_span_degrees(&self) -> f64 {
        90.0 / f64::from(1u32 << self.zoom)
    }

    /// `([west, east], [south, north])` for the rendering surface.
    pub fn bounds(&self) -> ([f64; 2], [f64; 2]) {
        let half = self.half_span_degrees();
        (
            [self.center.lng() - 2.0 * half, self.center.lng() + 2.0 * half],
            [self.center.lat() - half, self.center.lat() + half],
        )
    }
}

pub struct MapAdapter {
    viewport: Viewport,
    user: Option<Marker>,
    markers: HashMap<EventId, Marker>,
    order: Vec<EventId>,
}

impl MapAdapter {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            user: None,
            markers: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn user_marker(&self) -> Option<&Marker> {
        self.user.as_ref()
    }

    pub fn marker(&self, id: EventId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    /// Event markers in list order.
    pub fn markers(&self) -> impl Iterator<Item = (EventId, &Marker)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.markers.get(id).map(|m| (*id, m)))
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom = (self.viewport.zoom + 1).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom = self.viewport.zoom.saturating_sub(1);
    }

    /// Brings the marker layer in line with `snapshot`.
    pub fn reconcile(&mut self, snapshot: &ProximitySnapshot) -> MarkerChanges {
        let mut changes = MarkerChanges::default();

        match snapshot.user() {
            Some(at) => {
                let moved = self.user.as_ref().map(|m| m.position) != Some(at);
                if moved {
                    self.user = Some(Marker {
                        position: at,
                        class: MarkerClass::User,
                        popup: None,
                    });
                    if self.viewport.center != at {
                        self.viewport.center = at;
                        changes.recentered = true;
                    }
                }
            }
            None => self.user = None,
        }

        let mut next: HashMap<EventId, Marker> = HashMap::with_capacity(snapshot.len());
        let mut order = Vec::with_capacity(snapshot.len());
        for row in snapshot.rows() {
            let Some(position) = row.event.coordinate else {
                continue;
            };
            let marker = Marker {
                position,
                class: MarkerClass::Event,
                popup: Some(Popup {
                    name: row.event.name.clone(),
                    host: row.event.host.clone(),
                    location_label: row.event.location_label.clone(),
                    distance_miles: row.distance_miles,
                }),
            };
            let id = row.event.id;
            if next.contains_key(&id) {
                warn!("Event id {} listed twice; keeping the first marker", id);
                continue;
            }
            match self.markers.remove(&id) {
                Some(existing) if existing == marker => {
                    next.insert(id, existing);
                }
                Some(_) => {
                    changes.updated.push(id);
                    next.insert(id, marker);
                }
                None => {
                    changes.added.push(id);
                    next.insert(id, marker);
                }
            }
            order.push(id);
        }

        changes.removed = self.markers.drain().map(|(id, _)| id).collect();
        changes.removed.sort_unstable();
        self.markers = next;
        self.order = order;

        if !changes.is_empty() {
            debug!(
                "Markers reconciled: +{} ~{} -{} (recentered: {})",
                changes.added.len(),
                changes.updated.len(),
                changes.removed.len(),
                changes.recentered
            );
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventRecord;
    use crate::view_model::ProximityViewModel;
    use chrono::NaiveDate;

    fn event(id: i64, at: Option<(f64, f64)>) -> EventRecord {
        EventRecord {
            id,
            name: format!("event {id}"),
            host: "host".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            location_label: "somewhere".into(),
            coordinate: at.map(|(lat, lng)| Coordinate::new(lat, lng).unwrap()),
            description: String::new(),
            contact_info: None,
            owner_id: None,
        }
    }

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn adapter() -> MapAdapter {
        MapAdapter::new(Viewport {
            center: coord(0.0, 0.0),
            zoom: 7,
        })
    }

    #[test]
    fn markers_follow_list_ids() {
        let mut vm = ProximityViewModel::new(20.0).unwrap();
        let mut map = adapter();
        vm.set_user_location(Some(coord(40.0, -75.0)));
        vm.set_events(vec![
            event(1, Some((40.1, -75.0))),
            event(2, None),
            event(3, Some((40.05, -75.0))),
            event(4, Some((45.0, -75.0))),
        ]);
        let snap = vm.snapshot();
        map.reconcile(&snap);

        let marker_ids: Vec<EventId> = map.markers().map(|(id, _)| id).collect();
        assert_eq!(marker_ids, snap.ids());
        assert_eq!(marker_ids, vec![3, 1]);
        assert_eq!(map.user_marker().unwrap().class, MarkerClass::User);
        assert!(map.markers().all(|(_, m)| m.class == MarkerClass::Event));
    }

    #[test]
    fn reconcile_adds_updates_and_removes_by_id() {
        let mut vm = ProximityViewModel::new(50.0).unwrap();
        let mut map = adapter();
        vm.set_user_location(Some(coord(40.0, -75.0)));
        vm.set_events(vec![event(1, Some((40.1, -75.0))), event(2, Some((40.2, -75.0)))]);
        let first = map.reconcile(&vm.snapshot());
        assert_eq!(first.added, vec![1, 2]);
        assert!(first.recentered);

        vm.set_events(vec![event(2, Some((40.2, -75.0))), event(3, Some((40.3, -75.0)))]);
        let second = map.reconcile(&vm.snapshot());
        assert_eq!(second.added, vec![3]);
        assert_eq!(second.removed, vec![1]);
        assert!(second.updated.is_empty());
        assert!(!second.recentered);

        // Moving the user changes every distance but not the id set.
        vm.set_user_location(Some(coord(40.05, -75.0)));
        let third = map.reconcile(&vm.snapshot());
        assert!(third.added.is_empty() && third.removed.is_empty());
        assert_eq!(third.updated.len(), 2);
        assert!(third.recentered);
    }

    #[test]
    fn duplicate_ids_get_one_marker() {
        let mut vm = ProximityViewModel::new(50.0).unwrap();
        let mut map = adapter();
        vm.set_user_location(Some(coord(40.0, -75.0)));
        vm.set_events(vec![event(7, Some((40.1, -75.0))), event(7, Some((40.2, -75.0)))]);
        let changes = map.reconcile(&vm.snapshot());
        assert_eq!(changes.added, vec![7]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.markers().count(), 1);
        assert_eq!(map.marker(7).unwrap().position, coord(40.1, -75.0));
    }

    #[test]
    fn recenter_keeps_zoom() {
        let mut vm = ProximityViewModel::new(20.0).unwrap();
        let mut map = adapter();
        map.zoom_in();
        vm.set_user_location(Some(coord(39.95, -75.16)));
        map.reconcile(&vm.snapshot());
        assert_eq!(map.viewport().zoom, 8);
        assert_eq!(map.viewport().center, coord(39.95, -75.16));
    }

    #[test]
    fn popup_carries_distance() {
        let mut vm = ProximityViewModel::new(20.0).unwrap();
        let mut map = adapter();
        vm.set_user_location(Some(coord(40.0, -75.0)));
        vm.set_events(vec![event(5, Some((40.0, -75.0)))]);
        map.reconcile(&vm.snapshot());
        let popup = map.marker(5).unwrap().popup.clone().unwrap();
        assert_eq!(popup.name, "event 5");
        assert_eq!(popup.distance_miles, Some(0.0));
    }

    #[test]
    fn unranked_listing_maps_only_resolved_events() {
        let mut vm = ProximityViewModel::new(20.0).unwrap();
        let mut map = adapter();
        vm.set_events(vec![event(1, None), event(2, Some((10.0, 10.0)))]);
        map.reconcile(&vm.snapshot());
        assert!(map.user_marker().is_none());
        assert_eq!(map.markers().map(|(id, _)| id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(map.marker(2).unwrap().popup.as_ref().unwrap().distance_miles, None);
    }

    #[test]
    fn zoom_is_bounded() {
        let mut map = adapter();
        for _ in 0..20 {
            map.zoom_in();
        }
        assert_eq!(map.viewport().zoom, MAX_ZOOM);
        for _ in 0..20 {
            map.zoom_out();
        }
        assert_eq!(map.viewport().zoom, MIN_ZOOM);
        let (x, y) = map.viewport().bounds();
        assert_eq!(x, [-180.0, 180.0]);
        assert_eq!(y, [-90.0, 90.0]);
    }
}
