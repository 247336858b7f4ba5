//! Keeps one map marker per remote connection in step with relayed events.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::protocol::{ConnectionId, RelayedUpdate, ServerEvent};

/// Zoom level a fresh map opens at.
pub const INITIAL_ZOOM: u8 = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const ORIGIN: LatLng = LatLng { lat: 0.0, lng: 0.0 };

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<&RelayedUpdate> for LatLng {
    fn from(update: &RelayedUpdate) -> Self {
        Self::new(update.latitude, update.longitude)
    }
}

/// Drawing surface the renderer places markers on.
pub trait MapView {
    type Marker;

    fn set_view(&mut self, center: LatLng);
    fn add_marker(&mut self, at: LatLng) -> Self::Marker;
    fn move_marker(&mut self, marker: &mut Self::Marker, at: LatLng);
    fn remove_marker(&mut self, marker: Self::Marker);
}

pub struct MapRenderer<V: MapView> {
    view: V,
    markers: HashMap<ConnectionId, V::Marker>,
}

impl<V: MapView> MapRenderer<V> {
    /// Wrap `view`, centring it on (0, 0).
    pub fn new(mut view: V) -> Self {
        view.set_view(LatLng::ORIGIN);
        Self {
            view,
            markers: HashMap::new(),
        }
    }

    /// Recentre on the update and move or create the sender's marker.
    pub fn on_receive_location(&mut self, update: &RelayedUpdate) {
        let at = LatLng::from(update);
        self.view.set_view(at);
        match self.markers.get_mut(&update.id) {
            Some(marker) => self.view.move_marker(marker, at),
            None => {
                let marker = self.view.add_marker(at);
                let _ = self.markers.insert(update.id, marker);
            }
        }
    }

    pub fn on_user_disconnected(&mut self, id: &ConnectionId) {
        if let Some(marker) = self.markers.remove(id) {
            self.view.remove_marker(marker);
        }
    }

    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::ReceiveLocation(update) => self.on_receive_location(update),
            ServerEvent::UserDisconnected(id) => self.on_user_disconnected(id),
        }
    }

    pub fn marker(&self, id: &ConnectionId) -> Option<&V::Marker> {
        self.markers.get(id)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(u64);

/// A [`MapView`] that only tracks state in memory.
#[derive(Debug)]
pub struct MemoryMap {
    center: LatLng,
    zoom: u8,
    layers: BTreeMap<MarkerHandle, LatLng>,
    next_handle: u64,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self {
            center: LatLng::ORIGIN,
            zoom: INITIAL_ZOOM,
            layers: BTreeMap::new(),
            next_handle: 0,
        }
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn position(&self, marker: &MarkerHandle) -> Option<LatLng> {
        self.layers.get(marker).copied()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MapView for MemoryMap {
    type Marker = MarkerHandle;

    fn set_view(&mut self, center: LatLng) {
        self.center = center;
    }

    fn add_marker(&mut self, at: LatLng) -> MarkerHandle {
        let handle = MarkerHandle(self.next_handle);
        self.next_handle += 1;
        let _ = self.layers.insert(handle, at);
        debug!(marker = handle.0, lat = at.lat, lng = at.lng, "marker added");
        handle
    }

    fn move_marker(&mut self, marker: &mut MarkerHandle, at: LatLng) {
        if let Some(pos) = self.layers.get_mut(marker) {
            *pos = at;
            debug!(marker = marker.0, lat = at.lat, lng = at.lng, "marker moved");
        }
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        if self.layers.remove(&marker).is_some() {
            debug!(marker = marker.0, "marker removed");
        }
    }
}
