//! Keeps the mapping widget in sync with the location stream.
//!
//! The widget itself is an external collaborator: this module only drives
//! its draw/pan/restyle primitives and owns the per-vehicle coordinate
//! bookkeeping and the selection panel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::fleet::models::{User, Vehicle, VehicleId, VehicleLocation};
use crate::geocode::{AddressMemoizer, ReverseGeocoder};
use crate::message::{Messages, Notice};
use crate::prelude::*;

/// Draw/pan/select primitives of the external mapping widget.
pub trait MapWidget: Send {
    fn add_marker(&mut self, vehicle_id: VehicleId, style: MarkerStyle);
    fn move_marker(&mut self, vehicle_id: VehicleId, lat: f64, lon: f64);
    fn restyle_marker(&mut self, vehicle_id: VehicleId, style: MarkerStyle);
    fn fit_all(&mut self);
    fn pan_to(&mut self, lat: f64, lon: f64);
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    pub radius: u32,
    pub fill_color: String,
    pub stroke_color: &'static str,
    pub stroke_width: u32,
}

/// Selected markers are drawn smaller with a thicker outline.
pub fn marker_style(vehicle: &Vehicle, selected: bool) -> MarkerStyle {
    MarkerStyle {
        radius: if selected { 5 } else { 7 },
        fill_color: vehicle.color.clone(),
        stroke_color: "#333333",
        stroke_width: if selected { 3 } else { 1 },
    }
}

/// The selected vehicle's position panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub lat: f64,
    pub lon: f64,
    pub address: Option<String>,
}

pub struct MapSync<W, G> {
    widget: W,
    user: User,
    memoizer: Arc<AddressMemoizer<G>>,
    messages: Arc<Messages>,
    refresh_tx: mpsc::UnboundedSender<()>,
    selection_tx: mpsc::UnboundedSender<Option<Vehicle>>,
    coordinates: AHashMap<VehicleId, ResolvedLocation>,
    selected: Option<VehicleId>,
    selected_location: Option<ResolvedLocation>,
}

impl<W: MapWidget, G: ReverseGeocoder + 'static> MapSync<W, G> {
    pub fn new(
        mut widget: W,
        user: User,
        memoizer: Arc<AddressMemoizer<G>>,
        messages: Arc<Messages>,
        refresh_tx: mpsc::UnboundedSender<()>,
        selection_tx: mpsc::UnboundedSender<Option<Vehicle>>,
    ) -> Self {
        for vehicle in &user.vehicles {
            widget.add_marker(vehicle.id, marker_style(vehicle, false));
        }
        Self {
            widget,
            user,
            memoizer,
            messages,
            refresh_tx,
            selection_tx,
            coordinates: AHashMap::default(),
            selected: None,
            selected_location: None,
        }
    }

    /// Applies one poller emission: overwrites the coordinates, moves the
    /// matching markers and refits the view. An empty list raises a single
    /// notice whose retry callback requests a forced refetch.
    #[instrument(skip_all, fields(n_locations = locations.len()))]
    pub async fn on_locations(&mut self, locations: &[VehicleLocation]) {
        if locations.is_empty() {
            let refresh_tx = self.refresh_tx.clone();
            self.messages.set(Notice::with_retry(
                "Failed to retrieve vehicles locations",
                move || {
                    let _ = refresh_tx.send(());
                },
            ));
            return;
        }
        for location in locations {
            self.coordinates.insert(
                location.vehicle_id,
                ResolvedLocation {
                    lat: location.lat,
                    lon: location.lon,
                    address: None,
                },
            );
            // Locations may mention vehicles without a marker, skip those.
            if self.marked(location.vehicle_id) {
                self.widget.move_marker(location.vehicle_id, location.lat, location.lon);
            } else {
                debug!(vehicle_id = location.vehicle_id, "no marker for the vehicle");
            }
        }
        self.widget.fit_all();
        self.refresh_selection().await;
    }

    /// Marker (de)selection coming back from the widget. Restyles the
    /// markers, pans to the selection and reports it to the parent view.
    pub async fn set_selected(&mut self, vehicle_id: Option<VehicleId>) {
        self.selected = vehicle_id.filter(|vehicle_id| self.marked(*vehicle_id));
        for vehicle in &self.user.vehicles {
            let selected = self.selected == Some(vehicle.id);
            self.widget.restyle_marker(vehicle.id, marker_style(vehicle, selected));
        }
        self.refresh_selection().await;

        let vehicle = self
            .selected
            .and_then(|vehicle_id| self.user.vehicles.iter().find(|vehicle| vehicle.id == vehicle_id))
            .cloned();
        info!(selected = ?vehicle.as_ref().map(|vehicle| vehicle.id), "selection changed");
        let _ = self.selection_tx.send(vehicle);
    }

    pub fn selected_location(&self) -> Option<&ResolvedLocation> {
        self.selected_location.as_ref()
    }

    fn marked(&self, vehicle_id: VehicleId) -> bool {
        self.user.vehicles.iter().any(|vehicle| vehicle.id == vehicle_id)
    }

    async fn refresh_selection(&mut self) {
        let vehicle_id = match self.selected {
            Some(vehicle_id) => vehicle_id,
            None => {
                self.selected_location = None;
                return;
            }
        };
        if let Some(location) = self.coordinates.get_mut(&vehicle_id) {
            if location.address.is_none() {
                location.address = Some(self.memoizer.resolve(location.lat, location.lon).await);
            }
            self.widget.pan_to(location.lat, location.lon);
            self.selected_location = Some(location.clone());
        }
    }
}

/// Headless stand-in for the mapping widget: renders to the log.
pub struct ConsoleMap;

impl MapWidget for ConsoleMap {
    fn add_marker(&mut self, vehicle_id: VehicleId, style: MarkerStyle) {
        debug!(vehicle_id, ?style, "marker added");
    }

    fn move_marker(&mut self, vehicle_id: VehicleId, lat: f64, lon: f64) {
        info!(vehicle_id, lat, lon, "marker moved");
    }

    fn restyle_marker(&mut self, vehicle_id: VehicleId, style: MarkerStyle) {
        debug!(vehicle_id, ?style, "marker restyled");
    }

    fn fit_all(&mut self) {
        debug!("view fitted to the markers");
    }

    fn pan_to(&mut self, lat: f64, lon: f64) {
        info!(lat, lon, "panned");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum Op {
        Add(VehicleId),
        Move(VehicleId, f64, f64),
        Restyle(VehicleId, MarkerStyle),
        FitAll,
        PanTo(f64, f64),
    }

    #[derive(Default, Clone)]
    struct FakeWidget(Arc<Mutex<Vec<Op>>>);

    impl FakeWidget {
        fn ops(&self) -> std::sync::MutexGuard<'_, Vec<Op>> {
            self.0.lock().unwrap()
        }
    }

    impl MapWidget for FakeWidget {
        fn add_marker(&mut self, vehicle_id: VehicleId, _style: MarkerStyle) {
            self.ops().push(Op::Add(vehicle_id));
        }

        fn move_marker(&mut self, vehicle_id: VehicleId, lat: f64, lon: f64) {
            self.ops().push(Op::Move(vehicle_id, lat, lon));
        }

        fn restyle_marker(&mut self, vehicle_id: VehicleId, style: MarkerStyle) {
            self.ops().push(Op::Restyle(vehicle_id, style));
        }

        fn fit_all(&mut self) {
            self.ops().push(Op::FitAll);
        }

        fn pan_to(&mut self, lat: f64, lon: f64) {
            self.ops().push(Op::PanTo(lat, lon));
        }
    }

    #[derive(Default, Clone)]
    struct FakeGeocoder {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReverseGeocoder for FakeGeocoder {
        async fn reverse(&self, lat: f64, lon: f64) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{} {}", lat, lon))
        }
    }

    fn test_user() -> User {
        User {
            id: 1,
            name: "John".to_string(),
            surname: "Doe".to_string(),
            photo: String::new(),
            vehicles: vec![
                Vehicle {
                    id: 31,
                    make: "Land Rover".to_string(),
                    model: "Defender".to_string(),
                    year: "2018".to_string(),
                    color: "#689CF2".to_string(),
                    vin: "DH34HJ1093HD".to_string(),
                    photo: String::new(),
                },
                Vehicle {
                    id: 32,
                    make: "Aston Martin".to_string(),
                    model: "Vanquish".to_string(),
                    year: "2012".to_string(),
                    color: "#D83B65".to_string(),
                    vin: "KS12JS3382NS".to_string(),
                    photo: String::new(),
                },
            ],
        }
    }

    struct Harness {
        widget: FakeWidget,
        geocoder: FakeGeocoder,
        messages: Arc<Messages>,
        refresh_rx: mpsc::UnboundedReceiver<()>,
        selection_rx: mpsc::UnboundedReceiver<Option<Vehicle>>,
        sync: MapSync<FakeWidget, FakeGeocoder>,
    }

    fn harness() -> Harness {
        let widget = FakeWidget::default();
        let geocoder = FakeGeocoder::default();
        let messages = Arc::new(Messages::default());
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let (selection_tx, selection_rx) = mpsc::unbounded_channel();
        let sync = MapSync::new(
            widget.clone(),
            test_user(),
            Arc::new(AddressMemoizer::new(geocoder.clone())),
            Arc::clone(&messages),
            refresh_tx,
            selection_tx,
        );
        Harness {
            widget,
            geocoder,
            messages,
            refresh_rx,
            selection_rx,
            sync,
        }
    }

    #[tokio::test]
    async fn one_marker_per_vehicle_ok() {
        let harness = harness();
        assert_eq!(*harness.widget.ops(), vec![Op::Add(31), Op::Add(32)]);
    }

    #[tokio::test]
    async fn empty_locations_raise_one_notice_with_retry_ok() {
        let mut harness = harness();

        harness.sync.on_locations(&[]).await;
        harness.sync.on_locations(&[]).await;

        let notices = harness.messages.take();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].text(), "Failed to retrieve vehicles locations");

        notices[0].retry();
        assert!(harness.refresh_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn locations_move_markers_and_fit_ok() {
        let mut harness = harness();

        harness
            .sync
            .on_locations(&[
                VehicleLocation { vehicle_id: 31, lat: 51.4, lon: 5.3 },
                // No marker for this one, must be skipped.
                VehicleLocation { vehicle_id: 99, lat: 0.0, lon: 0.0 },
            ])
            .await;

        let ops = harness.widget.ops();
        assert!(ops.contains(&Op::Move(31, 51.4, 5.3)));
        assert!(!ops.iter().any(|op| matches!(op, Op::Move(99, _, _))));
        assert_eq!(*ops.last().unwrap(), Op::FitAll);
        assert!(harness.messages.is_empty());
    }

    #[tokio::test]
    async fn selection_restyles_pans_and_resolves_address_ok() {
        let mut harness = harness();
        let location = VehicleLocation { vehicle_id: 31, lat: 51.4, lon: 5.3 };

        harness.sync.on_locations(&[location.clone()]).await;
        harness.sync.set_selected(Some(31)).await;

        assert_eq!(harness.selection_rx.try_recv().unwrap().unwrap().id, 31);
        assert_eq!(
            harness.sync.selected_location(),
            Some(&ResolvedLocation {
                lat: 51.4,
                lon: 5.3,
                address: Some("51.4 5.3".to_string()),
            })
        );
        {
            let ops = harness.widget.ops();
            assert!(ops.contains(&Op::PanTo(51.4, 5.3)));
            let selected_style = ops.iter().rev().find_map(|op| match op {
                Op::Restyle(31, style) => Some(style.clone()),
                _ => None,
            });
            assert_eq!(
                selected_style,
                Some(MarkerStyle {
                    radius: 5,
                    fill_color: "#689CF2".to_string(),
                    stroke_color: "#333333",
                    stroke_width: 3,
                })
            );
        }

        // The same pair on the next tick resolves from the memo, not the network.
        harness.sync.on_locations(&[location]).await;
        assert_eq!(harness.geocoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deselection_emits_none_ok() {
        let mut harness = harness();

        harness
            .sync
            .on_locations(&[VehicleLocation { vehicle_id: 31, lat: 51.4, lon: 5.3 }])
            .await;
        harness.sync.set_selected(Some(31)).await;
        harness.sync.set_selected(None).await;

        harness.selection_rx.try_recv().unwrap();
        assert!(harness.selection_rx.try_recv().unwrap().is_none());
        assert!(harness.sync.selected_location().is_none());
    }
}
