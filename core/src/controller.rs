use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::config::MapConfig;
use crate::coord::{LatLng, LatLngBounds};
use crate::diagnostics::{self, Diagnostics};
use crate::error::{GeometryError, MapError, SurfaceError};
use crate::geolocation::{Geolocation, Position};
use crate::geometry::{decorate_background, decorate_editable, parse_collection, FeatureCollection};
use crate::poller::{zoom_for_accuracy, LocationPoller};
use crate::scheduler::{Scheduler, TaskHandle};
use crate::snapshot::StateSnapshot;
use crate::store::{StateStore, StateSync};
use crate::surface::{
    DrawToolbar, EventSink, MapSurface, SurfaceEvent, SurfaceFactory, SurfaceOptions,
};

pub const MARKER_DEBOUNCE_MS: u32 = 500;
pub const INITIAL_FLY_DELAY_MS: u32 = 500;
pub const INITIAL_FLY_ZOOM: f64 = 18.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Active,
    TearingDown,
    Destroyed,
}

#[derive(Clone)]
pub struct Services {
    pub store: Rc<dyn StateStore>,
    pub scheduler: Rc<dyn Scheduler>,
    pub geolocation: Rc<dyn Geolocation>,
    pub diagnostics: Diagnostics,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapModel {
    pub coordinate: LatLng,
    pub geometry: Option<FeatureCollection>,
    pub background: Option<FeatureCollection>,
}

impl MapModel {
    fn empty(coordinate: LatLng) -> Self {
        Self {
            coordinate,
            geometry: None,
            background: None,
        }
    }
}

/// Owns one live surface and everything layered on it.
///
/// Timers and geolocation callbacks hold only a weak reference and check
/// the phase before touching anything, so work that lands after
/// [`MapController::teardown`] is dropped on the floor.
pub struct MapController {
    inner: Rc<ControllerInner>,
}

struct ControllerInner {
    phase: Cell<Phase>,
    config: Rc<MapConfig>,
    services: Services,
    sync: StateSync,
    surface: RefCell<Option<Box<dyn MapSurface>>>,
    model: RefCell<MapModel>,
    marker_update: RefCell<Option<TaskHandle>>,
    deferred: RefCell<Vec<TaskHandle>>,
    poller: RefCell<Option<LocationPoller>>,
    has_marker: Cell<bool>,
    has_drawing: Cell<bool>,
}

impl MapController {
    pub fn initialize<E>(
        element: Option<&E>,
        surfaces: &dyn SurfaceFactory<E>,
        config: Rc<MapConfig>,
        services: Services,
        initial_state: Option<&StateSnapshot>,
    ) -> Result<Self, MapError> {
        let element = element.ok_or(MapError::MissingElement)?;
        let sync = StateSync::new(
            services.store.clone(),
            config.state_path.clone(),
            config.default_location,
            config.live_location.send,
        );
        let inner = Rc::new(ControllerInner {
            phase: Cell::new(Phase::Uninitialized),
            model: RefCell::new(MapModel::empty(config.default_location)),
            config,
            services,
            sync,
            surface: RefCell::new(None),
            marker_update: RefCell::new(None),
            deferred: RefCell::new(Vec::new()),
            poller: RefCell::new(None),
            has_marker: Cell::new(false),
            has_drawing: Cell::new(false),
        });

        let options = SurfaceOptions::from_config(&inner.config);
        let surface = surfaces.create(element, &options, ControllerInner::event_sink(&inner))?;
        *inner.surface.borrow_mut() = Some(surface);

        inner.run_initialization(initial_state);
        inner.phase.set(Phase::Active);
        Ok(Self { inner })
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase.get()
    }

    pub fn model(&self) -> MapModel {
        self.inner.model.borrow().clone()
    }

    pub fn config(&self) -> &MapConfig {
        &self.inner.config
    }

    pub fn resolve(&self) -> LatLng {
        self.inner.sync.resolve()
    }

    pub fn handle_event(&self, event: SurfaceEvent) {
        self.inner.handle_event(event);
    }

    pub fn refresh(&self) {
        self.inner.refresh();
    }

    pub fn set_coordinates(&self, point: LatLng) {
        self.inner.set_coordinates(point);
    }

    pub fn update_marker(&self, point: LatLng) {
        self.inner.update_marker(point);
    }

    pub fn fetch_current_location(&self) {
        self.inner.fetch_current_location();
    }

    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn downgrade(&self) -> WeakController {
        WeakController {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl Drop for MapController {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

#[derive(Clone)]
pub struct WeakController {
    inner: Weak<ControllerInner>,
}

impl WeakController {
    pub fn is_active(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.phase.get() == Phase::Active)
            .unwrap_or(false)
    }

    pub fn handle_event(&self, event: SurfaceEvent) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_event(event);
        }
    }
}

impl ControllerInner {
    fn event_sink(inner: &Rc<Self>) -> EventSink {
        let weak = Rc::downgrade(inner);
        Rc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_event(event);
            }
        })
    }

    fn accepts_callbacks(&self) -> bool {
        matches!(self.phase.get(), Phase::Uninitialized | Phase::Active)
    }

    fn diagnostics(&self) -> &Diagnostics {
        &self.services.diagnostics
    }

    fn with_surface<R>(&self, action: impl FnOnce(&dyn MapSurface) -> R) -> Option<R> {
        let slot = self.surface.borrow();
        slot.as_deref().map(action)
    }

    fn view_target(&self, point: LatLng) -> LatLng {
        match self.config.bounds {
            Some(bounds) => bounds.clamp(point),
            None => point,
        }
    }

    fn defer(self: &Rc<Self>, delay_ms: u32, task: impl FnOnce(&ControllerInner) + 'static) {
        let weak = Rc::downgrade(self);
        let handle = self.services.scheduler.timeout(
            delay_ms,
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.accepts_callbacks() {
                    task(&inner);
                }
            }),
        );
        self.deferred.borrow_mut().push(handle);
    }

    fn run_initialization(self: &Rc<Self>, initial_state: Option<&StateSnapshot>) {
        let config = self.config.clone();
        self.with_surface(|surface| {
            if let Some(bounds) = config.bounds {
                surface.set_max_bounds(bounds);
                surface.fit_bounds(bounds);
            }
            if !config.draggable {
                surface.disable_dragging();
            }
        });

        let snapshot = self.sync.snapshot();
        let stated = initial_state
            .and_then(StateSnapshot::coordinate)
            .or_else(|| snapshot.coordinate());
        let coordinate = stated.unwrap_or(config.default_location);
        self.model.borrow_mut().coordinate = coordinate;

        if config.show_marker {
            self.with_surface(|surface| surface.add_marker(coordinate, &config.marker_color));
            self.has_marker.set(true);
        }

        match stated {
            Some(point) => {
                let target = self.view_target(point);
                self.with_surface(|surface| surface.set_view(target, None));
                let zoom = config.controls.clamp_zoom(INITIAL_FLY_ZOOM);
                self.defer(INITIAL_FLY_DELAY_MS, move |inner| {
                    inner.with_surface(|surface| surface.fly_to(target, Some(zoom)));
                });
            }
            None => {
                if config.bounds.is_none() {
                    let zoom = config.controls.zoom;
                    self.with_surface(|surface| surface.set_view(coordinate, Some(zoom)));
                }
                self.auto_center();
            }
        }

        if config.show_my_location_button {
            self.install_location_button();
        }

        if LocationPoller::should_arm(&config.live_location) {
            let weak = Rc::downgrade(self);
            let tick: Rc<dyn Fn()> = Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.fetch_current_location();
                }
            });
            let poller = LocationPoller::arm(
                self.services.scheduler.as_ref(),
                config.live_location.interval_ms,
                tick,
            );
            *self.poller.borrow_mut() = Some(poller);
        }

        if config.geo_man.show {
            if let Err(err) = self.init_drawing(initial_state, &snapshot) {
                self.diagnostics().error(
                    diagnostics::DRAWING_INIT_FAILED,
                    format!("drawing tools unavailable: {err}"),
                );
            }
        }

        let background = snapshot
            .background()
            .or_else(|| initial_state.and_then(StateSnapshot::background))
            .cloned();
        if let Some(value) = background {
            self.load_background(&value);
        }

        self.with_surface(|surface| surface.add_hash());
    }

    fn init_drawing(
        self: &Rc<Self>,
        initial_state: Option<&StateSnapshot>,
        snapshot: &StateSnapshot,
    ) -> Result<(), SurfaceError> {
        let toolbar = DrawToolbar {
            position: self.config.geo_man.position,
            tools: self.config.geo_man.tools,
        };
        if let Some(result) = self.with_surface(|surface| surface.add_draw_toolbar(&toolbar)) {
            result?;
        }
        self.has_drawing.set(true);

        let existing = snapshot
            .geojson()
            .or_else(|| initial_state.and_then(StateSnapshot::geojson))
            .cloned();
        if let Some(value) = existing {
            if let Some(bounds) = self.load_geometry(&value) {
                self.defer(INITIAL_FLY_DELAY_MS, move |inner| {
                    inner.with_surface(|surface| surface.fly_to_bounds(bounds));
                });
            }
        }
        Ok(())
    }

    fn load_geometry(&self, value: &Value) -> Option<LatLngBounds> {
        let collection = match parse_collection(value) {
            Ok(collection) => collection,
            Err(err) => {
                self.diagnostics()
                    .warn(diagnostics::GEOMETRY_LOAD_FAILED, err.to_string());
                return None;
            }
        };
        let geo_man = &self.config.geo_man;
        let bounds = self
            .with_surface(|surface| {
                surface.clear_editable();
                for (index, feature) in collection.features.iter().enumerate() {
                    let decoration = decorate_editable(feature, geo_man);
                    if let Err(err) = surface.add_editable_feature(feature, &decoration) {
                        self.diagnostics().warn(
                            diagnostics::GEOMETRY_FEATURE_SKIPPED,
                            format!("feature {index}: {err}"),
                        );
                    }
                }
                surface.editable_bounds()
            })
            .flatten()
            .or_else(|| collection.bounds());
        self.model.borrow_mut().geometry = Some(collection);
        bounds
    }

    fn load_background(&self, value: &Value) {
        let collection = match parse_collection(value) {
            Ok(collection) => collection,
            Err(err) => {
                self.diagnostics()
                    .warn(diagnostics::BACKGROUND_LOAD_FAILED, err.to_string());
                return;
            }
        };
        self.with_surface(|surface| {
            surface.clear_background();
            for (index, feature) in collection.features.iter().enumerate() {
                let decoration = decorate_background(feature);
                if let Err(err) = surface.add_background_feature(feature, &decoration) {
                    self.diagnostics().warn(
                        diagnostics::BACKGROUND_LOAD_FAILED,
                        format!("background feature {index}: {err}"),
                    );
                }
            }
        });
        self.model.borrow_mut().background = Some(collection);
    }

    fn install_location_button(self: &Rc<Self>) {
        match self.with_surface(|surface| surface.add_location_button()) {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                self.diagnostics()
                    .warn(diagnostics::LOCATION_CONTROL_FAILED, err.to_string());
                return;
            }
            None => return,
        }
        let geolocation = self.services.geolocation.clone();
        if !geolocation.is_supported() {
            self.with_surface(|surface| surface.set_location_button_enabled(false));
            return;
        }
        let weak = Rc::downgrade(self);
        geolocation.check_permission(Box::new(move |granted| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.accepts_callbacks() {
                inner.with_surface(|surface| surface.set_location_button_enabled(granted));
            }
        }));
    }

    fn auto_center(self: &Rc<Self>) {
        let geolocation = self.services.geolocation.clone();
        if !geolocation.is_supported() {
            return;
        }
        let weak = Rc::downgrade(self);
        geolocation.current_position(Box::new(move |result| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.accepts_callbacks() {
                return;
            }
            match result {
                Ok(position) => {
                    let target = inner.view_target(position.coords);
                    let zoom = inner.config.controls.zoom;
                    inner.with_surface(|surface| surface.set_view(target, Some(zoom)));
                }
                Err(err) => inner
                    .diagnostics()
                    .info(diagnostics::AUTOCENTER_FAILED, err.to_string()),
            }
        }));
    }

    fn handle_event(self: &Rc<Self>, event: SurfaceEvent) {
        if !self.accepts_callbacks() {
            self.diagnostics().debug(
                diagnostics::STALE_CALLBACK,
                format!("ignored {event:?} after teardown"),
            );
            return;
        }
        match event {
            SurfaceEvent::Click(point) => {
                if self.config.clickable {
                    self.set_coordinates(point);
                }
            }
            SurfaceEvent::Drag => {
                if let Some(bounds) = self.config.bounds {
                    self.with_surface(|surface| surface.pan_inside_bounds(bounds));
                }
            }
            SurfaceEvent::Load => {
                self.defer(0, |inner| {
                    inner.with_surface(|surface| surface.invalidate_size());
                });
                if self.has_marker.get() {
                    self.with_surface(|surface| surface.move_marker(surface.center()));
                }
            }
            SurfaceEvent::ShapeCreated(shape) => {
                if !self.has_drawing.get() {
                    return;
                }
                match self.with_surface(|surface| surface.adopt_shape(shape)) {
                    Some(Ok(())) => self.push_geometry(),
                    Some(Err(err)) => self.diagnostics().warn(
                        diagnostics::GEOMETRY_ADOPT_FAILED,
                        format!("shape {shape}: {err}"),
                    ),
                    None => {}
                }
            }
            SurfaceEvent::ShapeEdited => {
                if self.has_drawing.get() {
                    self.push_geometry();
                }
            }
            SurfaceEvent::ShapeRemoved(shape) => {
                if !self.has_drawing.get() {
                    return;
                }
                if let Some(Err(err)) = self.with_surface(|surface| surface.remove_shape(shape)) {
                    self.diagnostics().error(
                        diagnostics::GEOMETRY_REMOVE_FAILED,
                        format!("error during removal of shape {shape}: {err}"),
                    );
                }
                self.push_geometry();
            }
            SurfaceEvent::LocationButtonClicked => self.fetch_current_location(),
        }
    }

    fn push_geometry(&self) {
        let Some(serialized) = self.with_surface(|surface| surface.editable_geojson()) else {
            return;
        };
        let serialized = match serialized {
            Ok(value) => value,
            Err(err) => {
                self.diagnostics().error(
                    diagnostics::GEOMETRY_SERIALIZE_FAILED,
                    format!("error updating geojson: {err}"),
                );
                return;
            }
        };
        match self.sync.push_geometry(serialized) {
            Ok(collection) => self.model.borrow_mut().geometry = collection,
            Err(err @ GeometryError::NotAnObject(_)) => self
                .diagnostics()
                .error(diagnostics::GEOMETRY_NOT_OBJECT, err.to_string()),
            Err(err) => self
                .diagnostics()
                .error(diagnostics::GEOMETRY_SERIALIZE_FAILED, err.to_string()),
        }
    }

    fn set_coordinates(self: &Rc<Self>, point: LatLng) {
        if !self.accepts_callbacks() {
            return;
        }
        self.model.borrow_mut().coordinate = point;
        self.sync.set_coordinate(point);
        self.update_marker(point);
    }

    /// Moves the marker now and persists after a quiet period. A newer
    /// call replaces the pending write, so only the last value lands.
    fn update_marker(self: &Rc<Self>, point: LatLng) {
        if !self.accepts_callbacks() {
            return;
        }
        if self.has_marker.get() {
            self.with_surface(|surface| surface.move_marker(point));
        }
        let weak = Rc::downgrade(self);
        let handle = self.services.scheduler.timeout(
            MARKER_DEBOUNCE_MS,
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.accepts_callbacks() {
                    inner.sync.set_coordinate(point);
                }
            }),
        );
        let previous = self.marker_update.borrow_mut().replace(handle);
        drop(previous);
    }

    fn fetch_current_location(self: &Rc<Self>) {
        if !self.accepts_callbacks() {
            return;
        }
        let geolocation = self.services.geolocation.clone();
        if !geolocation.is_supported() {
            self.diagnostics().warn(
                diagnostics::GEOLOCATION_UNSUPPORTED,
                "geolocation is not supported by this browser",
            );
            return;
        }
        let weak = Rc::downgrade(self);
        geolocation.current_position(Box::new(move |result| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.accepts_callbacks() {
                return;
            }
            match result {
                Ok(position) => inner.apply_fix(position),
                Err(err) => inner.diagnostics().warn(
                    diagnostics::GEOLOCATION_FAILED,
                    format!("error fetching current location: {err}"),
                ),
            }
        }));
    }

    fn apply_fix(self: &Rc<Self>, position: Position) {
        let zoom = self
            .config
            .controls
            .clamp_zoom(zoom_for_accuracy(position.accuracy));
        let target = self.view_target(position.coords);
        self.with_surface(|surface| surface.fly_to(target, Some(zoom)));
        if self.config.live_location.send {
            self.model.borrow_mut().coordinate = position.coords;
            self.update_marker(position.coords);
        }
    }

    fn refresh(self: &Rc<Self>) {
        if self.phase.get() != Phase::Active {
            return;
        }
        let snapshot = self.sync.snapshot();

        if self.has_drawing.get() {
            if let Some(value) = snapshot.geojson() {
                if let Some(bounds) = self.load_geometry(value) {
                    self.with_surface(|surface| surface.fly_to_bounds(bounds));
                }
            }
        }

        if let Some(point) = snapshot.coordinate() {
            self.model.borrow_mut().coordinate = point;
            let target = self.view_target(point);
            self.with_surface(|surface| surface.fly_to(target, None));
            self.update_marker(point);
        }

        if let Some(value) = snapshot.background() {
            self.load_background(value);
        }
    }

    fn teardown(&self) {
        if matches!(self.phase.get(), Phase::TearingDown | Phase::Destroyed) {
            return;
        }
        self.phase.set(Phase::TearingDown);

        let pending = self.marker_update.borrow_mut().take();
        drop(pending);
        let deferred = std::mem::take(&mut *self.deferred.borrow_mut());
        drop(deferred);
        let poller = self.poller.borrow_mut().take();
        drop(poller);

        let surface = self.surface.borrow_mut().take();
        if let Some(surface) = surface {
            if self.has_marker.get() {
                surface.remove_marker();
            }
            surface.destroy();
        }
        self.has_marker.set(false);
        self.has_drawing.set(false);
        *self.model.borrow_mut() = MapModel::empty(self.config.default_location);
        self.phase.set(Phase::Destroyed);
    }
}
