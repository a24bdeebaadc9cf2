#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use map_picker_core::diagnostics::DiagnosticLevel;
use map_picker_core::geolocation::PositionCallback;
use map_picker_core::surface::{DrawToolbar, EventSink};
use map_picker_core::{
    Diagnostic, Diagnostics, Feature, FeatureCollection, FeatureDecoration, Geolocation,
    GeolocationError, LatLng, LatLngBounds, MapConfig, MapController, MapError, MapSurface,
    Position, Scheduler, Services, ShapeId, StateSnapshot, StateStore, SurfaceError,
    SurfaceEvent, SurfaceFactory, SurfaceOptions, TaskHandle,
};
use serde_json::{json, Value};

pub const STATE_PATH: &str = "data.location";

pub fn config(overrides: Value) -> MapConfig {
    let mut raw = json!({ "statePath": STATE_PATH });
    map_picker_core::config::deep_merge(&mut raw, &overrides);
    MapConfig::from_value(raw).unwrap()
}

pub fn point_feature(lat: f64, lng: f64) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [lng, lat] },
        "properties": {}
    })
}

pub fn square_feature(south: f64, west: f64, north: f64, east: f64) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [west, south], [east, south], [east, north], [west, north], [west, south]
            ]]
        },
        "properties": {}
    })
}

pub fn collection(features: Vec<Value>) -> Value {
    json!({ "type": "FeatureCollection", "features": features })
}

/// Host element stand-in.
pub struct Element;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    SetView(LatLng, Option<f64>),
    FlyTo(LatLng, Option<f64>),
    FitBounds(LatLngBounds),
    FlyToBounds(LatLngBounds),
    SetMaxBounds(LatLngBounds),
    PanInsideBounds(LatLngBounds),
    DisableDragging,
    InvalidateSize,
    AddMarker(LatLng, String),
    MoveMarker(LatLng),
    RemoveMarker,
    AddLocationButton,
    LocationButtonEnabled(bool),
    AddDrawToolbar(DrawToolbar),
    AddHash,
    ClearEditable,
    ClearBackground,
    Destroy,
}

#[derive(Default)]
struct SurfaceState {
    calls: RefCell<Vec<Call>>,
    events: RefCell<Option<EventSink>>,
    center: Cell<Option<LatLng>>,
    next_shape: Cell<ShapeId>,
    editable: RefCell<Vec<(ShapeId, Feature, Option<FeatureDecoration>)>>,
    drawn: RefCell<HashMap<ShapeId, Feature>>,
    background: RefCell<Vec<(Feature, FeatureDecoration)>>,
    serialize_override: RefCell<Option<Result<Value, SurfaceError>>>,
    fail_toolbar: Cell<bool>,
}

/// Records every call the controller makes and keeps a tiny model of the
/// editable and background layers.
#[derive(Clone, Default)]
pub struct FakeSurface {
    state: Rc<SurfaceState>,
}

impl FakeSurface {
    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.borrow().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state.calls.borrow().iter().filter(|call| matches(call)).count()
    }

    pub fn clear_calls(&self) {
        self.state.calls.borrow_mut().clear();
    }

    pub fn emit(&self, event: SurfaceEvent) {
        let sink = self.state.events.borrow().clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    pub fn set_center(&self, center: LatLng) {
        self.state.center.set(Some(center));
    }

    /// Simulates the user finishing a drawing, then reports it.
    pub fn draw(&self, feature: Value) -> ShapeId {
        let id = self.allocate_shape();
        let feature: Feature = serde_json::from_value(feature).unwrap();
        self.state.drawn.borrow_mut().insert(id, feature);
        self.emit(SurfaceEvent::ShapeCreated(id));
        id
    }

    /// Simulates the user editing a shape in place.
    pub fn edit(&self, shape: ShapeId, feature: Value) {
        let feature: Feature = serde_json::from_value(feature).unwrap();
        for entry in self.state.editable.borrow_mut().iter_mut() {
            if entry.0 == shape {
                entry.1 = feature.clone();
            }
        }
        self.emit(SurfaceEvent::ShapeEdited);
    }

    pub fn remove(&self, shape: ShapeId) {
        self.emit(SurfaceEvent::ShapeRemoved(shape));
    }

    pub fn editable_features(&self) -> Vec<(ShapeId, Feature, Option<FeatureDecoration>)> {
        self.state.editable.borrow().clone()
    }

    pub fn background_features(&self) -> Vec<(Feature, FeatureDecoration)> {
        self.state.background.borrow().clone()
    }

    pub fn serialize_as(&self, result: Result<Value, SurfaceError>) {
        *self.state.serialize_override.borrow_mut() = Some(result);
    }

    pub fn fail_toolbar(&self) {
        self.state.fail_toolbar.set(true);
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.calls.borrow().contains(&Call::Destroy)
    }

    fn allocate_shape(&self) -> ShapeId {
        let id = self.state.next_shape.get() + 1;
        self.state.next_shape.set(id);
        id
    }

    fn record(&self, call: Call) {
        self.state.calls.borrow_mut().push(call);
    }
}

impl MapSurface for FakeSurface {
    fn set_view(&self, center: LatLng, zoom: Option<f64>) {
        self.state.center.set(Some(center));
        self.record(Call::SetView(center, zoom));
    }

    fn fly_to(&self, center: LatLng, zoom: Option<f64>) {
        self.state.center.set(Some(center));
        self.record(Call::FlyTo(center, zoom));
    }

    fn fit_bounds(&self, bounds: LatLngBounds) {
        self.state.center.set(Some(bounds.center()));
        self.record(Call::FitBounds(bounds));
    }

    fn fly_to_bounds(&self, bounds: LatLngBounds) {
        self.record(Call::FlyToBounds(bounds));
    }

    fn set_max_bounds(&self, bounds: LatLngBounds) {
        self.record(Call::SetMaxBounds(bounds));
    }

    fn pan_inside_bounds(&self, bounds: LatLngBounds) {
        if let Some(center) = self.state.center.get() {
            self.state.center.set(Some(bounds.clamp(center)));
        }
        self.record(Call::PanInsideBounds(bounds));
    }

    fn center(&self) -> LatLng {
        self.state.center.get().unwrap_or(LatLng::new(0.0, 0.0))
    }

    fn disable_dragging(&self) {
        self.record(Call::DisableDragging);
    }

    fn invalidate_size(&self) {
        self.record(Call::InvalidateSize);
    }

    fn add_marker(&self, at: LatLng, color: &str) {
        self.record(Call::AddMarker(at, color.to_string()));
    }

    fn move_marker(&self, to: LatLng) {
        self.record(Call::MoveMarker(to));
    }

    fn remove_marker(&self) {
        self.record(Call::RemoveMarker);
    }

    fn add_location_button(&self) -> Result<(), SurfaceError> {
        self.record(Call::AddLocationButton);
        Ok(())
    }

    fn set_location_button_enabled(&self, enabled: bool) {
        self.record(Call::LocationButtonEnabled(enabled));
    }

    fn add_draw_toolbar(&self, toolbar: &DrawToolbar) -> Result<(), SurfaceError> {
        if self.state.fail_toolbar.get() {
            return Err(SurfaceError::new("geoman plugin missing"));
        }
        self.record(Call::AddDrawToolbar(*toolbar));
        Ok(())
    }

    fn add_hash(&self) {
        self.record(Call::AddHash);
    }

    fn add_editable_feature(
        &self,
        feature: &Feature,
        decoration: &FeatureDecoration,
    ) -> Result<(), SurfaceError> {
        if feature.geometry.is_none() {
            return Err(SurfaceError::new("feature has no geometry"));
        }
        let id = self.allocate_shape();
        self.state
            .editable
            .borrow_mut()
            .push((id, feature.clone(), Some(decoration.clone())));
        Ok(())
    }

    fn adopt_shape(&self, shape: ShapeId) -> Result<(), SurfaceError> {
        let feature = self
            .state
            .drawn
            .borrow_mut()
            .remove(&shape)
            .ok_or_else(|| SurfaceError::new(format!("unknown shape {shape}")))?;
        self.state.editable.borrow_mut().push((shape, feature, None));
        Ok(())
    }

    fn remove_shape(&self, shape: ShapeId) -> Result<(), SurfaceError> {
        let mut editable = self.state.editable.borrow_mut();
        let before = editable.len();
        editable.retain(|(id, _, _)| *id != shape);
        if editable.len() == before {
            return Err(SurfaceError::new(format!("unknown shape {shape}")));
        }
        Ok(())
    }

    fn clear_editable(&self) {
        self.state.editable.borrow_mut().clear();
        self.record(Call::ClearEditable);
    }

    fn editable_geojson(&self) -> Result<Value, SurfaceError> {
        if let Some(result) = self.state.serialize_override.borrow().clone() {
            return result;
        }
        let features = self
            .state
            .editable
            .borrow()
            .iter()
            .map(|(_, feature, _)| feature.clone())
            .collect();
        FeatureCollection::new(features)
            .to_value()
            .map_err(|err| SurfaceError::new(err.to_string()))
    }

    fn editable_bounds(&self) -> Option<LatLngBounds> {
        self.state
            .editable
            .borrow()
            .iter()
            .filter_map(|(_, feature, _)| feature.bounds())
            .reduce(|acc, next| acc.union(&next))
    }

    fn add_background_feature(
        &self,
        feature: &Feature,
        decoration: &FeatureDecoration,
    ) -> Result<(), SurfaceError> {
        self.state
            .background
            .borrow_mut()
            .push((feature.clone(), decoration.clone()));
        Ok(())
    }

    fn clear_background(&self) {
        self.state.background.borrow_mut().clear();
        self.record(Call::ClearBackground);
    }

    fn destroy(&self) {
        self.state.events.borrow_mut().take();
        self.record(Call::Destroy);
    }
}

#[derive(Default)]
pub struct FakeFactory {
    surfaces: RefCell<Vec<FakeSurface>>,
    options: RefCell<Vec<SurfaceOptions>>,
    fail: Cell<bool>,
    without_toolbar: Cell<bool>,
}

impl FakeFactory {
    pub fn created(&self) -> usize {
        self.surfaces.borrow().len()
    }

    pub fn surface(&self, index: usize) -> FakeSurface {
        self.surfaces.borrow()[index].clone()
    }

    pub fn last(&self) -> FakeSurface {
        self.surfaces.borrow().last().cloned().unwrap()
    }

    pub fn last_options(&self) -> SurfaceOptions {
        self.options.borrow().last().cloned().unwrap()
    }

    pub fn fail_next(&self) {
        self.fail.set(true);
    }

    /// Surfaces created from now on refuse to install the drawing toolbar.
    pub fn without_toolbar(&self) {
        self.without_toolbar.set(true);
    }
}

impl SurfaceFactory<Element> for FakeFactory {
    fn create(
        &self,
        _element: &Element,
        options: &SurfaceOptions,
        events: EventSink,
    ) -> Result<Box<dyn MapSurface>, SurfaceError> {
        if self.fail.replace(false) {
            return Err(SurfaceError::new("map library not loaded"));
        }
        let surface = FakeSurface::default();
        *surface.state.events.borrow_mut() = Some(events);
        if self.without_toolbar.get() {
            surface.fail_toolbar();
        }
        self.surfaces.borrow_mut().push(surface.clone());
        self.options.borrow_mut().push(options.clone());
        Ok(Box::new(surface))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, Value>>,
    writes: RefCell<Vec<(String, Value, bool)>>,
    refreshes: Cell<usize>,
    handlers: RefCell<Vec<(String, Rc<dyn Fn()>)>>,
}

impl MemoryStore {
    pub fn put(&self, path: &str, value: Value) {
        self.values.borrow_mut().insert(path.to_string(), value);
    }

    pub fn value(&self, path: &str) -> Option<Value> {
        self.values.borrow().get(path).cloned()
    }

    pub fn writes(&self) -> Vec<(String, Value, bool)> {
        self.writes.borrow().clone()
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.get()
    }

    /// Dispatches a host event to every listener registered for it.
    pub fn fire(&self, event: &str) {
        let handlers: Vec<_> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler();
        }
    }
}

impl StateStore for MemoryStore {
    fn get(&self, path: &str) -> Option<Value> {
        self.value(path)
    }

    fn set(&self, path: &str, value: Value, refresh_server_side: bool) {
        self.put(path, value.clone());
        self.writes
            .borrow_mut()
            .push((path.to_string(), value, refresh_server_side));
    }

    fn on(&self, event: &str, handler: Rc<dyn Fn()>) {
        self.handlers.borrow_mut().push((event.to_string(), handler));
    }

    fn refresh(&self) {
        self.refreshes.set(self.refreshes.get() + 1);
    }
}

enum Action {
    Once(Box<dyn FnOnce()>),
    Repeat(Box<dyn FnMut()>),
}

struct Task {
    id: u64,
    due: u64,
    period: u64,
    action: Action,
    canceled: Rc<Cell<bool>>,
}

/// Timers on a virtual clock that only moves through [`ManualScheduler::advance`].
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<u64>,
    next_id: Cell<u64>,
    tasks: RefCell<Vec<Task>>,
}

impl ManualScheduler {
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    pub fn pending(&self) -> usize {
        self.tasks
            .borrow()
            .iter()
            .filter(|task| !task.canceled.get())
            .count()
    }

    pub fn advance(&self, ms: u64) {
        let target = self.now.get() + ms;
        loop {
            let next = {
                let mut tasks = self.tasks.borrow_mut();
                tasks.retain(|task| !task.canceled.get());
                let index = tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, task)| task.due <= target)
                    .min_by_key(|(_, task)| (task.due, task.id))
                    .map(|(index, _)| index);
                index.map(|index| tasks.remove(index))
            };
            let Some(task) = next else {
                break;
            };
            self.now.set(task.due);
            match task.action {
                Action::Once(run) => run(),
                Action::Repeat(mut run) => {
                    run();
                    if !task.canceled.get() {
                        self.tasks.borrow_mut().push(Task {
                            id: task.id,
                            due: task.due + task.period,
                            period: task.period,
                            action: Action::Repeat(run),
                            canceled: task.canceled,
                        });
                    }
                }
            }
        }
        self.now.set(target);
    }

    fn push(&self, delay_ms: u32, period: u64, action: Action) -> TaskHandle {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let canceled = Rc::new(Cell::new(false));
        self.tasks.borrow_mut().push(Task {
            id,
            due: self.now.get() + u64::from(delay_ms),
            period,
            action,
            canceled: canceled.clone(),
        });
        TaskHandle::new(move || canceled.set(true))
    }
}

impl Scheduler for ManualScheduler {
    fn timeout(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskHandle {
        self.push(delay_ms, 0, Action::Once(task))
    }

    fn interval(&self, period_ms: u32, task: Box<dyn FnMut()>) -> TaskHandle {
        let period = u64::from(period_ms.max(1));
        self.push(period_ms.max(1), period, Action::Repeat(task))
    }
}

/// Answers from a queue of scripted fixes; with an empty queue the request
/// is parked until [`ScriptedGeolocation::resolve_parked`].
pub struct ScriptedGeolocation {
    supported: Cell<bool>,
    permission: Cell<bool>,
    answers: RefCell<VecDeque<Result<Position, GeolocationError>>>,
    parked: RefCell<Vec<PositionCallback>>,
    requests: Cell<usize>,
}

impl Default for ScriptedGeolocation {
    fn default() -> Self {
        Self {
            supported: Cell::new(true),
            permission: Cell::new(true),
            answers: RefCell::new(VecDeque::new()),
            parked: RefCell::new(Vec::new()),
            requests: Cell::new(0),
        }
    }
}

impl ScriptedGeolocation {
    pub fn unsupported() -> Self {
        let geolocation = Self::default();
        geolocation.supported.set(false);
        geolocation
    }

    pub fn deny_permission(&self) {
        self.permission.set(false);
    }

    pub fn answer(&self, result: Result<Position, GeolocationError>) {
        self.answers.borrow_mut().push_back(result);
    }

    pub fn answer_at(&self, lat: f64, lng: f64, accuracy: f64) {
        self.answer(Ok(Position {
            coords: LatLng::new(lat, lng),
            accuracy,
        }));
    }

    pub fn requests(&self) -> usize {
        self.requests.get()
    }

    pub fn parked(&self) -> usize {
        self.parked.borrow().len()
    }

    pub fn resolve_parked(&self, result: Result<Position, GeolocationError>) {
        let parked = std::mem::take(&mut *self.parked.borrow_mut());
        for callback in parked {
            callback(result.clone());
        }
    }
}

impl Geolocation for ScriptedGeolocation {
    fn is_supported(&self) -> bool {
        self.supported.get()
    }

    fn current_position(&self, callback: PositionCallback) {
        self.requests.set(self.requests.get() + 1);
        let answer = self.answers.borrow_mut().pop_front();
        match answer {
            Some(result) => callback(result),
            None => self.parked.borrow_mut().push(callback),
        }
    }

    fn check_permission(&self, callback: Box<dyn FnOnce(bool)>) {
        callback(self.permission.get());
    }
}

/// All fakes wired together, plus the diagnostics they produced.
pub struct Harness {
    pub store: Rc<MemoryStore>,
    pub scheduler: Rc<ManualScheduler>,
    pub geolocation: Rc<ScriptedGeolocation>,
    pub factory: Rc<FakeFactory>,
    pub log: Rc<RefCell<Vec<Diagnostic>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_geolocation(ScriptedGeolocation::default())
    }

    pub fn with_geolocation(geolocation: ScriptedGeolocation) -> Self {
        Self {
            store: Rc::new(MemoryStore::default()),
            scheduler: Rc::new(ManualScheduler::default()),
            geolocation: Rc::new(geolocation),
            factory: Rc::new(FakeFactory::default()),
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn services(&self) -> Services {
        let log = self.log.clone();
        Services {
            store: self.store.clone(),
            scheduler: self.scheduler.clone(),
            geolocation: self.geolocation.clone(),
            diagnostics: Diagnostics::new(Rc::new(move |diagnostic| {
                log.borrow_mut().push(diagnostic)
            })),
        }
    }

    pub fn init(
        &self,
        config: MapConfig,
        initial_state: Option<Value>,
    ) -> Result<MapController, MapError> {
        let snapshot = initial_state.map(|value| StateSnapshot::from_value(Some(value)));
        MapController::initialize(
            Some(&Element),
            self.factory.as_ref(),
            Rc::new(config),
            self.services(),
            snapshot.as_ref(),
        )
    }

    pub fn surface(&self) -> FakeSurface {
        self.factory.last()
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.log.borrow().iter().map(|diagnostic| diagnostic.code).collect()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.log.borrow().iter().any(|diagnostic| diagnostic.code == code)
    }

    pub fn count_level(&self, level: DiagnosticLevel) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|diagnostic| diagnostic.level == level)
            .count()
    }

    pub fn stored(&self) -> Value {
        self.store.value(STATE_PATH).unwrap_or(Value::Null)
    }
}
