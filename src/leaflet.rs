use std::cell::RefCell;
use std::rc::Rc;

use gloo::events::EventListener;
use js_sys::{Array, Object};
use map_picker_core::geometry::{EditOptions, PointRender};
use map_picker_core::surface::{DrawToolbar, EventSink};
use map_picker_core::{
    Feature, FeatureDecoration, LatLng, LatLngBounds, MapSurface, ShapeId, SurfaceError,
    SurfaceEvent, SurfaceFactory, SurfaceOptions,
};
use serde_json::Value;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, HtmlElement};

use crate::js;

const MARKER_SIZE: f64 = 36.0;
const LOCATION_TITLE: &str = "Get current location";
const BUTTON_ENABLED: &str = "map-location-button-enabled";
const BUTTON_DISABLED: &str = "map-location-button-disabled";
const PIN_PATH: &str = "M12 0c-4.198 0-8 3.403-8 7.602 0 4.198 3.469 9.21 8 16.398 4.531-7.188 8-12.2 8-16.398 0-4.199-3.801-7.602-8-7.602zm0 11c-1.657 0-3-1.343-3-3s1.343-3 3-3 3 1.343 3 3-1.343 3-3 3z";

type Listener = Closure<dyn FnMut(JsValue)>;

pub struct LeafletFactory {
    leaflet: JsValue,
}

impl LeafletFactory {
    pub fn from_window() -> Result<Self, SurfaceError> {
        let window = web_sys::window().ok_or_else(|| SurfaceError::new("no window"))?;
        let leaflet = js::get(&window, "L")?;
        if !js::is_present(&leaflet) {
            return Err(SurfaceError::new("Leaflet is not loaded"));
        }
        Ok(Self { leaflet })
    }
}

impl SurfaceFactory<HtmlElement> for LeafletFactory {
    fn create(
        &self,
        element: &HtmlElement,
        options: &SurfaceOptions,
        events: EventSink,
    ) -> Result<Box<dyn MapSurface>, SurfaceError> {
        let l = &self.leaflet;
        let base_maps = Object::new();
        let mut first_layer = None;
        for layer in &options.base_layers {
            let tile = js::call(
                l,
                "tileLayer",
                &[JsValue::from_str(&layer.url), js::to_js(&layer.options)?],
            )?;
            js::set(&base_maps, &layer.label, &tile)?;
            first_layer.get_or_insert(tile);
        }

        let map_options = js::to_js(&options.controls)?;
        if let Some(tile) = first_layer {
            js::set(&map_options, "layers", &Array::of1(&tile))?;
        }
        let map = js::call(l, "map", &[JsValue::from(element.clone()), map_options])?;
        if !options.attribution_prefix {
            let attribution = js::get(&map, "attributionControl")?;
            if js::is_present(&attribution) {
                js::call(&attribution, "setPrefix", &[JsValue::FALSE])?;
            }
        }
        let controls = js::get(l, "control")?;
        let layer_control =
            js::call(&controls, "layers", &[base_maps.into(), Object::new().into()])?;
        js::call(&layer_control, "addTo", &[map.clone()])?;

        let surface = LeafletSurface {
            leaflet: l.clone(),
            map,
            layer_control,
            marker: RefCell::new(None),
            location: RefCell::new(None),
            editable: RefCell::new(None),
            background: RefCell::new(None),
            shapes: Rc::new(RefCell::new(ShapeRegistry::default())),
            events,
            listeners: RefCell::new(Vec::new()),
            layer_listeners: RefCell::new(Vec::new()),
        };
        surface.bind_map_events()?;
        Ok(Box::new(surface))
    }
}

#[derive(Default)]
struct ShapeRegistry {
    next: ShapeId,
    layers: Vec<(ShapeId, JsValue)>,
}

impl ShapeRegistry {
    fn insert(&mut self, layer: JsValue) -> ShapeId {
        if let Some(id) = self.find(&layer) {
            return id;
        }
        self.next += 1;
        self.layers.push((self.next, layer));
        self.next
    }

    fn find(&self, layer: &JsValue) -> Option<ShapeId> {
        self.layers
            .iter()
            .find(|(_, known)| Object::is(known, layer))
            .map(|(id, _)| *id)
    }

    fn get(&self, id: ShapeId) -> Option<JsValue> {
        self.layers
            .iter()
            .find(|(known, _)| *known == id)
            .map(|(_, layer)| layer.clone())
    }

    fn remove(&mut self, id: ShapeId) -> Option<JsValue> {
        let index = self.layers.iter().position(|(known, _)| *known == id)?;
        Some(self.layers.remove(index).1)
    }

    fn clear(&mut self) {
        self.layers.clear();
    }
}

struct LocationControl {
    control: JsValue,
    button: Element,
    _on_add: Closure<dyn FnMut(JsValue) -> JsValue>,
    _on_remove: Closure<dyn FnMut(JsValue)>,
    _click: EventListener,
}

struct LeafletSurface {
    leaflet: JsValue,
    map: JsValue,
    layer_control: JsValue,
    marker: RefCell<Option<JsValue>>,
    location: RefCell<Option<LocationControl>>,
    editable: RefCell<Option<JsValue>>,
    background: RefCell<Option<JsValue>>,
    shapes: Rc<RefCell<ShapeRegistry>>,
    events: EventSink,
    listeners: RefCell<Vec<Listener>>,
    layer_listeners: RefCell<Vec<Listener>>,
}

impl LeafletSurface {
    fn on(&self, target: &JsValue, event: &str, handler: impl FnMut(JsValue) + 'static) -> Result<(), SurfaceError> {
        let listener = listen(target, event, handler)?;
        self.listeners.borrow_mut().push(listener);
        Ok(())
    }

    fn bind_map_events(&self) -> Result<(), SurfaceError> {
        let events = self.events.clone();
        self.on(&self.map, "click", move |event| {
            let point = js::get(&event, "latlng").ok().and_then(|value| js::read_lat_lng(&value));
            if let Some(point) = point {
                events(SurfaceEvent::Click(point));
            }
        })?;

        let events = self.events.clone();
        self.on(&self.map, "drag", move |_| events(SurfaceEvent::Drag))?;

        let events = self.events.clone();
        self.on(&self.map, "load", move |_| events(SurfaceEvent::Load))?;

        let events = self.events.clone();
        let shapes = self.shapes.clone();
        self.on(&self.map, "pm:create", move |event| {
            let Some(layer) = event_layer(&event) else {
                return;
            };
            let id = shapes.borrow_mut().insert(layer);
            events(SurfaceEvent::ShapeCreated(id));
        })?;

        let events = self.events.clone();
        self.on(&self.map, "pm:edit", move |_| events(SurfaceEvent::ShapeEdited))?;

        let events = self.events.clone();
        let shapes = self.shapes.clone();
        self.on(&self.map, "pm:remove", move |event| {
            let Some(layer) = event_layer(&event) else {
                return;
            };
            let id = shapes.borrow_mut().insert(layer);
            events(SurfaceEvent::ShapeRemoved(id));
        })
    }

    fn feature_group(&self) -> Result<JsValue, SurfaceError> {
        let group = js::call(&self.leaflet, "featureGroup", &[])?;
        js::call(&group, "addTo", &[self.map.clone()])?;
        Ok(group)
    }

    /// Turns one feature into map layers. `pointToLayer` only runs inside
    /// the `L.geoJSON` call, so its closure can go once that returns.
    fn feature_layers(&self, feature: &Feature, decoration: &FeatureDecoration) -> Result<Vec<JsValue>, SurfaceError> {
        let style = js::to_js(&decoration.style)?;
        let leaflet = self.leaflet.clone();
        let point = decoration.point.clone();
        let point_style = style.clone();
        let point_to_layer = Closure::<dyn FnMut(JsValue, JsValue) -> JsValue>::new(
            move |_feature: JsValue, at: JsValue| -> JsValue {
                let layer = match &point {
                    PointRender::CircleMarker { radius } => {
                        let options = Object::assign(&Object::new(), point_style.unchecked_ref());
                        let _ = js::set(&options, "radius", &JsValue::from_f64(*radius));
                        js::call(&leaflet, "circleMarker", &[at, options.into()])
                    }
                    PointRender::Marker { icon } => js::to_js(icon)
                        .and_then(|icon| js::call(&leaflet, "icon", &[icon]))
                        .and_then(|icon| {
                            let options = Object::new();
                            js::set(&options, "icon", &icon)?;
                            js::call(&leaflet, "marker", &[at, options.into()])
                        }),
                };
                layer.unwrap_or(JsValue::NULL)
            },
        );

        let options = Object::new();
        js::set(&options, "style", &style)?;
        let callback: &JsValue = point_to_layer.as_ref();
        js::set(&options, "pointToLayer", callback)?;
        let group = js::call(&self.leaflet, "geoJSON", &[js::to_js(feature)?, options.into()])?;
        drop(point_to_layer);

        let layers = js::call(&group, "getLayers", &[])?;
        let layers: Array = layers.unchecked_into();
        let mut out = Vec::with_capacity(layers.length() as usize);
        for layer in layers.iter() {
            if let Some(popup) = decoration.popup.as_deref() {
                js::call(&layer, "bindPopup", &[JsValue::from_str(popup)])?;
            }
            if let Some(tooltip) = decoration.tooltip.as_deref() {
                js::call(&layer, "bindTooltip", &[JsValue::from_str(tooltip)])?;
            }
            out.push(layer);
        }
        Ok(out)
    }

    fn enable_editing(layer: &JsValue, edit: Option<&EditOptions>) -> Result<(), SurfaceError> {
        let pm = js::get(layer, "pm")?;
        if !js::is_present(&pm) {
            return Err(SurfaceError::new("layer has no editing handle"));
        }
        let args = match edit {
            Some(edit) => vec![js::to_js(edit)?],
            None => Vec::new(),
        };
        js::call(&pm, "enable", &args)?;
        Ok(())
    }

    fn require_editable(&self) -> Result<JsValue, SurfaceError> {
        self.editable
            .borrow()
            .clone()
            .ok_or_else(|| SurfaceError::new("drawing layer is not set up"))
    }

    fn log_failure(action: &str, result: Result<JsValue, SurfaceError>) {
        if let Err(err) = result {
            gloo::console::warn!("map-picker: leaflet call failed", action, err.to_string());
        }
    }
}

fn listen(target: &JsValue, event: &str, handler: impl FnMut(JsValue) + 'static) -> Result<Listener, SurfaceError> {
    let listener = Listener::new(handler);
    let callback: &JsValue = listener.as_ref();
    js::call(target, "on", &[JsValue::from_str(event), callback.clone()])?;
    Ok(listener)
}

fn event_layer(event: &JsValue) -> Option<JsValue> {
    js::get(event, "layer").ok().filter(js::is_present)
}

fn marker_icon_html(color: &str) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" class=\"map-icon\" fill=\"{color}\" width=\"36\" height=\"36\" viewBox=\"0 0 24 24\"><path d=\"{PIN_PATH}\"/></svg>"
    )
}

fn read_bounds(bounds: &JsValue) -> Option<LatLngBounds> {
    let valid = js::call(bounds, "isValid", &[]).ok()?.as_bool()?;
    if !valid {
        return None;
    }
    let south_west = js::read_lat_lng(&js::call(bounds, "getSouthWest", &[]).ok()?)?;
    let north_east = js::read_lat_lng(&js::call(bounds, "getNorthEast", &[]).ok()?)?;
    Some(LatLngBounds::new(south_west, north_east))
}

impl MapSurface for LeafletSurface {
    fn set_view(&self, center: LatLng, zoom: Option<f64>) {
        let result = js::call(&self.map, "setView", &[js::lat_lng(center), js::zoom_arg(zoom)]);
        Self::log_failure("setView", result);
    }

    fn fly_to(&self, center: LatLng, zoom: Option<f64>) {
        let result = js::call(&self.map, "flyTo", &[js::lat_lng(center), js::zoom_arg(zoom)]);
        Self::log_failure("flyTo", result);
    }

    fn fit_bounds(&self, bounds: LatLngBounds) {
        Self::log_failure("fitBounds", js::call(&self.map, "fitBounds", &[js::bounds(bounds)]));
    }

    fn fly_to_bounds(&self, bounds: LatLngBounds) {
        Self::log_failure("flyToBounds", js::call(&self.map, "flyToBounds", &[js::bounds(bounds)]));
    }

    fn set_max_bounds(&self, bounds: LatLngBounds) {
        Self::log_failure("setMaxBounds", js::call(&self.map, "setMaxBounds", &[js::bounds(bounds)]));
    }

    fn pan_inside_bounds(&self, bounds: LatLngBounds) {
        let options = Object::new();
        let _ = js::set(&options, "animate", &JsValue::FALSE);
        let result = js::call(&self.map, "panInsideBounds", &[js::bounds(bounds), options.into()]);
        Self::log_failure("panInsideBounds", result);
    }

    fn center(&self) -> LatLng {
        js::call(&self.map, "getCenter", &[])
            .ok()
            .and_then(|center| js::read_lat_lng(&center))
            .unwrap_or(LatLng::new(0.0, 0.0))
    }

    fn disable_dragging(&self) {
        let result = js::get(&self.map, "dragging").and_then(|dragging| js::call(&dragging, "disable", &[]));
        Self::log_failure("dragging.disable", result);
    }

    fn invalidate_size(&self) {
        Self::log_failure("invalidateSize", js::call(&self.map, "invalidateSize", &[JsValue::TRUE]));
    }

    fn add_marker(&self, at: LatLng, color: &str) {
        let build = || -> Result<JsValue, SurfaceError> {
            let icon_options = Object::new();
            js::set(&icon_options, "html", &JsValue::from_str(&marker_icon_html(color)))?;
            js::set(&icon_options, "className", &JsValue::from_str(""))?;
            let size = Array::of2(&MARKER_SIZE.into(), &MARKER_SIZE.into());
            js::set(&icon_options, "iconSize", &size)?;
            let anchor = Array::of2(&(MARKER_SIZE / 2.0).into(), &MARKER_SIZE.into());
            js::set(&icon_options, "iconAnchor", &anchor)?;
            let icon = js::call(&self.leaflet, "divIcon", &[icon_options.into()])?;

            let options = Object::new();
            js::set(&options, "icon", &icon)?;
            js::set(&options, "draggable", &JsValue::FALSE)?;
            js::set(&options, "autoPan", &JsValue::TRUE)?;
            let marker = js::call(&self.leaflet, "marker", &[js::lat_lng(at), options.into()])?;
            js::call(&marker, "addTo", &[self.map.clone()])?;
            Ok(marker)
        };
        match build() {
            Ok(marker) => *self.marker.borrow_mut() = Some(marker),
            Err(err) => gloo::console::warn!("map-picker: marker unavailable", err.to_string()),
        }
    }

    fn move_marker(&self, to: LatLng) {
        if let Some(marker) = self.marker.borrow().as_ref() {
            Self::log_failure("setLatLng", js::call(marker, "setLatLng", &[js::lat_lng(to)]));
        }
    }

    fn remove_marker(&self) {
        if let Some(marker) = self.marker.borrow_mut().take() {
            Self::log_failure("marker.remove", js::call(&marker, "remove", &[]));
        }
    }

    fn add_location_button(&self) -> Result<(), SurfaceError> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| SurfaceError::new("no document"))?;
        let container = document.create_element("div").map_err(js::describe)?;
        container.set_class_name("leaflet-bar leaflet-control");
        container.set_attribute("title", LOCATION_TITLE).map_err(js::describe)?;
        let button = document.create_element("a").map_err(js::describe)?;
        button.set_class_name(&format!("leaflet-control-button {BUTTON_ENABLED}"));
        container.append_child(&button).map_err(js::describe)?;

        let dom_event = js::get(&self.leaflet, "DomEvent")?;
        js::call(&dom_event, "disableClickPropagation", &[button.clone().into()])?;

        let events = self.events.clone();
        let click = EventListener::new(&button, "click", move |_| {
            events(SurfaceEvent::LocationButtonClicked);
        });

        let on_add = {
            let container = container.clone();
            Closure::<dyn FnMut(JsValue) -> JsValue>::new(move |_map: JsValue| -> JsValue {
                container.clone().into()
            })
        };
        let on_remove = {
            let button = button.clone();
            Closure::<dyn FnMut(JsValue)>::new(move |_map: JsValue| {
                let classes = button.class_list();
                let _ = classes.remove_2(BUTTON_ENABLED, BUTTON_DISABLED);
            })
        };
        let options = Object::new();
        js::set(&options, "position", &JsValue::from_str("bottomright"))?;
        let control = js::call(&self.leaflet, "control", &[options.into()])?;
        let callback: &JsValue = on_add.as_ref();
        js::set(&control, "onAdd", callback)?;
        let callback: &JsValue = on_remove.as_ref();
        js::set(&control, "onRemove", callback)?;
        js::call(&control, "addTo", &[self.map.clone()])?;

        *self.location.borrow_mut() = Some(LocationControl {
            control,
            button,
            _on_add: on_add,
            _on_remove: on_remove,
            _click: click,
        });
        Ok(())
    }

    fn set_location_button_enabled(&self, enabled: bool) {
        let location = self.location.borrow();
        let Some(location) = location.as_ref() else {
            return;
        };
        let (add, remove) = if enabled {
            (BUTTON_ENABLED, BUTTON_DISABLED)
        } else {
            (BUTTON_DISABLED, BUTTON_ENABLED)
        };
        let classes = location.button.class_list();
        let _ = classes.add_1(add);
        let _ = classes.remove_1(remove);
    }

    fn add_draw_toolbar(&self, toolbar: &DrawToolbar) -> Result<(), SurfaceError> {
        let pm = js::get(&self.map, "pm")?;
        if !js::is_present(&pm) {
            return Err(SurfaceError::new("geoman plugin is not loaded"));
        }
        js::call(&pm, "addControls", &[js::to_js(toolbar)?])?;
        *self.editable.borrow_mut() = Some(self.feature_group()?);
        Ok(())
    }

    fn add_hash(&self) {
        // leaflet-hash is optional
        if js::function(&self.map, "addHash").is_ok() {
            Self::log_failure("addHash", js::call(&self.map, "addHash", &[]));
        }
    }

    fn add_editable_feature(&self, feature: &Feature, decoration: &FeatureDecoration) -> Result<(), SurfaceError> {
        let editable = self.require_editable()?;
        for layer in self.feature_layers(feature, decoration)? {
            js::call(&editable, "addLayer", &[layer.clone()])?;
            self.shapes.borrow_mut().insert(layer.clone());
            if let Some(edit) = decoration.edit.as_ref() {
                Self::enable_editing(&layer, Some(edit))?;
            }
            let events = self.events.clone();
            let listener = listen(&layer, "pm:edit", move |_| events(SurfaceEvent::ShapeEdited))?;
            self.layer_listeners.borrow_mut().push(listener);
        }
        Ok(())
    }

    fn adopt_shape(&self, shape: ShapeId) -> Result<(), SurfaceError> {
        let editable = self.require_editable()?;
        let layer = self
            .shapes
            .borrow()
            .get(shape)
            .ok_or_else(|| SurfaceError::new(format!("unknown shape {shape}")))?;
        Self::enable_editing(&layer, None)?;
        js::call(&editable, "addLayer", &[layer])?;
        Ok(())
    }

    fn remove_shape(&self, shape: ShapeId) -> Result<(), SurfaceError> {
        let editable = self.require_editable()?;
        let layer = self
            .shapes
            .borrow_mut()
            .remove(shape)
            .ok_or_else(|| SurfaceError::new(format!("unknown shape {shape}")))?;
        js::call(&editable, "removeLayer", &[layer])?;
        Ok(())
    }

    fn clear_editable(&self) {
        if let Some(editable) = self.editable.borrow().as_ref() {
            Self::log_failure("clearLayers", js::call(editable, "clearLayers", &[]));
        }
        self.shapes.borrow_mut().clear();
        self.layer_listeners.borrow_mut().clear();
    }

    fn editable_geojson(&self) -> Result<Value, SurfaceError> {
        let editable = self.require_editable()?;
        js::to_json(&js::call(&editable, "toGeoJSON", &[])?)
    }

    fn editable_bounds(&self) -> Option<LatLngBounds> {
        let editable = self.editable.borrow().clone()?;
        read_bounds(&js::call(&editable, "getBounds", &[]).ok()?)
    }

    fn add_background_feature(&self, feature: &Feature, decoration: &FeatureDecoration) -> Result<(), SurfaceError> {
        let existing = self.background.borrow().clone();
        let group = match existing {
            Some(group) => group,
            None => {
                let group = self.feature_group()?;
                *self.background.borrow_mut() = Some(group.clone());
                group
            }
        };
        for layer in self.feature_layers(feature, decoration)? {
            js::call(&group, "addLayer", &[layer])?;
        }
        Ok(())
    }

    fn clear_background(&self) {
        if let Some(group) = self.background.borrow().as_ref() {
            Self::log_failure("clearLayers", js::call(group, "clearLayers", &[]));
        }
    }

    fn destroy(&self) {
        if let Some(location) = self.location.borrow_mut().take() {
            Self::log_failure("control.remove", js::call(&location.control, "remove", &[]));
        }
        Self::log_failure("layers.remove", js::call(&self.layer_control, "remove", &[]));
        if js::function(&self.map, "removeHash").is_ok() {
            Self::log_failure("removeHash", js::call(&self.map, "removeHash", &[]));
        }
        Self::log_failure("map.off", js::call(&self.map, "off", &[]));
        Self::log_failure("map.remove", js::call(&self.map, "remove", &[]));
        self.editable.borrow_mut().take();
        self.background.borrow_mut().take();
        self.shapes.borrow_mut().clear();
        self.layer_listeners.borrow_mut().clear();
        self.listeners.borrow_mut().clear();
    }
}
