use js_sys::{Array, Function, Reflect, JSON};
use map_picker_core::{LatLng, LatLngBounds, SurfaceError};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};

pub(crate) fn is_present(value: &JsValue) -> bool {
    !value.is_null() && !value.is_undefined()
}

pub(crate) fn describe(err: JsValue) -> SurfaceError {
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        return SurfaceError::new(String::from(error.message()));
    }
    match err.as_string() {
        Some(message) => SurfaceError::new(message),
        None => SurfaceError::new(format!("{err:?}")),
    }
}

pub(crate) fn get(target: &JsValue, key: &str) -> Result<JsValue, SurfaceError> {
    Reflect::get(target, &JsValue::from_str(key)).map_err(describe)
}

pub(crate) fn set(target: &JsValue, key: &str, value: &JsValue) -> Result<(), SurfaceError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(describe)
}

pub(crate) fn function(target: &JsValue, name: &str) -> Result<Function, SurfaceError> {
    get(target, name)?
        .dyn_into::<Function>()
        .map_err(|_| SurfaceError::new(format!("{name} is not a function")))
}

pub(crate) fn call(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, SurfaceError> {
    let func = function(target, method)?;
    let array = Array::new();
    for arg in args {
        array.push(arg);
    }
    func.apply(target, &array).map_err(describe)
}

pub(crate) fn construct(target: &JsValue, class: &str, args: &[JsValue]) -> Result<JsValue, SurfaceError> {
    let ctor = function(target, class)?;
    let array = Array::new();
    for arg in args {
        array.push(arg);
    }
    Reflect::construct(&ctor, &array).map_err(describe)
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, SurfaceError> {
    let raw = serde_json::to_string(value).map_err(|err| SurfaceError::new(err.to_string()))?;
    JSON::parse(&raw).map_err(describe)
}

pub(crate) fn to_json(value: &JsValue) -> Result<Value, SurfaceError> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    let raw = JSON::stringify(value).map_err(describe)?;
    match raw.as_string() {
        Some(raw) => serde_json::from_str(&raw).map_err(|err| SurfaceError::new(err.to_string())),
        None => Ok(Value::Null),
    }
}

pub(crate) fn lat_lng(point: LatLng) -> JsValue {
    let array = Array::new();
    array.push(&JsValue::from_f64(point.lat));
    array.push(&JsValue::from_f64(point.lng));
    array.into()
}

pub(crate) fn bounds(bounds: LatLngBounds) -> JsValue {
    let array = Array::new();
    array.push(&lat_lng(bounds.south_west));
    array.push(&lat_lng(bounds.north_east));
    array.into()
}

pub(crate) fn read_lat_lng(value: &JsValue) -> Option<LatLng> {
    let lat = get(value, "lat").ok()?.as_f64()?;
    let lng = get(value, "lng").ok()?.as_f64()?;
    let point = LatLng::new(lat, lng);
    point.is_finite().then_some(point)
}

pub(crate) fn zoom_arg(zoom: Option<f64>) -> JsValue {
    zoom.map(JsValue::from_f64).unwrap_or(JsValue::UNDEFINED)
}
