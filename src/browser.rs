use std::cell::RefCell;
use std::rc::Rc;

use gloo::timers::callback::{Interval, Timeout};
use map_picker_core::geolocation::PositionCallback;
use map_picker_core::{
    Diagnostic, DiagnosticLevel, Diagnostics, Geolocation, GeolocationError, LatLng, Position,
    Scheduler, TaskHandle,
};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsValue;

use crate::js;

pub struct GlooScheduler;

impl Scheduler for GlooScheduler {
    fn timeout(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskHandle {
        let timeout = Timeout::new(delay_ms, task);
        TaskHandle::new(move || drop(timeout))
    }

    fn interval(&self, period_ms: u32, mut task: Box<dyn FnMut()>) -> TaskHandle {
        let interval = Interval::new(period_ms, move || task());
        TaskHandle::new(move || drop(interval))
    }
}

pub struct BrowserGeolocation {
    api: Option<JsValue>,
}

impl BrowserGeolocation {
    pub fn from_window() -> Self {
        let api = web_sys::window()
            .map(|window| JsValue::from(window.navigator()))
            .and_then(|navigator| js::get(&navigator, "geolocation").ok())
            .filter(js::is_present);
        Self { api }
    }

    fn request(&self, callback: PositionCallback) {
        let Some(api) = self.api.as_ref() else {
            callback(Err(GeolocationError::Unsupported));
            return;
        };
        // only one of the two handlers ever runs
        let slot = Rc::new(RefCell::new(Some(callback)));
        let on_success = {
            let slot = slot.clone();
            Closure::once_into_js(move |position: JsValue| {
                if let Some(callback) = slot.borrow_mut().take() {
                    callback(read_position(&position));
                }
            })
        };
        let on_error = {
            let slot = slot.clone();
            Closure::once_into_js(move |error: JsValue| {
                if let Some(callback) = slot.borrow_mut().take() {
                    callback(Err(read_error(&error)));
                }
            })
        };
        let options = js_sys::Object::new();
        let _ = js::set(&options, "enableHighAccuracy", &JsValue::TRUE);
        if let Err(err) = js::call(api, "getCurrentPosition", &[on_success, on_error, options.into()]) {
            if let Some(callback) = slot.borrow_mut().take() {
                callback(Err(GeolocationError::Other(err.to_string())));
            }
        }
    }
}

impl Geolocation for BrowserGeolocation {
    fn is_supported(&self) -> bool {
        self.api.is_some()
    }

    fn current_position(&self, callback: PositionCallback) {
        self.request(callback);
    }

    fn check_permission(&self, callback: Box<dyn FnOnce(bool)>) {
        self.request(Box::new(move |result| callback(result.is_ok())));
    }
}

fn read_position(position: &JsValue) -> Result<Position, GeolocationError> {
    let coords = js::get(position, "coords")
        .map_err(|err| GeolocationError::Other(err.to_string()))?;
    let number = |key: &str| js::get(&coords, key).ok().and_then(|value| value.as_f64());
    match (number("latitude"), number("longitude")) {
        (Some(lat), Some(lng)) => Ok(Position {
            coords: LatLng::new(lat, lng),
            accuracy: number("accuracy").unwrap_or(f64::NAN),
        }),
        _ => Err(GeolocationError::Other("position without coordinates".into())),
    }
}

fn read_error(error: &JsValue) -> GeolocationError {
    let code = js::get(error, "code")
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or(0.0) as u16;
    let message = js::get(error, "message")
        .ok()
        .and_then(|value| value.as_string())
        .unwrap_or_default();
    GeolocationError::from_code(code, &message)
}

pub fn console_diagnostics() -> Diagnostics {
    Diagnostics::new(Rc::new(|diagnostic: Diagnostic| {
        let line = format!("map-picker [{}] {}", diagnostic.code, diagnostic.message);
        match diagnostic.level {
            DiagnosticLevel::Debug => gloo::console::debug!(line),
            DiagnosticLevel::Info => gloo::console::info!(line),
            DiagnosticLevel::Warn => gloo::console::warn!(line),
            DiagnosticLevel::Error => gloo::console::error!(line),
        }
    }))
}
