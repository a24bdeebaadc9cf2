use std::cell::RefCell;
use std::rc::Rc;

use map_picker_core::StateStore;
use serde_json::Value;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsValue;

use crate::js;

pub struct WireStore {
    wire: JsValue,
    listeners: RefCell<Vec<Closure<dyn FnMut()>>>,
}

impl WireStore {
    pub fn new(wire: JsValue) -> Self {
        Self {
            wire,
            listeners: RefCell::new(Vec::new()),
        }
    }
}

impl StateStore for WireStore {
    fn get(&self, path: &str) -> Option<Value> {
        let value = match js::call(&self.wire, "get", &[JsValue::from_str(path)]) {
            Ok(value) => value,
            Err(err) => {
                gloo::console::warn!("map-picker: $wire.get failed", path, err.to_string());
                return None;
            }
        };
        match js::to_json(&value) {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(err) => {
                gloo::console::warn!("map-picker: unreadable state", path, err.to_string());
                None
            }
        }
    }

    fn set(&self, path: &str, value: Value, refresh_server_side: bool) {
        let result = js::to_js(&value).and_then(|value| {
            js::call(
                &self.wire,
                "set",
                &[
                    JsValue::from_str(path),
                    value,
                    JsValue::from_bool(refresh_server_side),
                ],
            )
        });
        if let Err(err) = result {
            gloo::console::warn!("map-picker: $wire.set failed", path, err.to_string());
        }
    }

    fn on(&self, event: &str, handler: Rc<dyn Fn()>) {
        let closure = Closure::<dyn FnMut()>::new(move || handler());
        let callback: &JsValue = closure.as_ref();
        let result = js::call(&self.wire, "on", &[JsValue::from_str(event), callback.clone()]);
        match result {
            Ok(_) => self.listeners.borrow_mut().push(closure),
            Err(err) => gloo::console::warn!("map-picker: $wire.on failed", event, err.to_string()),
        }
    }

    fn refresh(&self) {
        if let Err(err) = js::call(&self.wire, "$refresh", &[]) {
            gloo::console::warn!("map-picker: $wire.$refresh failed", err.to_string());
        }
    }
}
