pub mod browser;
mod js;
pub mod leaflet;
pub mod observer;
pub mod wire;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use map_picker_core::{MapConfig, MapPicker, Services, StateSnapshot};
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

use crate::browser::{console_diagnostics, BrowserGeolocation, GlooScheduler};
use crate::leaflet::LeafletFactory;
use crate::observer::VisibilityObserver;
use crate::wire::WireStore;

pub const SCRIPT_LOADED_EVENT: &str = "map-script-loaded";

thread_local! {
    static LOADED_SENT: Cell<bool> = Cell::new(false);
}

#[wasm_bindgen(start)]
pub fn start() {
    announce_loaded();
}

pub fn announce_loaded() {
    let already_sent = LOADED_SENT.with(|flag| flag.replace(true));
    if already_sent {
        return;
    }
    let Some(window) = web_sys::window() else {
        return;
    };
    match web_sys::CustomEvent::new(SCRIPT_LOADED_EVENT) {
        Ok(event) => {
            let _ = window.dispatch_event(&event);
        }
        Err(_) => gloo::console::warn!("map-picker: could not create load event"),
    }
}

pub fn config_from_js(config: &JsValue) -> Result<MapConfig, String> {
    let value = js::to_json(config).map_err(|err| err.to_string())?;
    MapConfig::from_value(value).map_err(|err| err.to_string())
}

fn state_from_js(state: &JsValue) -> Option<StateSnapshot> {
    if !js::is_present(state) {
        return None;
    }
    let value = js::to_json(state).ok()?;
    Some(StateSnapshot::from_value(Some(value)))
}

#[wasm_bindgen]
pub struct MapPickerHandle {
    picker: Rc<MapPicker<HtmlElement>>,
    observer: RefCell<Option<VisibilityObserver>>,
}

#[wasm_bindgen(js_name = mapPicker)]
pub fn map_picker(wire: JsValue, config: JsValue, state: JsValue) -> Result<MapPickerHandle, JsValue> {
    let config = config_from_js(&config).map_err(|err| JsValue::from_str(&err))?;
    let surfaces = LeafletFactory::from_window().map_err(|err| JsValue::from_str(&err.to_string()))?;
    let services = Services {
        store: Rc::new(WireStore::new(wire)),
        scheduler: Rc::new(GlooScheduler),
        geolocation: Rc::new(BrowserGeolocation::from_window()),
        diagnostics: console_diagnostics(),
    };
    let picker = MapPicker::new(config, services, Rc::new(surfaces), state_from_js(&state));
    Ok(MapPickerHandle {
        picker: Rc::new(picker),
        observer: RefCell::new(None),
    })
}

#[wasm_bindgen]
impl MapPickerHandle {
    pub fn attach(&self, el: HtmlElement) -> Result<(), JsValue> {
        self.observer.borrow_mut().take();
        self.picker
            .attach(Some(el.clone()))
            .map_err(|err| JsValue::from_str(&err.to_string()))?;

        let picker: Weak<MapPicker<HtmlElement>> = Rc::downgrade(&self.picker);
        let observer = VisibilityObserver::observe(&el, move |visible| {
            let Some(picker) = picker.upgrade() else {
                return;
            };
            if let Err(err) = picker.set_visible(visible) {
                gloo::console::warn!("map-picker: rebuild failed", err.to_string());
            }
        })?;
        *self.observer.borrow_mut() = Some(observer);
        Ok(())
    }

    pub fn refresh(&self) {
        self.picker.refresh();
    }

    #[wasm_bindgen(js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.picker.is_active()
    }

    pub fn destroy(&self) {
        self.observer.borrow_mut().take();
        self.picker.detach();
    }
}
