use js_sys::{Array, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit};

pub struct VisibilityObserver {
    observer: IntersectionObserver,
    _callback: Closure<dyn FnMut(Array, IntersectionObserver)>,
}

impl VisibilityObserver {
    pub fn observe(element: &Element, on_change: impl Fn(bool) + 'static) -> Result<Self, JsValue> {
        let callback = Closure::<dyn FnMut(Array, IntersectionObserver)>::new(
            move |entries: Array, _observer: IntersectionObserver| {
                for entry in entries.iter() {
                    let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() else {
                        continue;
                    };
                    on_change(entry.intersection_ratio() > 0.0);
                }
            },
        );

        let init = js_sys::Object::new();
        Reflect::set(&init, &"root".into(), &JsValue::NULL)?;
        Reflect::set(&init, &"rootMargin".into(), &"0px".into())?;
        Reflect::set(&init, &"threshold".into(), &JsValue::from_f64(1.0))?;
        let init: IntersectionObserverInit = init.unchecked_into();

        let observer =
            IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)?;
        observer.observe(element);
        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

impl Drop for VisibilityObserver {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}
