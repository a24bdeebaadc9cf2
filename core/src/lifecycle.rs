use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::MapConfig;
use crate::controller::{MapController, Services, WeakController};
use crate::diagnostics;
use crate::error::MapError;
use crate::snapshot::StateSnapshot;
use crate::store::REFRESH_EVENT;
use crate::surface::{SurfaceEvent, SurfaceFactory};

pub struct MapPicker<E: 'static> {
    inner: Rc<PickerInner<E>>,
}

struct PickerInner<E: 'static> {
    config: Rc<MapConfig>,
    services: Services,
    surfaces: Rc<dyn SurfaceFactory<E>>,
    /// Consumed by the first construction only; later ones read the store.
    initial_state: RefCell<Option<StateSnapshot>>,
    element: RefCell<Option<E>>,
    controller: RefCell<Option<MapController>>,
}

impl<E: 'static> MapPicker<E> {
    pub fn new(
        config: MapConfig,
        services: Services,
        surfaces: Rc<dyn SurfaceFactory<E>>,
        initial_state: Option<StateSnapshot>,
    ) -> Self {
        let unknown = config.unknown_keys();
        if !unknown.is_empty() {
            services.diagnostics.warn(
                diagnostics::CONFIG_UNKNOWN_KEYS,
                format!("ignoring unknown config keys: {}", unknown.join(", ")),
            );
        }

        let inner = Rc::new(PickerInner {
            config: Rc::new(config),
            services,
            surfaces,
            initial_state: RefCell::new(initial_state),
            element: RefCell::new(None),
            controller: RefCell::new(None),
        });

        let weak: Weak<PickerInner<E>> = Rc::downgrade(&inner);
        inner.services.store.on(
            REFRESH_EVENT,
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.refresh();
                }
            }),
        );

        Self { inner }
    }

    pub fn config(&self) -> &MapConfig {
        &self.inner.config
    }

    pub fn attach(&self, element: Option<E>) -> Result<(), MapError> {
        self.inner.teardown();
        *self.inner.element.borrow_mut() = element;
        self.inner.build()
    }

    pub fn set_visible(&self, visible: bool) -> Result<(), MapError> {
        if visible {
            if self.is_active() {
                return Ok(());
            }
            self.inner.build()
        } else {
            self.inner.teardown();
            Ok(())
        }
    }

    pub fn refresh(&self) {
        self.inner.refresh();
    }

    pub fn handle_event(&self, event: SurfaceEvent) {
        let controller = self.inner.controller.borrow();
        if let Some(controller) = controller.as_ref() {
            controller.handle_event(event);
        }
    }

    pub fn detach(&self) {
        self.inner.teardown();
        self.inner.element.borrow_mut().take();
    }

    pub fn is_active(&self) -> bool {
        self.inner.controller.borrow().is_some()
    }

    pub fn controller(&self) -> Option<WeakController> {
        self.inner
            .controller
            .borrow()
            .as_ref()
            .map(MapController::downgrade)
    }

    pub fn with_controller<R>(&self, action: impl FnOnce(&MapController) -> R) -> Option<R> {
        let controller = self.inner.controller.borrow();
        controller.as_ref().map(action)
    }
}

impl<E: 'static> Drop for MapPicker<E> {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl<E: 'static> PickerInner<E> {
    fn build(&self) -> Result<(), MapError> {
        let initial_state = self.initial_state.borrow_mut().take();
        let element = self.element.borrow();
        let result = MapController::initialize(
            element.as_ref(),
            self.surfaces.as_ref(),
            self.config.clone(),
            self.services.clone(),
            initial_state.as_ref(),
        );
        match result {
            Ok(controller) => {
                *self.controller.borrow_mut() = Some(controller);
                Ok(())
            }
            Err(err) => {
                self.services
                    .diagnostics
                    .error(diagnostics::SURFACE_CREATE_FAILED, err.to_string());
                Err(err)
            }
        }
    }

    fn refresh(&self) {
        let controller = self.controller.borrow();
        if let Some(controller) = controller.as_ref() {
            controller.refresh();
        }
    }

    fn teardown(&self) {
        let controller = self.controller.borrow_mut().take();
        if let Some(controller) = controller {
            controller.teardown();
        }
    }
}
