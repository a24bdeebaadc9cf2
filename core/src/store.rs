use std::rc::Rc;

use serde_json::{json, Value};

use crate::coord::LatLng;
use crate::error::GeometryError;
use crate::geometry::{json_kind, parse_collection, FeatureCollection, FEATURE, FEATURE_COLLECTION};
use crate::snapshot::StateSnapshot;

pub const REFRESH_EVENT: &str = "refreshMap";

pub trait StateStore {
    fn get(&self, path: &str) -> Option<Value>;
    fn set(&self, path: &str, value: Value, refresh_server_side: bool);
    fn on(&self, event: &str, handler: Rc<dyn Fn()>);
    fn refresh(&self);
}

#[derive(Clone)]
pub struct StateSync {
    store: Rc<dyn StateStore>,
    state_path: String,
    default_location: LatLng,
    send_live: bool,
}

impl StateSync {
    pub fn new(
        store: Rc<dyn StateStore>,
        state_path: impl Into<String>,
        default_location: LatLng,
        send_live: bool,
    ) -> Self {
        Self {
            store,
            state_path: state_path.into(),
            default_location,
            send_live,
        }
    }

    pub fn state_path(&self) -> &str {
        &self.state_path
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::from_value(self.store.get(&self.state_path))
    }

    pub fn resolve(&self) -> LatLng {
        resolve_coordinate(&self.snapshot(), self.default_location)
    }

    pub fn set_coordinate(&self, point: LatLng) {
        let next = self.snapshot().with_coordinate(point).into_value();
        self.store.set(&self.state_path, next, false);
        if self.send_live {
            self.store.refresh();
        }
    }

    /// Replaces `geojson` with the serialized editable layer exactly as the
    /// surface produced it. Only non-objects and foreign GeoJSON types are
    /// refused. The returned model is `None` when the typed view cannot read
    /// the collection; the write still happens.
    pub fn push_geometry(
        &self,
        serialized: Value,
    ) -> Result<Option<FeatureCollection>, GeometryError> {
        let Value::Object(object) = &serialized else {
            return Err(GeometryError::NotAnObject(json_kind(&serialized)));
        };
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let stored = if kind == FEATURE_COLLECTION {
            serialized
        } else if kind == FEATURE {
            json!({ "type": FEATURE_COLLECTION, "features": [serialized] })
        } else {
            return Err(GeometryError::NotAFeatureCollection(kind));
        };
        let model = parse_collection(&stored).ok();
        let next = self.snapshot().with_geojson(stored).into_value();
        self.store.set(&self.state_path, next, true);
        Ok(model)
    }
}

pub fn resolve_coordinate(snapshot: &StateSnapshot, default_location: LatLng) -> LatLng {
    snapshot.coordinate().unwrap_or(default_location)
}
