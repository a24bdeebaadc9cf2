use serde_json::{Map, Value};

use crate::coord::LatLng;

pub const LAT_KEY: &str = "lat";
pub const LNG_KEY: &str = "lng";
pub const GEOJSON_KEY: &str = "geojson";
pub const BACKGROUND_KEY: &str = "background";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateSnapshot {
    fields: Map<String, Value>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(Value::Object(fields)) => Self { fields },
            _ => Self::default(),
        }
    }

    pub fn coordinate(&self) -> Option<LatLng> {
        let lat = self.fields.get(LAT_KEY)?.as_f64()?;
        let lng = self.fields.get(LNG_KEY)?.as_f64()?;
        let point = LatLng::new(lat, lng);
        point.is_finite().then_some(point)
    }

    pub fn geojson(&self) -> Option<&Value> {
        present(self.fields.get(GEOJSON_KEY))
    }

    pub fn background(&self) -> Option<&Value> {
        present(self.fields.get(BACKGROUND_KEY))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn with_coordinate(mut self, point: LatLng) -> Self {
        self.fields.insert(LAT_KEY.into(), Value::from(point.lat));
        self.fields.insert(LNG_KEY.into(), Value::from(point.lng));
        self
    }

    pub fn with_geojson(mut self, collection: Value) -> Self {
        self.fields.insert(GEOJSON_KEY.into(), collection);
        self
    }

    pub fn with_background(mut self, collection: Value) -> Self {
        self.fields.insert(BACKGROUND_KEY.into(), collection);
        self
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coordinate_requires_both_numbers() {
        let cases = [
            (json!({ "lat": 1.5, "lng": 2.5 }), Some(LatLng::new(1.5, 2.5))),
            (json!({ "lat": 0, "lng": 0 }), Some(LatLng::new(0.0, 0.0))),
            (json!({ "lat": 1.5 }), None),
            (json!({ "lat": null, "lng": 2.5 }), None),
            (json!({ "lat": "1.5", "lng": 2.5 }), None),
            (json!({}), None),
        ];
        for (value, expected) in cases {
            let snapshot = StateSnapshot::from_value(Some(value.clone()));
            assert_eq!(snapshot.coordinate(), expected, "snapshot {value}");
        }
    }

    #[test]
    fn non_object_values_read_as_empty() {
        assert!(StateSnapshot::from_value(Some(json!([1, 2]))).is_empty());
        assert!(StateSnapshot::from_value(Some(Value::Null)).is_empty());
        assert!(StateSnapshot::from_value(None).is_empty());
    }

    #[test]
    fn writes_keep_unrelated_fields() {
        let snapshot = StateSnapshot::from_value(Some(json!({
            "geojson": { "type": "FeatureCollection", "features": [] },
            "note": "keep me"
        })));
        let updated = snapshot.with_coordinate(LatLng::new(3.0, 4.0)).into_value();
        assert_eq!(updated["note"], json!("keep me"));
        assert_eq!(updated["geojson"]["type"], json!("FeatureCollection"));
        assert_eq!(updated["lat"], json!(3.0));
    }

    #[test]
    fn null_geometry_counts_as_absent() {
        let snapshot = StateSnapshot::from_value(Some(json!({ "geojson": null })));
        assert!(snapshot.geojson().is_none());
        assert!(snapshot.background().is_none());
    }
}
