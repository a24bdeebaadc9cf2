use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::config::GeoManConfig;
use crate::coord::{LatLng, LatLngBounds};
use crate::error::GeometryError;

pub const FEATURE_COLLECTION: &str = "FeatureCollection";
pub const FEATURE: &str = "Feature";
pub const POINT_POPUP: &str = "Point Location";
pub const POLYGON_POPUP: &str = "Polygon Area";

const POINT_RADIUS: f64 = 15.0;
const POINT_COLOR: &str = "#3388ff";
const POINT_FILL_OPACITY: f64 = 0.6;
const POLYGON_WEIGHT: f64 = 2.0;
const POLYGON_FILL_OPACITY: f64 = 0.4;
const BACKGROUND_COLOR: &str = "#f59e0b";
const BACKGROUND_WEIGHT: f64 = 2.0;
const BACKGROUND_FILL_OPACITY: f64 = 0.15;

pub type PathStyle = Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(flatten)]
    pub foreign: Map<String, Value>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: FEATURE_COLLECTION.to_string(),
            features,
            foreign: Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn bounds(&self) -> Option<LatLngBounds> {
        self.features
            .iter()
            .filter_map(Feature::bounds)
            .reduce(|acc, next| acc.union(&next))
    }

    pub fn to_value(&self) -> Result<Value, GeometryError> {
        serde_json::to_value(self).map_err(|err| GeometryError::Malformed(err.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_kind")]
    pub kind: String,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: FeatureProperties,
    #[serde(flatten)]
    pub foreign: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            kind: FEATURE.to_string(),
            geometry: Some(geometry),
            properties: FeatureProperties::default(),
            foreign: Map::new(),
        }
    }

    pub fn geometry_kind(&self) -> Option<&GeometryKind> {
        self.geometry.as_ref().map(|geometry| &geometry.kind)
    }

    pub fn bounds(&self) -> Option<LatLngBounds> {
        let geometry = self.geometry.as_ref()?;
        LatLngBounds::from_points(geometry.positions())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub coordinates: Value,
    #[serde(flatten)]
    pub foreign: Map<String, Value>,
}

impl Geometry {
    pub fn new(kind: GeometryKind, coordinates: Value) -> Self {
        Self {
            kind,
            coordinates,
            foreign: Map::new(),
        }
    }

    pub fn positions(&self) -> Vec<LatLng> {
        let mut out = Vec::new();
        collect_positions(&self.coordinates, &mut out);
        if let Some(Value::Array(members)) = self.foreign.get("geometries") {
            for member in members {
                if let Ok(geometry) = serde_json::from_value::<Geometry>(member.clone()) {
                    out.extend(geometry.positions());
                }
            }
        }
        out
    }
}

fn collect_positions(value: &Value, out: &mut Vec<LatLng>) {
    let Value::Array(items) = value else {
        return;
    };
    let is_position = items.len() >= 2 && items.iter().take(2).all(Value::is_number);
    if is_position {
        if let (Some(lng), Some(lat)) = (items[0].as_f64(), items[1].as_f64()) {
            out.push(LatLng::new(lat, lng));
        }
        return;
    }
    for item in items {
        collect_positions(item, out);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GeometryKind {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    GeometryCollection,
    Other(String),
}

impl GeometryKind {
    pub fn as_str(&self) -> &str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::LineString => "LineString",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPolygon => "MultiPolygon",
            GeometryKind::GeometryCollection => "GeometryCollection",
            GeometryKind::Other(name) => name,
        }
    }
}

impl From<String> for GeometryKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Point" => GeometryKind::Point,
            "MultiPoint" => GeometryKind::MultiPoint,
            "LineString" => GeometryKind::LineString,
            "MultiLineString" => GeometryKind::MultiLineString,
            "Polygon" => GeometryKind::Polygon,
            "MultiPolygon" => GeometryKind::MultiPolygon,
            "GeometryCollection" => GeometryKind::GeometryCollection,
            _ => GeometryKind::Other(name),
        }
    }
}

impl From<GeometryKind> for String {
    fn from(kind: GeometryKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    #[serde(
        default,
        deserialize_with = "lenient_style",
        skip_serializing_if = "Option::is_none"
    )]
    pub style: Option<PathStyle>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub popup_content: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub tooltip_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn parse_collection(value: &Value) -> Result<FeatureCollection, GeometryError> {
    let Value::Object(object) = value else {
        return Err(GeometryError::NotAnObject(json_kind(value)));
    };
    let kind = object.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        FEATURE_COLLECTION => serde_json::from_value(value.clone())
            .map_err(|err| GeometryError::Malformed(err.to_string())),
        FEATURE => {
            let feature: Feature = serde_json::from_value(value.clone())
                .map_err(|err| GeometryError::Malformed(err.to_string()))?;
            Ok(FeatureCollection::new(vec![feature]))
        }
        other => Err(GeometryError::NotAFeatureCollection(other.to_string())),
    }
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PointRender {
    CircleMarker { radius: f64 },
    Marker { icon: Value },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_self_intersection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureDecoration {
    pub style: PathStyle,
    pub point: PointRender,
    pub popup: Option<String>,
    pub tooltip: Option<String>,
    pub edit: Option<EditOptions>,
}

pub fn decorate_editable(feature: &Feature, geo_man: &GeoManConfig) -> FeatureDecoration {
    let kind = feature.geometry_kind();
    let mut style = PathStyle::new();
    match kind {
        Some(GeometryKind::Polygon | GeometryKind::MultiPolygon) => {
            style.insert("color".into(), Value::from(geo_man.color.as_str()));
            style.insert("fillColor".into(), Value::from(geo_man.filled_color.as_str()));
            style.insert("weight".into(), Value::from(POLYGON_WEIGHT));
            style.insert("fillOpacity".into(), Value::from(POLYGON_FILL_OPACITY));
        }
        Some(GeometryKind::Point | GeometryKind::MultiPoint) => {
            style.insert("color".into(), Value::from(POINT_COLOR));
            style.insert("fillColor".into(), Value::from(POINT_COLOR));
            style.insert("fillOpacity".into(), Value::from(POINT_FILL_OPACITY));
        }
        _ => {}
    }
    overlay_style(&mut style, feature.properties.style.as_ref());

    let popup = feature.properties.popup_content.clone().or_else(|| match kind {
        Some(GeometryKind::Polygon) => Some(POLYGON_POPUP.to_string()),
        Some(GeometryKind::Point) => Some(POINT_POPUP.to_string()),
        _ => None,
    });

    let edit = geo_man.editable.then(|| match kind {
        Some(GeometryKind::Point) => EditOptions {
            allow_self_intersection: None,
            draggable: Some(true),
        },
        _ => EditOptions {
            allow_self_intersection: Some(false),
            draggable: None,
        },
    });

    FeatureDecoration {
        style,
        point: point_render(feature),
        popup,
        tooltip: feature.properties.tooltip_content.clone(),
        edit,
    }
}

pub fn decorate_background(feature: &Feature) -> FeatureDecoration {
    let mut style = PathStyle::new();
    style.insert("color".into(), Value::from(BACKGROUND_COLOR));
    style.insert("weight".into(), Value::from(BACKGROUND_WEIGHT));
    style.insert("fillOpacity".into(), Value::from(BACKGROUND_FILL_OPACITY));
    overlay_style(&mut style, feature.properties.style.as_ref());
    FeatureDecoration {
        style,
        point: point_render(feature),
        popup: feature.properties.popup_content.clone(),
        tooltip: feature.properties.tooltip_content.clone(),
        edit: None,
    }
}

fn point_render(feature: &Feature) -> PointRender {
    match feature.properties.icon.as_ref() {
        Some(icon) if !icon.is_null() => PointRender::Marker { icon: icon.clone() },
        _ => PointRender::CircleMarker {
            radius: POINT_RADIUS,
        },
    }
}

fn overlay_style(style: &mut PathStyle, overrides: Option<&PathStyle>) {
    let Some(overrides) = overrides else {
        return;
    };
    for (key, value) in overrides {
        style.insert(key.clone(), value.clone());
    }
}

fn feature_kind() -> String {
    FEATURE.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// Styles the widget cannot apply are ignored rather than rejected.
fn lenient_style<'de, D>(deserializer: D) -> Result<Option<PathStyle>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(style)) => Some(style),
        _ => None,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}
