use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coord::{LatLng, LatLngBounds};
use crate::error::ConfigError;

pub const DEFAULT_LOCATION: LatLng = LatLng::new(9.03454469692794, 38.75096797943116);
pub const DEFAULT_BOUNDS: LatLngBounds = LatLngBounds {
    south_west: LatLng::new(8.5, 38.3),
    north_east: LatLng::new(9.5, 39.3),
};
pub const DEFAULT_MARKER_COLOR: &str = "#3b82f6";
pub const DEFAULT_GEOMAN_COLOR: &str = "#3388ff";
pub const DEFAULT_GEOMAN_FILLED_COLOR: &str = "#cad9ec";
pub const DEFAULT_LIVE_INTERVAL_MS: u32 = 5_000;
pub const FALLBACK_LAYER_LABEL: &str = "OpenStreetMap";
pub const FALLBACK_LAYER_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

const ZOOM_DEFAULT: f64 = 15.0;
const MIN_ZOOM_DEFAULT: f64 = 10.0;
const MAX_ZOOM_DEFAULT: f64 = 28.0;
const TILE_MIN_ZOOM: f64 = 1.0;
const TILE_MAX_ZOOM: f64 = 28.0;
const TILE_SIZE: u32 = 256;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    #[serde(default)]
    pub state_path: String,
    #[serde(default = "default_true")]
    pub prefix: bool,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
    #[serde(default = "default_bounds")]
    pub bounds: Option<LatLngBounds>,
    #[serde(default, skip_serializing)]
    boundaries: Option<bool>,
    #[serde(default = "default_true")]
    pub show_marker: bool,
    #[serde(default = "default_true")]
    pub draggable: bool,
    #[serde(default = "default_true")]
    pub clickable: bool,
    #[serde(default = "default_marker_color")]
    pub marker_color: String,
    #[serde(default)]
    pub live_location: LiveLocationConfig,
    #[serde(default = "default_true")]
    pub show_my_location_button: bool,
    #[serde(rename = "default", default = "default_location")]
    pub default_location: LatLng,
    #[serde(default)]
    pub controls: Controls,
    #[serde(default)]
    pub geo_man: GeoManConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detect_retina: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            state_path: String::new(),
            prefix: true,
            layers: Vec::new(),
            bounds: default_bounds(),
            boundaries: None,
            show_marker: true,
            draggable: true,
            clickable: true,
            marker_color: default_marker_color(),
            live_location: LiveLocationConfig::default(),
            show_my_location_button: true,
            default_location: DEFAULT_LOCATION,
            controls: Controls::default(),
            geo_man: GeoManConfig::default(),
            detect_retina: None,
            extra: Map::new(),
        }
    }
}

impl MapConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| ConfigError::Json(err.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let mut config: MapConfig =
            serde_json::from_value(value).map_err(|err| ConfigError::Json(err.to_string()))?;
        if config.boundaries == Some(false) {
            config.bounds = None;
        }
        config.boundaries = None;
        config.validate()?;
        Ok(config)
    }

    pub fn merged(&self, overrides: &Value) -> Result<Self, ConfigError> {
        let mut base =
            serde_json::to_value(self).map_err(|err| ConfigError::Json(err.to_string()))?;
        deep_merge(&mut base, overrides);
        Self::from_value(base)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bounds) = self.bounds {
            let finite = bounds.south_west.is_finite() && bounds.north_east.is_finite();
            if !finite || !bounds.is_ordered() {
                return Err(ConfigError::InvalidBounds {
                    south_west: (bounds.south_west.lat, bounds.south_west.lng),
                    north_east: (bounds.north_east.lat, bounds.north_east.lng),
                });
            }
        }
        if self.live_location.polls() && self.live_location.interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }

    pub fn unknown_keys(&self) -> Vec<&str> {
        self.extra.keys().map(String::as_str).collect()
    }

    pub fn base_layers(&self) -> Vec<BaseLayer> {
        if self.layers.is_empty() {
            return vec![BaseLayer {
                label: FALLBACK_LAYER_LABEL.to_string(),
                url: FALLBACK_LAYER_URL.to_string(),
                options: default_tile_options(self.detect_retina),
            }];
        }
        self.layers
            .iter()
            .map(|layer| BaseLayer {
                label: layer.label.clone(),
                url: layer.url.clone(),
                options: layer.tile_options(self.detect_retina),
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub label: String,
    pub url: String,
    #[serde(default)]
    pub control: Map<String, Value>,
}

impl LayerConfig {
    pub fn tile_options(&self, detect_retina: Option<bool>) -> Map<String, Value> {
        let mut options = default_tile_options(detect_retina);
        for (key, value) in &self.control {
            options.insert(key.clone(), value.clone());
        }
        options
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BaseLayer {
    pub label: String,
    pub url: String,
    pub options: Map<String, Value>,
}

fn default_tile_options(detect_retina: Option<bool>) -> Map<String, Value> {
    let mut options = Map::new();
    options.insert("minZoom".into(), Value::from(TILE_MIN_ZOOM));
    options.insert("maxZoom".into(), Value::from(TILE_MAX_ZOOM));
    options.insert("tileSize".into(), Value::from(TILE_SIZE));
    options.insert("detectRetina".into(), Value::from(detect_retina.unwrap_or(true)));
    options
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
    #[serde(default = "default_true")]
    pub zoom_control: bool,
    #[serde(default = "default_true")]
    pub fullscreen_control: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            zoom: ZOOM_DEFAULT,
            min_zoom: MIN_ZOOM_DEFAULT,
            max_zoom: MAX_ZOOM_DEFAULT,
            zoom_control: true,
            fullscreen_control: true,
            extra: Map::new(),
        }
    }
}

impl Controls {
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        let low = self.min_zoom.min(self.max_zoom);
        let high = self.min_zoom.max(self.max_zoom);
        if zoom.is_nan() {
            return self.zoom.clamp(low, high);
        }
        zoom.clamp(low, high)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "LiveLocationRepr")]
pub struct LiveLocationConfig {
    pub send: bool,
    pub realtime: bool,
    pub interval_ms: u32,
}

impl Default for LiveLocationConfig {
    fn default() -> Self {
        Self {
            send: false,
            realtime: false,
            interval_ms: DEFAULT_LIVE_INTERVAL_MS,
        }
    }
}

impl LiveLocationConfig {
    pub fn polls(&self) -> bool {
        self.send && self.realtime
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LiveLocationRepr {
    Flag(bool),
    Missing(()),
    Options(LiveLocationOptions),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveLocationOptions {
    #[serde(default)]
    send: bool,
    #[serde(default)]
    realtime: bool,
    #[serde(default, alias = "miliseconds")]
    interval_ms: Option<u32>,
}

impl From<LiveLocationRepr> for LiveLocationConfig {
    fn from(repr: LiveLocationRepr) -> Self {
        match repr {
            LiveLocationRepr::Flag(send) => Self {
                send,
                ..Self::default()
            },
            LiveLocationRepr::Missing(()) => Self::default(),
            LiveLocationRepr::Options(options) => Self {
                send: options.send,
                realtime: options.realtime,
                interval_ms: options.interval_ms.unwrap_or(DEFAULT_LIVE_INTERVAL_MS),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Default for ControlPosition {
    fn default() -> Self {
        ControlPosition::TopLeft
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoManConfig {
    #[serde(default)]
    pub show: bool,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default)]
    pub position: ControlPosition,
    #[serde(default = "default_geoman_color")]
    pub color: String,
    #[serde(default = "default_geoman_filled_color")]
    pub filled_color: String,
    #[serde(flatten)]
    pub tools: DrawTools,
}

impl Default for GeoManConfig {
    fn default() -> Self {
        Self {
            show: false,
            editable: true,
            position: ControlPosition::TopLeft,
            color: default_geoman_color(),
            filled_color: default_geoman_filled_color(),
            tools: DrawTools::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawTools {
    #[serde(default = "default_true")]
    pub draw_circle_marker: bool,
    #[serde(default = "default_true")]
    pub rotate_mode: bool,
    #[serde(default = "default_true")]
    pub draw_marker: bool,
    #[serde(default = "default_true")]
    pub draw_polygon: bool,
    #[serde(default = "default_true")]
    pub draw_polyline: bool,
    #[serde(default = "default_true")]
    pub draw_circle: bool,
    #[serde(default = "default_true")]
    pub draw_text: bool,
    #[serde(default = "default_true")]
    pub draw_rectangle: bool,
    #[serde(default = "default_true")]
    pub edit_mode: bool,
    #[serde(default = "default_true")]
    pub drag_mode: bool,
    #[serde(default = "default_true")]
    pub cut_polygon: bool,
    #[serde(default = "default_true")]
    pub edit_polygon: bool,
    #[serde(default = "default_true")]
    pub delete_layer: bool,
}

impl Default for DrawTools {
    fn default() -> Self {
        Self {
            draw_circle_marker: true,
            rotate_mode: true,
            draw_marker: true,
            draw_polygon: true,
            draw_polyline: true,
            draw_circle: true,
            draw_text: true,
            draw_rectangle: true,
            edit_mode: true,
            drag_mode: true,
            cut_polygon: true,
            edit_polygon: true,
            delete_layer: true,
        }
    }
}

pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn default_true() -> bool {
    true
}

fn default_bounds() -> Option<LatLngBounds> {
    Some(DEFAULT_BOUNDS)
}

fn default_location() -> LatLng {
    DEFAULT_LOCATION
}

fn default_marker_color() -> String {
    DEFAULT_MARKER_COLOR.to_string()
}

fn default_geoman_color() -> String {
    DEFAULT_GEOMAN_COLOR.to_string()
}

fn default_geoman_filled_color() -> String {
    DEFAULT_GEOMAN_FILLED_COLOR.to_string()
}

fn default_zoom() -> f64 {
    ZOOM_DEFAULT
}

fn default_min_zoom() -> f64 {
    MIN_ZOOM_DEFAULT
}

fn default_max_zoom() -> f64 {
    MAX_ZOOM_DEFAULT
}
