use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::config::{BaseLayer, ControlPosition, Controls, DrawTools, MapConfig};
use crate::coord::{LatLng, LatLngBounds};
use crate::error::SurfaceError;
use crate::geometry::{Feature, FeatureDecoration};

pub type ShapeId = u64;

#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    Click(LatLng),
    Drag,
    Load,
    ShapeCreated(ShapeId),
    ShapeEdited,
    ShapeRemoved(ShapeId),
    LocationButtonClicked,
}

pub type EventSink = Rc<dyn Fn(SurfaceEvent)>;

#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceOptions {
    pub base_layers: Vec<BaseLayer>,
    pub controls: Controls,
    pub attribution_prefix: bool,
}

impl SurfaceOptions {
    pub fn from_config(config: &MapConfig) -> Self {
        Self {
            base_layers: config.base_layers(),
            controls: config.controls.clone(),
            attribution_prefix: config.prefix,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawToolbar {
    pub position: ControlPosition,
    #[serde(flatten)]
    pub tools: DrawTools,
}

pub trait SurfaceFactory<E> {
    fn create(
        &self,
        element: &E,
        options: &SurfaceOptions,
        events: EventSink,
    ) -> Result<Box<dyn MapSurface>, SurfaceError>;
}

pub trait MapSurface {
    fn set_view(&self, center: LatLng, zoom: Option<f64>);
    fn fly_to(&self, center: LatLng, zoom: Option<f64>);
    fn fit_bounds(&self, bounds: LatLngBounds);
    fn fly_to_bounds(&self, bounds: LatLngBounds);
    fn set_max_bounds(&self, bounds: LatLngBounds);
    fn pan_inside_bounds(&self, bounds: LatLngBounds);
    fn center(&self) -> LatLng;
    fn disable_dragging(&self);
    fn invalidate_size(&self);

    fn add_marker(&self, at: LatLng, color: &str);
    fn move_marker(&self, to: LatLng);
    fn remove_marker(&self);

    fn add_location_button(&self) -> Result<(), SurfaceError>;
    fn set_location_button_enabled(&self, enabled: bool);
    fn add_draw_toolbar(&self, toolbar: &DrawToolbar) -> Result<(), SurfaceError>;
    fn add_hash(&self);

    fn add_editable_feature(
        &self,
        feature: &Feature,
        decoration: &FeatureDecoration,
    ) -> Result<(), SurfaceError>;
    fn adopt_shape(&self, shape: ShapeId) -> Result<(), SurfaceError>;
    fn remove_shape(&self, shape: ShapeId) -> Result<(), SurfaceError>;
    fn clear_editable(&self);
    fn editable_geojson(&self) -> Result<Value, SurfaceError>;
    fn editable_bounds(&self) -> Option<LatLngBounds>;

    fn add_background_feature(
        &self,
        feature: &Feature,
        decoration: &FeatureDecoration,
    ) -> Result<(), SurfaceError>;
    fn clear_background(&self);

    fn destroy(&self);
}
