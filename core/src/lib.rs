pub mod config;
pub mod controller;
pub mod coord;
pub mod diagnostics;
pub mod error;
pub mod geolocation;
pub mod geometry;
pub mod lifecycle;
pub mod poller;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod surface;

pub use config::{LiveLocationConfig, MapConfig};
pub use controller::{MapController, MapModel, Phase, Services, WeakController};
pub use coord::{LatLng, LatLngBounds};
pub use diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
pub use error::{ConfigError, GeolocationError, GeometryError, MapError, SurfaceError};
pub use geolocation::{Geolocation, Position};
pub use geometry::{Feature, FeatureCollection, FeatureDecoration};
pub use lifecycle::MapPicker;
pub use scheduler::{Scheduler, TaskHandle};
pub use snapshot::StateSnapshot;
pub use store::{StateStore, StateSync, REFRESH_EVENT};
pub use surface::{MapSurface, ShapeId, SurfaceEvent, SurfaceFactory, SurfaceOptions};
