use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Json(String),
    InvalidBounds { south_west: (f64, f64), north_east: (f64, f64) },
    InvalidInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(message) => write!(f, "invalid map config: {message}"),
            ConfigError::InvalidBounds {
                south_west,
                north_east,
            } => write!(
                f,
                "bounds south-west {south_west:?} must not exceed north-east {north_east:?}"
            ),
            ConfigError::InvalidInterval => {
                write!(f, "live location interval must be greater than zero")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    NotAnObject(&'static str),
    NotAFeatureCollection(String),
    Malformed(String),
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::NotAnObject(kind) => {
                write!(f, "geojson data is not an object (got {kind})")
            }
            GeometryError::NotAFeatureCollection(kind) => {
                write!(f, "expected a FeatureCollection, got type {kind:?}")
            }
            GeometryError::Malformed(message) => write!(f, "malformed geojson: {message}"),
        }
    }
}

impl std::error::Error for GeometryError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    Unsupported,
    PermissionDenied,
    Unavailable,
    Timeout,
    Other(String),
}

impl GeolocationError {
    pub fn from_code(code: u16, message: &str) -> Self {
        match code {
            1 => GeolocationError::PermissionDenied,
            2 => GeolocationError::Unavailable,
            3 => GeolocationError::Timeout,
            _ => GeolocationError::Other(message.to_string()),
        }
    }
}

impl fmt::Display for GeolocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeolocationError::Unsupported => write!(f, "geolocation is not supported"),
            GeolocationError::PermissionDenied => write!(f, "geolocation permission denied"),
            GeolocationError::Unavailable => write!(f, "position unavailable"),
            GeolocationError::Timeout => write!(f, "geolocation request timed out"),
            GeolocationError::Other(message) => write!(f, "geolocation failed: {message}"),
        }
    }
}

impl std::error::Error for GeolocationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceError(pub String);

impl SurfaceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for SurfaceError {}

#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    MissingElement,
    Surface(SurfaceError),
    Config(ConfigError),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::MissingElement => write!(f, "no element to attach the map to"),
            MapError::Surface(err) => write!(f, "failed to create map surface: {err}"),
            MapError::Config(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::MissingElement => None,
            MapError::Surface(err) => Some(err),
            MapError::Config(err) => Some(err),
        }
    }
}

impl From<SurfaceError> for MapError {
    fn from(err: SurfaceError) -> Self {
        MapError::Surface(err)
    }
}

impl From<ConfigError> for MapError {
    fn from(err: ConfigError) -> Self {
        MapError::Config(err)
    }
}
