use crate::coord::LatLng;
use crate::error::GeolocationError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub coords: LatLng,
    pub accuracy: f64,
}

pub type PositionCallback = Box<dyn FnOnce(Result<Position, GeolocationError>)>;

/// Device location source. Callbacks may fire long after the request, or
/// after the requesting controller is gone.
pub trait Geolocation {
    fn is_supported(&self) -> bool;
    fn current_position(&self, callback: PositionCallback);
    fn check_permission(&self, callback: Box<dyn FnOnce(bool)>);
}

pub struct NoGeolocation;

impl Geolocation for NoGeolocation {
    fn is_supported(&self) -> bool {
        false
    }

    fn current_position(&self, callback: PositionCallback) {
        callback(Err(GeolocationError::Unsupported));
    }

    fn check_permission(&self, callback: Box<dyn FnOnce(bool)>) {
        callback(false);
    }
}
