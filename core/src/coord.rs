use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    #[serde(rename = "sw")]
    pub south_west: LatLng,
    #[serde(rename = "ne")]
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(a: LatLng, b: LatLng) -> Self {
        Self {
            south_west: LatLng::new(a.lat.min(b.lat), a.lng.min(b.lng)),
            north_east: LatLng::new(a.lat.max(b.lat), a.lng.max(b.lng)),
        }
    }

    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut iter = points.into_iter().filter(LatLng::is_finite);
        let first = iter.next()?;
        let mut bounds = Self::new(first, first);
        for point in iter {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn is_ordered(&self) -> bool {
        self.south_west.lat <= self.north_east.lat && self.south_west.lng <= self.north_east.lng
    }

    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    pub fn clamp(&self, point: LatLng) -> LatLng {
        let ordered = Self::new(self.south_west, self.north_east);
        LatLng::new(
            point.lat.clamp(ordered.south_west.lat, ordered.north_east.lat),
            point.lng.clamp(ordered.south_west.lng, ordered.north_east.lng),
        )
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn extend(&mut self, point: LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    pub fn union(&self, other: &LatLngBounds) -> LatLngBounds {
        let mut merged = *self;
        merged.extend(other.south_west);
        merged.extend(other.north_east);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addis_box() -> LatLngBounds {
        LatLngBounds::new(LatLng::new(8.7, 38.6), LatLng::new(9.2, 39.1))
    }

    #[test]
    fn clamp_pulls_outside_points_to_the_edge() {
        let bounds = addis_box();
        assert_eq!(bounds.clamp(LatLng::new(10.0, 38.8)), LatLng::new(9.2, 38.8));
        assert_eq!(bounds.clamp(LatLng::new(0.0, 50.0)), LatLng::new(8.7, 39.1));
        let inside = LatLng::new(9.0, 38.9);
        assert_eq!(bounds.clamp(inside), inside);
    }

    #[test]
    fn new_orders_corners() {
        let bounds = LatLngBounds::new(LatLng::new(9.2, 39.1), LatLng::new(8.7, 38.6));
        assert!(bounds.is_ordered());
        assert_eq!(bounds.south_west, LatLng::new(8.7, 38.6));
    }

    #[test]
    fn from_points_skips_non_finite() {
        let bounds = LatLngBounds::from_points([
            LatLng::new(1.0, 2.0),
            LatLng::new(f64::NAN, 0.0),
            LatLng::new(-1.0, 5.0),
        ])
        .unwrap();
        assert_eq!(bounds.south_west, LatLng::new(-1.0, 2.0));
        assert_eq!(bounds.north_east, LatLng::new(1.0, 5.0));
        assert!(LatLngBounds::from_points(Vec::new()).is_none());
    }
}
