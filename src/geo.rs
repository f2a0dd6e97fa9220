use serde::Serialize;

/// Equatorial radius in metres.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

// ---------------------------------------------------------------------------
// Vec3 – a Cartesian point
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }
}

// ---------------------------------------------------------------------------
// Coordinate – geodetic position in degrees / metres
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Coordinate {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Project onto the sphere. Altitude is ignored.
    pub fn to_cartesian(&self) -> Vec3 {
        to_cartesian(self.latitude, self.longitude)
    }

    /// Inverse of [`Coordinate::to_cartesian`]. The altitude comes back as 0.
    pub fn from_cartesian(position: Vec3) -> Self {
        let (latitude, longitude) = from_cartesian(position);
        Coordinate::new(latitude, longitude, 0.0)
    }
}

// ---------------------------------------------------------------------------
// Simplified spherical conversion
// ---------------------------------------------------------------------------

/// Geodetic (degrees) to Cartesian on a sphere of radius [`EARTH_RADIUS`].
pub fn to_cartesian(latitude: f64, longitude: f64) -> Vec3 {
    let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
    let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();

    Vec3 {
        x: EARTH_RADIUS * cos_lat * cos_lon,
        y: EARTH_RADIUS * cos_lat * sin_lon,
        z: EARTH_RADIUS * sin_lat,
    }
}

/// Cartesian to `(latitude, longitude)` in degrees.
pub fn from_cartesian(position: Vec3) -> (f64, f64) {
    let latitude = (position.z / EARTH_RADIUS).clamp(-1.0, 1.0).asin();
    let longitude = position.y.atan2(position.x);
    (latitude.to_degrees(), longitude.to_degrees())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn equator_prime_meridian() {
        let p = to_cartesian(0.0, 0.0);
        assert_abs_diff_eq!(p.x, EARTH_RADIUS, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn north_pole() {
        let p = to_cartesian(90.0, 42.0);
        assert_abs_diff_eq!(p.z, EARTH_RADIUS, epsilon = 1e-6);
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-6);
        let (lat, _) = from_cartesian(p);
        assert_abs_diff_eq!(lat, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn round_trip_across_the_globe() {
        for lat in [-89.5, -45.0, -0.001, 0.0, 12.5, 59.91, 89.5] {
            for lon in [-179.5, -90.0, -10.75, 0.0, 10.75, 135.0, 179.5] {
                let (lat2, lon2) = from_cartesian(to_cartesian(lat, lon));
                assert_abs_diff_eq!(lat2, lat, epsilon = 1e-9);
                assert_abs_diff_eq!(lon2, lon, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn altitude_is_dropped() {
        let c = Coordinate::new(59.9, 10.7, 250.0);
        let back = Coordinate::from_cartesian(c.to_cartesian());
        assert_abs_diff_eq!(back.latitude, 59.9, epsilon = 1e-9);
        assert_abs_diff_eq!(back.longitude, 10.7, epsilon = 1e-9);
        assert_eq!(back.altitude, 0.0);
    }

    #[test]
    fn overshoot_does_not_produce_nan() {
        let (lat, _) = from_cartesian(Vec3::new(0.0, 0.0, EARTH_RADIUS * (1.0 + 1e-12)));
        assert!(lat.is_finite());
    }
}
