use serde::Serialize;

use super::bounds::Bounds;
use super::spectrum::SpectrumRecord;
use crate::geo::{Coordinate, Vec3};

/// Placement of the local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameOptions {
    /// Multiplier applied to horizontal offsets from the bounding-box center.
    pub scale: f64,
    /// Vertical coordinate of the `center`/`north` markers.
    pub ground_level: f64,
    /// Latitude offset (degrees) of the `north` marker from the center.
    pub north_offset: f64,
}

impl Default for FrameOptions {
    fn default() -> Self {
        FrameOptions {
            scale: 1.0,
            ground_level: -3.0,
            north_offset: 0.00025,
        }
    }
}

/// `center` and `north` markers, in the local frame and as geodetic points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReferenceFrame {
    pub center: Vec3,
    pub north: Vec3,
    pub center_coordinate: Coordinate,
    pub north_coordinate: Coordinate,
}

/// Move `records` into the local frame centered on the middle of the
/// projected position box in `bounds`.
///
/// ```text
///  x' = (x - mid(x)) *  scale
///  y' = altitude - min(altitude)        (markers: ground_level)
///  z' = (z - mid(z)) * -scale
/// ```
///
/// Record positions and the x/z extents of `bounds` must still be the raw
/// projections. The markers are placed over the middle of the
/// latitude/longitude box, so they sit near the origin but not exactly on it.
pub fn normalize(records: &mut [SpectrumRecord], bounds: &Bounds, options: &FrameOptions) -> ReferenceFrame {
    let center_coordinate = Coordinate::new(
        bounds.latitude.mid(),
        bounds.longitude.mid(),
        bounds.altitude.min,
    );
    let north_coordinate = Coordinate::new(
        center_coordinate.latitude + options.north_offset,
        center_coordinate.longitude,
        bounds.altitude.min,
    );

    let (mid_x, mid_z) = (bounds.x.mid(), bounds.z.mid());
    let place = |p: Vec3, height: f64| Vec3 {
        x: (p.x - mid_x) * options.scale,
        y: height,
        z: (p.z - mid_z) * -options.scale,
    };

    for record in records.iter_mut() {
        let height = record.altitude() - bounds.altitude.min;
        record.set_position(place(record.position(), height));
    }

    ReferenceFrame {
        center: place(center_coordinate.to_cartesian(), options.ground_level),
        north: place(north_coordinate.to_cartesian(), options.ground_level),
        center_coordinate,
        north_coordinate,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use approx::assert_abs_diff_eq;
    use serde_json::json;

    use super::*;

    fn record(latitude: f64, longitude: f64, altitude: f64) -> SpectrumRecord {
        let doc = json!({
            "LatitudeStart": latitude, "LongitudeStart": longitude, "AltitudeStart": altitude,
            "GpsTimeStart": "2017-05-02T10:31:32Z", "Livetime": 1000000, "Channels": [1, 2]
        });
        SpectrumRecord::from_json(Path::new("x.json"), doc.as_object().unwrap()).unwrap()
    }

    fn projected_bounds(records: &[SpectrumRecord]) -> Bounds {
        let mut bounds = Bounds::open();
        records.iter().for_each(|r| bounds.include(r));
        bounds.close()
    }

    #[test]
    fn position_box_is_centered() {
        let mut records = vec![
            record(59.9100, 10.7500, 100.0),
            record(59.9120, 10.7500, 104.0),
            record(59.9100, 10.7540, 98.0),
            record(59.9120, 10.7540, 101.0),
        ];
        let bounds = projected_bounds(&records);
        let frame = normalize(&mut records, &bounds, &FrameOptions::default());

        let mut moved = Bounds::open();
        records.iter().for_each(|r| moved.include(r));
        let moved = moved.close();
        assert_abs_diff_eq!(moved.x.mid(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(moved.z.mid(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(moved.x.span(), bounds.x.span(), epsilon = 1e-6);

        // The geodetic midpoint projects close to, not onto, the box middle.
        assert!(frame.center.x.abs() < 10.0);
        assert!(frame.center.z.abs() < 10.0);
        assert_eq!(frame.center.y, -3.0);
        assert_abs_diff_eq!(frame.center_coordinate.latitude, 59.9110, epsilon = 1e-12);
        assert_abs_diff_eq!(frame.north_coordinate.latitude, 59.91125, epsilon = 1e-12);

        // North is up the latitude axis, which maps to -z.
        assert!(frame.north.z < frame.center.z);

        let heights: Vec<f64> = records.iter().map(|r| r.position().y).collect();
        assert_eq!(heights, vec![2.0, 6.0, 0.0, 3.0]);
    }

    #[test]
    fn scale_multiplies_horizontal_offsets() {
        let mut unit = vec![record(59.91, 10.75, 0.0), record(59.92, 10.76, 0.0)];
        let mut scaled = unit.clone();
        let bounds = projected_bounds(&unit);

        normalize(&mut unit, &bounds, &FrameOptions::default());
        let options = FrameOptions {
            scale: 10.0,
            ..FrameOptions::default()
        };
        normalize(&mut scaled, &bounds, &options);

        for (a, b) in unit.iter().zip(&scaled) {
            assert_abs_diff_eq!(b.position().x, a.position().x * 10.0, epsilon = 1e-6);
            assert_abs_diff_eq!(b.position().z, a.position().z * 10.0, epsilon = 1e-6);
            assert_eq!(a.position().y, b.position().y);
        }
    }
}
