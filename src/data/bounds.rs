use serde::Serialize;

use super::spectrum::SpectrumRecord;

// ---------------------------------------------------------------------------
// Extent – running min/max of one quantity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    pub min: f64,
    pub max: f64,
}

impl Default for Extent {
    fn default() -> Self {
        Extent::ZERO
    }
}

impl Extent {
    pub const ZERO: Extent = Extent { min: 0.0, max: 0.0 };

    /// Seed for accumulation; any finite value replaces both ends.
    pub const OPEN: Extent = Extent {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    pub fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Nothing was included since the [`Extent::OPEN`] seed.
    pub fn is_open(&self) -> bool {
        self.min > self.max
    }

    /// An extent that never saw a value collapses to zero.
    pub fn close(self) -> Extent {
        if self.is_open() {
            Extent::ZERO
        } else {
            self
        }
    }

    pub fn mid(&self) -> f64 {
        self.min + (self.max - self.min) / 2.0
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Extent {
        let mut extent = Extent::OPEN;
        values.into_iter().for_each(|v| extent.include(v));
        extent.close()
    }
}

// ---------------------------------------------------------------------------
// Bounds – session-wide statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bounds {
    pub doserate: Extent,
    pub x: Extent,
    pub y: Extent,
    pub z: Extent,
    pub altitude: Extent,
    pub latitude: Extent,
    pub longitude: Extent,
}

impl Bounds {
    pub(crate) fn open() -> Self {
        Bounds {
            doserate: Extent::OPEN,
            x: Extent::OPEN,
            y: Extent::OPEN,
            z: Extent::OPEN,
            altitude: Extent::OPEN,
            latitude: Extent::OPEN,
            longitude: Extent::OPEN,
        }
    }

    pub(crate) fn include(&mut self, record: &SpectrumRecord) {
        let p = record.position();
        self.doserate.include(record.doserate());
        self.x.include(p.x);
        self.y.include(p.y);
        self.z.include(p.z);
        self.altitude.include(record.altitude());
        self.latitude.include(record.latitude());
        self.longitude.include(record.longitude());
    }

    pub(crate) fn close(self) -> Self {
        Bounds {
            doserate: self.doserate.close(),
            x: self.x.close(),
            y: self.y.close(),
            z: self.z.close(),
            altitude: self.altitude.close(),
            latitude: self.latitude.close(),
            longitude: self.longitude.close(),
        }
    }

    /// Recompute the position extents from the records as they are now.
    pub(crate) fn refit_positions(&mut self, records: &[SpectrumRecord]) {
        self.x = Extent::from_values(records.iter().map(|r| r.position().x));
        self.y = Extent::from_values(records.iter().map(|r| r.position().y));
        self.z = Extent::from_values(records.iter().map(|r| r.position().z));
    }

    pub(crate) fn refit_doserate(&mut self, records: &[SpectrumRecord]) {
        self.doserate = Extent::from_values(records.iter().map(|r| r.doserate()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_values_are_not_clamped_to_zero() {
        let e = Extent::from_values([-5.0, -2.0, -9.5]);
        assert_eq!(e, Extent { min: -9.5, max: -2.0 });

        let e = Extent::from_values([3.0, 7.0]);
        assert_eq!(e, Extent { min: 3.0, max: 7.0 });
    }

    #[test]
    fn empty_collapses_to_zero() {
        assert!(Extent::OPEN.is_open());
        assert_eq!(Extent::from_values([]), Extent::ZERO);
    }

    #[test]
    fn mid_and_contains() {
        let e = Extent { min: -4.0, max: 10.0 };
        assert_eq!(e.mid(), 3.0);
        assert_eq!(e.span(), 14.0);
        assert!(e.contains(-4.0));
        assert!(e.contains(10.0));
        assert!(!e.contains(10.5));
    }
}
