use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::detector::{CalibrationModel, Detector};
use super::loader::{
    optional_f64, optional_i64, optional_str, parse_separated_floats, required_f64, required_str,
    JsonObject,
};
use crate::error::{Error, Result};
use crate::geo::{Coordinate, Vec3};
use crate::script::{DoserateScriptEngine, ScoreInput};

/// Dose rate reported for records no script has scored.
pub const UNSCORED: f64 = 0.0;

const SCOPE: &str = "Spectrum";

// ---------------------------------------------------------------------------
// SpectrumRecord – one measurement
// ---------------------------------------------------------------------------

/// One measurement file: GPS fix, timing and the channel histogram, plus the
/// values derived from them.
///
/// Expected JSON:
///
/// ```json
/// {
///   "SessionName": "2017-05-02_10-31-08",
///   "SessionIndex": 12,
///   "LatitudeStart": 59.9107, "LongitudeStart": 10.7562, "AltitudeStart": 96.4,
///   "GpsTimeStart": "2017-05-02T10:31:32Z",
///   "Livetime": 2000000, "Realtime": 2011342,
///   "Channels": [0, 0, 3, 18, ...]
/// }
/// ```
///
/// `Channels` may also be a single string of separated counts.
#[derive(Debug, Clone, Serialize)]
pub struct SpectrumRecord {
    path: PathBuf,
    session_name: Option<String>,
    session_index: Option<i64>,
    coordinate: Coordinate,
    gps_time: DateTime<Utc>,
    /// Microseconds.
    livetime: f64,
    /// Microseconds.
    realtime: Option<f64>,
    channels: Vec<f64>,
    energies: Vec<f64>,
    position: Vec3,
    doserate: Option<f64>,
}

impl SpectrumRecord {
    /// Read, parse and calibrate one measurement file.
    pub fn parse(path: &Path, calibration: &CalibrationModel) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedRecord {
            path: path.to_path_buf(),
            reason,
        };

        let text = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
        let root: JsonValue = serde_json::from_str(&text).map_err(|e| malformed(e.to_string()))?;
        let obj = root
            .as_object()
            .ok_or_else(|| malformed("expected a JSON object".into()))?;

        let mut record = Self::from_json(path, obj).map_err(|e| malformed(e.to_string()))?;
        record.calibrate(calibration);
        Ok(record)
    }

    /// Raw fields only. Energies are empty until [`SpectrumRecord::calibrate`].
    pub fn from_json(path: &Path, obj: &JsonObject) -> Result<Self> {
        let coordinate = Coordinate::new(
            required_f64(obj, SCOPE, "LatitudeStart")?,
            required_f64(obj, SCOPE, "LongitudeStart")?,
            required_f64(obj, SCOPE, "AltitudeStart")?,
        );
        let gps_time = parse_timestamp(&required_str(obj, SCOPE, "GpsTimeStart")?)?;
        let livetime = required_f64(obj, SCOPE, "Livetime")?;
        let channels = channel_counts(obj)?;

        Ok(SpectrumRecord {
            path: path.to_path_buf(),
            session_name: optional_str(obj, "SessionName"),
            session_index: optional_i64(obj, "SessionIndex"),
            coordinate,
            gps_time,
            livetime,
            realtime: optional_f64(obj, "Realtime"),
            channels,
            energies: Vec::new(),
            position: coordinate.to_cartesian(),
            doserate: None,
        })
    }

    pub fn calibrate(&mut self, calibration: &CalibrationModel) {
        self.energies = calibration.energies(self.channels.len());
    }

    /// Score with `engine`. Leaves the record unscored when the engine has
    /// no script or the script fails.
    pub fn score(&mut self, engine: &DoserateScriptEngine, detector: &Detector) {
        let input = ScoreInput {
            energies: &self.energies,
            counts: &self.channels,
            livetime: self.livetime,
            realtime: self.realtime,
            coordinate: self.coordinate,
            detector,
        };
        self.doserate = engine.score(&input);
    }

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_name(&self) -> Option<&str> {
        self.session_name.as_deref()
    }

    pub fn session_index(&self) -> Option<i64> {
        self.session_index
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn latitude(&self) -> f64 {
        self.coordinate.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.coordinate.longitude
    }

    pub fn altitude(&self) -> f64 {
        self.coordinate.altitude
    }

    pub fn gps_time(&self) -> DateTime<Utc> {
        self.gps_time
    }

    pub fn livetime(&self) -> f64 {
        self.livetime
    }

    pub fn realtime(&self) -> Option<f64> {
        self.realtime
    }

    pub fn channels(&self) -> &[f64] {
        &self.channels
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn total_counts(&self) -> f64 {
        self.channels.iter().sum()
    }

    /// Local frame position once the session is loaded, the raw projection
    /// before that.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Dose rate, or [`UNSCORED`].
    pub fn doserate(&self) -> f64 {
        self.doserate.unwrap_or(UNSCORED)
    }

    pub fn is_scored(&self) -> bool {
        self.doserate.is_some()
    }
}

fn channel_counts(obj: &JsonObject) -> Result<Vec<f64>> {
    match obj.get("Channels") {
        Some(JsonValue::String(s)) => parse_separated_floats(s).map_err(|reason| Error::InvalidField {
            field: format!("{SCOPE}:Channels{reason}"),
            expected: "a list of numbers",
        }),
        Some(_) => super::loader::required_f64_array(obj, SCOPE, "Channels"),
        None => Err(Error::MissingField(format!("{SCOPE}:Channels"))),
    }
}

/// RFC 3339, or a bare `YYYY-MM-DDTHH:MM:SS[.f]` taken as UTC.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| t.and_utc())
        .map_err(|_| Error::InvalidField {
            field: format!("{SCOPE}:GpsTimeStart"),
            expected: "an RFC 3339 timestamp",
        })
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    use super::*;
    use crate::data::detector::DetectorType;

    fn calibration() -> CalibrationModel {
        CalibrationModel {
            detector_type: DetectorType {
                name: "NaI2x2".into(),
                max_num_channels: 1024,
                min_hv: 0,
                max_hv: 1200,
                ge_script: "nai2x2.lua".into(),
            },
            detector: Detector {
                type_name: "NaI2x2".into(),
                hv: 775,
                num_channels: 4,
                serialnumber: "31003".into(),
                coarse_gain: 1.0,
                fine_gain: 1.0,
                livetime: 1_000_000,
                lld: 0,
                uld: 3,
                coefficients: vec![10.0, 3.0],
            },
        }
    }

    fn measurement() -> JsonValue {
        json!({
            "SessionName": "s1",
            "SessionIndex": 4,
            "LatitudeStart": 59.91, "LongitudeStart": 10.75, "AltitudeStart": 101.5,
            "GpsTimeStart": "2017-05-02T10:31:32Z",
            "Livetime": 1000000, "Realtime": 1004000,
            "Channels": [1, 0, 4, 2]
        })
    }

    fn parse(doc: &JsonValue) -> Result<SpectrumRecord> {
        let mut rec = SpectrumRecord::from_json(Path::new("json/0001.json"), doc.as_object().unwrap())?;
        rec.calibrate(&calibration());
        Ok(rec)
    }

    #[test]
    fn parses_and_calibrates() {
        let rec = parse(&measurement()).unwrap();
        assert_eq!(rec.session_index(), Some(4));
        assert_eq!(rec.altitude(), 101.5);
        assert_eq!(rec.gps_time().hour(), 10);
        assert_eq!(rec.channels(), &[1.0, 0.0, 4.0, 2.0]);
        assert_eq!(rec.energies(), &[10.0, 13.0, 16.0, 19.0]);
        assert_eq!(rec.total_counts(), 7.0);
        assert_eq!(rec.position(), rec.coordinate().to_cartesian());
        assert!(!rec.is_scored());
        assert_eq!(rec.doserate(), UNSCORED);
    }

    #[test]
    fn channels_as_string() {
        let mut doc = measurement();
        doc["Channels"] = json!("1 0 4 2");
        assert_eq!(parse(&doc).unwrap().channels(), &[1.0, 0.0, 4.0, 2.0]);

        doc["Channels"] = json!("1 zero 4");
        assert!(matches!(parse(&doc), Err(Error::InvalidField { .. })));
    }

    #[test]
    fn naive_timestamp_is_utc() {
        let mut doc = measurement();
        doc["GpsTimeStart"] = json!("2017-05-02T10:31:32.250");
        let t = parse(&doc).unwrap().gps_time();
        assert_eq!((t.year(), t.minute(), t.second()), (2017, 31, 32));

        doc["GpsTimeStart"] = json!("yesterday");
        assert!(parse(&doc).is_err());
    }

    #[test]
    fn missing_position() {
        let mut doc = measurement();
        doc.as_object_mut().unwrap().remove("LatitudeStart");
        match parse(&doc) {
            Err(Error::MissingField(f)) => assert_eq!(f, "Spectrum:LatitudeStart"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let mut doc = measurement();
        let obj = doc.as_object_mut().unwrap();
        obj.remove("SessionName");
        obj.remove("SessionIndex");
        obj.remove("Realtime");
        let rec = parse(&doc).unwrap();
        assert_eq!(rec.session_name(), None);
        assert_eq!(rec.realtime(), None);
    }

    #[test]
    fn unreadable_file_is_malformed_record() {
        let err = SpectrumRecord::parse(Path::new("/definitely/not/here.json"), &calibration()).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }
}
