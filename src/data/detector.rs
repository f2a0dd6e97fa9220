use serde::Serialize;

use super::loader::{
    required_f64, required_f64_array, required_i64, required_object, required_str, JsonObject,
};
use crate::error::Result;

/// Polynomial degree range accepted for the energy curve (as coefficient count).
const MIN_COEFFICIENTS: usize = 2;
const MAX_COEFFICIENTS: usize = 5;

// ---------------------------------------------------------------------------
// DetectorType
// ---------------------------------------------------------------------------

/// Static properties of a detector model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorType {
    pub name: String,
    pub max_num_channels: i64,
    pub min_hv: i64,
    pub max_hv: i64,
    /// Reference dose-rate script shipped with this detector model.
    pub ge_script: String,
}

impl DetectorType {
    pub fn from_json(obj: &JsonObject) -> Result<Self> {
        const SCOPE: &str = "DetectorType";
        Ok(DetectorType {
            name: required_str(obj, SCOPE, "Name")?,
            max_num_channels: required_i64(obj, SCOPE, "MaxNumChannels")?,
            min_hv: required_i64(obj, SCOPE, "MinHV")?,
            max_hv: required_i64(obj, SCOPE, "MaxHV")?,
            ge_script: required_str(obj, SCOPE, "GEScript")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Settings of the physical detector used for a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detector {
    pub type_name: String,
    pub hv: i64,
    pub num_channels: i64,
    pub serialnumber: String,
    pub coarse_gain: f64,
    pub fine_gain: f64,
    pub livetime: i64,
    /// Lower level discriminator (channel).
    pub lld: i64,
    /// Upper level discriminator (channel).
    pub uld: i64,
    /// `coefficients[k]` multiplies `channel^k`.
    pub coefficients: Vec<f64>,
}

impl Detector {
    pub fn from_json(obj: &JsonObject) -> Result<Self> {
        const SCOPE: &str = "Detector";
        Ok(Detector {
            type_name: required_str(obj, SCOPE, "TypeName")?,
            hv: required_i64(obj, SCOPE, "CurrentHV")?,
            num_channels: required_i64(obj, SCOPE, "CurrentNumChannels")?,
            serialnumber: required_str(obj, SCOPE, "Serialnumber")?,
            coarse_gain: required_f64(obj, SCOPE, "CurrentCoarseGain")?,
            fine_gain: required_f64(obj, SCOPE, "CurrentFineGain")?,
            livetime: required_i64(obj, SCOPE, "CurrentLivetime")?,
            lld: required_i64(obj, SCOPE, "CurrentLLD")?,
            uld: required_i64(obj, SCOPE, "CurrentULD")?,
            coefficients: required_f64_array(obj, SCOPE, "EnergyCurveCoefficients")?,
        })
    }

    /// Energy of channel `index`, or 0.0 when the curve is unusable or the
    /// index is negative.
    pub fn energy_at(&self, index: i64) -> f64 {
        let n = self.coefficients.len();
        if !(MIN_COEFFICIENTS..=MAX_COEFFICIENTS).contains(&n) || index < 0 {
            return 0.0;
        }

        let x = index as f64;
        self.coefficients
            .iter()
            .enumerate()
            .map(|(k, c)| c * x.powi(k as i32))
            .sum()
    }

    /// Channel window `[lld, uld]` clamped to `0..channel_count`. Falls back
    /// to the whole spectrum when the discriminators leave nothing.
    pub fn discriminator_window(&self, channel_count: usize) -> std::ops::Range<usize> {
        let clamp = |c: i64| c.clamp(0, channel_count as i64) as usize;
        let start = clamp(self.lld);
        let end = clamp(self.uld.saturating_add(1));
        if start < end {
            start..end
        } else {
            0..channel_count
        }
    }
}

// ---------------------------------------------------------------------------
// CalibrationModel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationModel {
    pub detector_type: DetectorType,
    pub detector: Detector,
}

impl CalibrationModel {
    /// Read the `DetectorType` and `Detector` objects of a session document.
    pub fn from_json(root: &JsonObject) -> Result<Self> {
        const SCOPE: &str = "Session";
        let detector_type = DetectorType::from_json(required_object(root, SCOPE, "DetectorType")?)?;
        let detector = Detector::from_json(required_object(root, SCOPE, "Detector")?)?;
        Ok(CalibrationModel {
            detector_type,
            detector,
        })
    }

    pub fn energy_at(&self, index: i64) -> f64 {
        self.detector.energy_at(index)
    }

    /// Energies for channels `0..count`.
    pub fn energies(&self, count: usize) -> Vec<f64> {
        (0..count).map(|i| self.energy_at(i as i64)).collect()
    }
}
