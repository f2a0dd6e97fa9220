use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::data::bounds::Bounds;
use crate::data::detector::CalibrationModel;
use crate::data::frame::{normalize, FrameOptions, ReferenceFrame};
use crate::data::loader::{load_session_file, SessionLayout};
use crate::data::spectrum::SpectrumRecord;
use crate::error::{Error, Result};
use crate::geo::{Coordinate, Vec3};
use crate::script::DoserateScriptEngine;

// ---------------------------------------------------------------------------
// Load results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadStatus {
    Success,
    /// Some measurement files were skipped.
    PartialSuccess,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub status: LoadStatus,
    pub loaded: usize,
    pub skipped: Vec<SkippedFile>,
}

impl LoadReport {
    pub fn had_invalid_records(&self) -> bool {
        !self.skipped.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One survey dataset loaded from a session directory.
///
/// The dose-rate script belongs to the session rather than to a load: it
/// survives [`Session::clear`] and applies to every later [`Session::load`].
#[derive(Debug, Default)]
pub struct Session {
    name: String,
    comment: String,
    livetime: i64,
    iterations: i64,
    calibration: Option<CalibrationModel>,
    records: Vec<SpectrumRecord>,
    bounds: Bounds,
    frame: ReferenceFrame,
    options: FrameOptions,
    script: DoserateScriptEngine,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FrameOptions) -> Self {
        Session {
            options,
            ..Self::default()
        }
    }

    /// Load the session at `path`, replacing whatever was loaded before.
    ///
    /// Directory and `session.json` problems are returned as errors and leave
    /// the session empty. Unusable measurement files are skipped and listed in
    /// the report.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let root = path.as_ref();
        self.clear();

        let layout = SessionLayout::validate(root)?;
        let session_file = load_session_file(&layout.session_file)?;
        let files = layout.spectrum_files()?;
        log::debug!("{}: {} measurement files", root.display(), files.len());

        let calibration = session_file.calibration;
        let parsed: Vec<(PathBuf, Result<SpectrumRecord>)> = files
            .into_par_iter()
            .map(|file| {
                let record = SpectrumRecord::parse(&file, &calibration);
                (file, record)
            })
            .collect();

        let mut records = Vec::with_capacity(parsed.len());
        let mut skipped = Vec::new();
        let mut bounds = Bounds::open();

        for (file, result) in parsed {
            match result {
                Ok(mut record) => {
                    if self.script.is_ready() {
                        record.score(&self.script, &calibration.detector);
                    }
                    bounds.include(&record);
                    records.push(record);
                }
                Err(e) => {
                    log::warn!("Skipping {}: {e}", file.display());
                    skipped.push(SkippedFile {
                        path: file,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut bounds = bounds.close();
        let frame = if records.is_empty() {
            ReferenceFrame::default()
        } else {
            let frame = normalize(&mut records, &bounds, &self.options);
            bounds.refit_positions(&records);
            frame
        };

        let status = if skipped.is_empty() {
            LoadStatus::Success
        } else {
            LoadStatus::PartialSuccess
        };
        log::info!(
            "Loaded session '{}' from {}: {} spectra, {} skipped",
            session_file.name,
            root.display(),
            records.len(),
            skipped.len()
        );

        self.name = session_file.name;
        self.comment = session_file.comment;
        self.livetime = session_file.livetime;
        self.iterations = session_file.iterations;
        self.calibration = Some(calibration);
        self.records = records;
        self.bounds = bounds;
        self.frame = frame;

        Ok(LoadReport {
            status,
            loaded: self.records.len(),
            skipped,
        })
    }

    /// Load a dose-rate script for subsequent loads. Records already loaded
    /// keep their dose rates until [`Session::rescore`] is called.
    pub fn load_doserate_script(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.script.load_script(path.as_ref())
    }

    /// Score the loaded records again with the current script and refit the
    /// dose-rate extent. Returns how many records ended up scored.
    pub fn rescore(&mut self) -> usize {
        let Some(calibration) = &self.calibration else {
            return 0;
        };
        for record in &mut self.records {
            record.score(&self.script, &calibration.detector);
        }
        self.bounds.refit_doserate(&self.records);
        self.records.iter().filter(|r| r.is_scored()).count()
    }

    /// Drop all records and statistics. The script stays loaded.
    pub fn clear(&mut self) {
        self.name.clear();
        self.comment.clear();
        self.livetime = 0;
        self.iterations = 0;
        self.calibration = None;
        self.records.clear();
        self.bounds = Bounds::default();
        self.frame = ReferenceFrame::default();
    }

    pub fn state(&self) -> SessionState {
        if self.calibration.is_some() {
            SessionState::Loaded
        } else {
            SessionState::Empty
        }
    }

    pub fn records(&self) -> &[SpectrumRecord] {
        &self.records
    }

    pub fn spectrum_count(&self) -> usize {
        self.records.len()
    }

    pub fn spectrum(&self, index: usize) -> Result<&SpectrumRecord> {
        self.records.get(index).ok_or(Error::IndexOutOfBounds {
            index,
            count: self.records.len(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn livetime(&self) -> i64 {
        self.livetime
    }

    pub fn iterations(&self) -> i64 {
        self.iterations
    }

    pub fn calibration(&self) -> Option<&CalibrationModel> {
        self.calibration.as_ref()
    }

    pub fn options(&self) -> &FrameOptions {
        &self.options
    }

    pub fn script_ready(&self) -> bool {
        self.script.is_ready()
    }

    pub fn script_name(&self) -> Option<&str> {
        self.script.script_name()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn frame(&self) -> &ReferenceFrame {
        &self.frame
    }

    pub fn center(&self) -> Vec3 {
        self.frame.center
    }

    pub fn north(&self) -> Vec3 {
        self.frame.north
    }

    pub fn center_coordinate(&self) -> Coordinate {
        self.frame.center_coordinate
    }

    pub fn north_coordinate(&self) -> Coordinate {
        self.frame.north_coordinate
    }

    pub fn min_doserate(&self) -> f64 {
        self.bounds.doserate.min
    }

    pub fn max_doserate(&self) -> f64 {
        self.bounds.doserate.max
    }

    pub fn min_altitude(&self) -> f64 {
        self.bounds.altitude.min
    }

    pub fn max_altitude(&self) -> f64 {
        self.bounds.altitude.max
    }

    pub fn min_latitude(&self) -> f64 {
        self.bounds.latitude.min
    }

    pub fn max_latitude(&self) -> f64 {
        self.bounds.latitude.max
    }

    pub fn min_longitude(&self) -> f64 {
        self.bounds.longitude.min
    }

    pub fn max_longitude(&self) -> f64 {
        self.bounds.longitude.max
    }
}
