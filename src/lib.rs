//! Loading and normalization of gamma-radiation survey sessions.
//!
//! A session directory holds a detector configuration (`session.json`) and
//! one JSON document per measurement under `json/`. [`Session::load`] turns it
//! into calibrated, optionally dose-rated records positioned in a local
//! Cartesian frame, plus the bounding statistics a viewer needs.

pub mod data;
pub mod error;
pub mod geo;
pub mod script;
pub mod session;

pub use data::bounds::{Bounds, Extent};
pub use data::detector::{CalibrationModel, Detector, DetectorType};
pub use data::frame::{FrameOptions, ReferenceFrame};
pub use data::spectrum::{SpectrumRecord, UNSCORED};
pub use error::{Error, ErrorKind, Result};
pub use geo::{Coordinate, Vec3};
pub use script::{DoserateScriptEngine, ScoreInput};
pub use session::{LoadReport, LoadStatus, Session, SessionState, SkippedFile};
