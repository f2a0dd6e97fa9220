/// Data layer: detector calibration, measurement records, aggregation and
/// the local frame.
///
/// Architecture:
/// ```text
///  session.json        json/*.json
///        │                  │
///        ▼                  ▼
///   ┌──────────┐     ┌──────────────┐
///   │ detector │────▶│   spectrum   │  parse → calibrate → score
///   └──────────┘     └──────────────┘
///                           │
///                           ▼
///                    ┌──────────────┐
///                    │    bounds    │  running min/max
///                    └──────────────┘
///                           │
///                           ▼
///                    ┌──────────────┐
///                    │    frame     │  center, scale, flatten altitude
///                    └──────────────┘
/// ```
///
/// `loader` owns the directory layout and the JSON field helpers.

pub mod bounds;
pub mod detector;
pub mod frame;
pub mod loader;
pub mod spectrum;
