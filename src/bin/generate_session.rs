use std::fs;
use std::path::PathBuf;

use chrono::{Duration, TimeZone, Utc};
use clap::Parser;
use serde_json::json;

/// Synthetic survey layout.
const ORIGIN: (f64, f64) = (59.9107, 10.7562);
const GRID_ROWS: usize = 8;
const GRID_COLS: usize = 12;
/// Grid spacing in degrees (~20 m north/south).
const STEP_DEG: f64 = 0.0002;
const GROUND_ALTITUDE: f64 = 96.0;
const NUM_CHANNELS: usize = 1024;
const LIVETIME_US: i64 = 2_000_000;
/// keV = OFFSET + SLOPE * channel
const CAL_OFFSET: f64 = -7.5;
const CAL_SLOPE: f64 = 2.9;
/// Hidden Cs-137 point source.
const SOURCE: (f64, f64) = (59.9113, 10.7580);

const SCRIPT: &str = r#"-- G(E) conversion for a 2x2" NaI detector, energy in keV.
-- The session loader sums cps * gain(E) over the discriminator window.
function gain(energy)
  local e = energy / 1000.0
  if e < 0.05 then
    return 0.0
  end
  return 0.0012 * e ^ 1.2
end
"#;

/// Photopeak shape with the given full width at half maximum and area.
fn photopeak(kev: f64, center: f64, fwhm: f64, area: f64) -> f64 {
    let sigma = fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt());
    let norm = area / (sigma * (2.0 * std::f64::consts::PI).sqrt());
    norm * (-(kev - center).powi(2) / (2.0 * sigma * sigma)).exp()
}

/// Background continuum plus a 662 keV photopeak scaled by `source_strength`.
fn generate_spectrum(source_strength: f64, rng: &mut SurveyRng) -> Vec<u64> {
    (0..NUM_CHANNELS)
        .map(|ch| {
            let kev = CAL_OFFSET + CAL_SLOPE * ch as f64;
            let background = 40.0 * (-kev.max(0.0) / 350.0).exp() + 0.5;
            let peak = photopeak(kev, 661.7, 66.0, 4200.0 * source_strength);
            rng.counts(background + peak)
        })
        .collect()
}

/// Deterministic splitmix64 stream for reproducible surveys.
struct SurveyRng(u64);

impl SurveyRng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in (0, 1].
    fn uniform(&mut self) -> f64 {
        ((self.next_u64() >> 11) + 1) as f64 / (1u64 << 53) as f64
    }

    fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let (u1, u2) = (self.uniform(), self.uniform());
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    /// Poisson-distributed channel count with the given mean. Knuth's method
    /// for small means, a rounded normal above 30.
    fn counts(&mut self, mean: f64) -> u64 {
        if mean <= 0.0 {
            return 0;
        }
        if mean > 30.0 {
            return self.normal(mean, mean.sqrt()).round().max(0.0) as u64;
        }
        let limit = (-mean).exp();
        let mut k = 0;
        let mut p = self.uniform();
        while p > limit {
            k += 1;
            p *= self.uniform();
        }
        k
    }
}

/// Write a synthetic survey session with a hidden Cs-137 source
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Output directory
    #[arg(default_value = "sample_session")]
    out_dir: PathBuf,

    /// Number of measurements along the serpentine flight
    #[arg(short, long, default_value_t = GRID_ROWS * GRID_COLS)]
    count: usize,

    /// PRNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let out_dir = args.out_dir;
    let spectrum_dir = out_dir.join("json");
    fs::create_dir_all(&spectrum_dir).expect("Failed to create session directory");

    let mut rng = SurveyRng(args.seed);
    let session_name = "2017-05-02_10-31-08";
    let start = Utc
        .with_ymd_and_hms(2017, 5, 2, 10, 31, 8)
        .single()
        .expect("valid start time");

    let session = json!({
        "Name": session_name,
        "Comment": "Synthetic survey with a hidden Cs-137 source",
        "Livetime": LIVETIME_US,
        "Iterations": args.count,
        "DetectorType": {
            "Name": "NaI2x2",
            "MaxNumChannels": NUM_CHANNELS,
            "MinHV": 0,
            "MaxHV": 1200,
            "GEScript": "doserate.lua"
        },
        "Detector": {
            "TypeName": "NaI2x2",
            "CurrentHV": 775,
            "CurrentNumChannels": NUM_CHANNELS,
            "Serialnumber": "31003",
            "CurrentCoarseGain": 1.0,
            "CurrentFineGain": 1.31,
            "CurrentLivetime": LIVETIME_US,
            "CurrentLLD": 3,
            "CurrentULD": 1020,
            "EnergyCurveCoefficients": [CAL_OFFSET, CAL_SLOPE]
        }
    });
    fs::write(
        out_dir.join("session.json"),
        serde_json::to_string_pretty(&session).expect("serialize session"),
    )
    .expect("Failed to write session.json");
    fs::write(out_dir.join("doserate.lua"), SCRIPT).expect("Failed to write doserate.lua");

    // Serpentine flight, one measurement per cell, as many rows as `count` needs.
    for index in 0..args.count {
        let (row, step) = (index / GRID_COLS, index % GRID_COLS);
        let col = if row % 2 == 0 { step } else { GRID_COLS - 1 - step };
        let latitude = ORIGIN.0 + row as f64 * STEP_DEG + rng.normal(0.0, STEP_DEG * 0.05);
        let longitude = ORIGIN.1 + col as f64 * STEP_DEG * 2.0 + rng.normal(0.0, STEP_DEG * 0.05);
        let altitude = GROUND_ALTITUDE + 1.5 + rng.normal(0.0, 0.4);

        // Rough inverse-square falloff, distances in grid cells.
        let d_lat = (latitude - SOURCE.0) / STEP_DEG;
        let d_lon = (longitude - SOURCE.1) / (STEP_DEG * 2.0);
        let strength = 1.0 / (1.0 + d_lat * d_lat + d_lon * d_lon);

        let channels = generate_spectrum(strength, &mut rng);
        let total: u64 = channels.iter().sum();
        let time = start + Duration::seconds(2 * index as i64);

        let measurement = json!({
            "SessionName": session_name,
            "SessionIndex": index,
            "LatitudeStart": latitude,
            "LongitudeStart": longitude,
            "AltitudeStart": altitude,
            "GpsTimeStart": time.to_rfc3339(),
            "Livetime": LIVETIME_US,
            "Realtime": LIVETIME_US + 11_342,
            "Channels": channels
        });
        fs::write(
            spectrum_dir.join(format!("{index:05}.json")),
            serde_json::to_string(&measurement).expect("serialize spectrum"),
        )
        .expect("Failed to write spectrum");
        log::debug!("{index:05}: strength {strength:.3}, {total} counts");
    }

    log::info!("Seed {}, {} rows of {GRID_COLS}", args.seed, args.count.div_ceil(GRID_COLS));
    println!(
        "Wrote session '{session_name}' with {} spectra ({NUM_CHANNELS} channels each) to {}",
        args.count,
        out_dir.display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_the_mean() {
        let mut rng = SurveyRng(7);
        for mean in [0.5, 4.0, 120.0] {
            let n = 20_000;
            let sum: u64 = (0..n).map(|_| rng.counts(mean)).sum();
            let observed = sum as f64 / n as f64;
            assert!((observed - mean).abs() < 0.05 * mean + 0.05, "mean {mean}: {observed}");
        }
        assert_eq!(rng.counts(0.0), 0);
    }

    #[test]
    fn photopeak_integrates_to_area() {
        let area: f64 = (0..4000).map(|i| photopeak(400.0 + i as f64 * 0.1, 661.7, 66.0, 100.0) * 0.1).sum();
        assert!((area - 100.0).abs() < 0.1);
    }
}
