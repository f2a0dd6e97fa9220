use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum, ValueHint};
use serde::Serialize;

use gamma3d::{Bounds, FrameOptions, LoadReport, LoadStatus, ReferenceFrame, Session};

#[derive(Parser, Debug)]
#[command(author, version, about = "Load a gamma survey session and print the normalized dataset", long_about = None)]
struct Cli {
    /// Session directory (contains session.json and json/)
    #[arg(value_hint = ValueHint::DirPath)]
    session: PathBuf,

    /// Lua dose-rate script, loaded before the session
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    script: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Summary)]
    format: Format,

    /// Horizontal scale of the local frame
    #[arg(long, default_value_t = FrameOptions::default().scale)]
    scale: f64,

    /// Vertical position of the center/north markers
    #[arg(long, default_value_t = FrameOptions::default().ground_level, allow_hyphen_values = true)]
    ground_level: f64,

    /// Load the session first, then the script, then rescore the loaded records
    #[arg(long, requires = "script")]
    rescore: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Summary,
    Csv,
    Json,
}

/// One record, flattened for CSV / JSON output.
#[derive(Debug, Serialize)]
struct RecordRow {
    index: usize,
    file: String,
    time: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    x: f64,
    y: f64,
    z: f64,
    doserate: f64,
    scored: bool,
}

#[derive(Debug, Serialize)]
struct SessionDump<'a> {
    name: &'a str,
    comment: &'a str,
    livetime: i64,
    iterations: i64,
    report: &'a LoadReport,
    bounds: &'a Bounds,
    frame: &'a ReferenceFrame,
    records: Vec<RecordRow>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let (session, report) = open_session(&cli)?;

    if report.status == LoadStatus::PartialSuccess {
        log::warn!("{} measurement files were skipped", report.skipped.len());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.format {
        Format::Summary => write_summary(&mut out, &session, &report)?,
        Format::Csv => write_csv(&mut out, &session)?,
        Format::Json => {
            let dump = SessionDump {
                name: session.name(),
                comment: session.comment(),
                livetime: session.livetime(),
                iterations: session.iterations(),
                report: &report,
                bounds: session.bounds(),
                frame: session.frame(),
                records: rows(&session),
            };
            serde_json::to_writer_pretty(&mut out, &dump).context("writing JSON")?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Load the session and script in the order the flags ask for.
fn open_session(cli: &Cli) -> Result<(Session, LoadReport)> {
    let options = FrameOptions {
        scale: cli.scale,
        ground_level: cli.ground_level,
        ..FrameOptions::default()
    };
    let mut session = Session::with_options(options);

    let load_script = |session: &mut Session| -> Result<()> {
        if let Some(script) = &cli.script {
            session
                .load_doserate_script(script)
                .with_context(|| format!("loading script {}", script.display()))?;
        }
        Ok(())
    };

    if !cli.rescore {
        load_script(&mut session)?;
    }
    let report = session
        .load(&cli.session)
        .with_context(|| format!("loading session {}", cli.session.display()))?;
    if cli.rescore {
        load_script(&mut session)?;
        let scored = session.rescore();
        log::info!("Rescored {scored} of {} spectra", session.spectrum_count());
    }

    Ok((session, report))
}

fn rows(session: &Session) -> Vec<RecordRow> {
    session
        .records()
        .iter()
        .enumerate()
        .map(|(index, r)| {
            let p = r.position();
            RecordRow {
                index,
                file: r.path().display().to_string(),
                time: r.gps_time(),
                latitude: r.latitude(),
                longitude: r.longitude(),
                altitude: r.altitude(),
                x: p.x,
                y: p.y,
                z: p.z,
                doserate: r.doserate(),
                scored: r.is_scored(),
            }
        })
        .collect()
}

fn write_csv(out: &mut impl Write, session: &Session) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows(session) {
        writer.serialize(row).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_summary(out: &mut impl Write, session: &Session, report: &LoadReport) -> Result<()> {
    let b = session.bounds();
    writeln!(out, "Session:    {}", session.name())?;
    if !session.comment().is_empty() {
        writeln!(out, "Comment:    {}", session.comment())?;
    }
    if let Some(cal) = session.calibration() {
        writeln!(
            out,
            "Detector:   {} #{} ({} channels, HV {})",
            cal.detector.type_name, cal.detector.serialnumber, cal.detector.num_channels, cal.detector.hv
        )?;
    }
    writeln!(
        out,
        "Script:     {}",
        session.script_name().unwrap_or("<none>")
    )?;
    writeln!(out, "Spectra:    {} loaded, {} skipped", report.loaded, report.skipped.len())?;
    for skipped in &report.skipped {
        writeln!(out, "  skipped {}: {}", skipped.path.display(), skipped.reason)?;
    }
    writeln!(out, "Doserate:   {:.4} .. {:.4}", b.doserate.min, b.doserate.max)?;
    writeln!(out, "Latitude:   {:.6} .. {:.6}", b.latitude.min, b.latitude.max)?;
    writeln!(out, "Longitude:  {:.6} .. {:.6}", b.longitude.min, b.longitude.max)?;
    writeln!(out, "Altitude:   {:.2} .. {:.2}", b.altitude.min, b.altitude.max)?;
    writeln!(
        out,
        "Extent:     x {:.2} .. {:.2}, y {:.2} .. {:.2}, z {:.2} .. {:.2}",
        b.x.min, b.x.max, b.y.min, b.y.max, b.z.min, b.z.max
    )?;
    let (c, n) = (session.center(), session.north());
    writeln!(out, "Center:     ({:.3}, {:.3}, {:.3})", c.x, c.y, c.z)?;
    writeln!(out, "North:      ({:.3}, {:.3}, {:.3})", n.x, n.y, n.z)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    use super::*;

    /// One four-channel record and a unit `gain` script.
    fn survey() -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("json")).unwrap();
        let session = json!({
            "Name": "cli", "Comment": "", "Livetime": 2000000, "Iterations": 1,
            "DetectorType": {
                "Name": "NaI2x2", "MaxNumChannels": 1024, "MinHV": 0, "MaxHV": 1200,
                "GEScript": "unit.lua"
            },
            "Detector": {
                "TypeName": "NaI2x2", "CurrentHV": 775, "CurrentNumChannels": 4,
                "Serialnumber": "1", "CurrentCoarseGain": 1.0, "CurrentFineGain": 1.0,
                "CurrentLivetime": 2000000, "CurrentLLD": 0, "CurrentULD": 3,
                "EnergyCurveCoefficients": [0.0, 100.0]
            }
        });
        let record = json!({
            "LatitudeStart": 59.91, "LongitudeStart": 10.75, "AltitudeStart": 100.0,
            "GpsTimeStart": "2017-05-02T10:31:32Z", "Livetime": 2000000,
            "Channels": [10, 2, 0, 4]
        });
        fs::write(dir.path().join("session.json"), session.to_string()).unwrap();
        fs::write(dir.path().join("json/00000.json"), record.to_string()).unwrap();
        fs::write(dir.path().join("unit.lua"), "function gain(e) return 1 end").unwrap();
        dir
    }

    fn cli(dir: &Path, extra: &[&str]) -> Cli {
        let session = dir.display().to_string();
        let script = dir.join("unit.lua").display().to_string();
        let mut args = vec!["gamma3d", session.as_str(), "--script", script.as_str()];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn script_before_session_scores_on_load() {
        let dir = survey();
        let (session, report) = open_session(&cli(dir.path(), &[])).unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(session.spectrum(0).unwrap().doserate(), 8.0);
    }

    #[test]
    fn rescore_flag_scores_after_load() {
        let dir = survey();
        let (session, _) = open_session(&cli(dir.path(), &["--rescore"])).unwrap();
        let record = session.spectrum(0).unwrap();
        assert!(record.is_scored());
        assert_eq!(record.doserate(), 8.0);
        assert_eq!(session.max_doserate(), 8.0);
    }

    #[test]
    fn rescore_requires_a_script() {
        assert!(Cli::try_parse_from(["gamma3d", "session", "--rescore"]).is_err());
    }
}
