//! Dose-rate scripts.
//!
//! A script is plain Lua defining one of two global functions:
//!
//! ```lua
//! -- whole spectrum in, dose rate out
//! function doserate(spectrum, detector)
//!   local sum = 0
//!   for i, e in ipairs(spectrum.energies) do
//!     sum = sum + spectrum.counts[i] * e
//!   end
//!   return sum / (spectrum.livetime / 1e6)
//! end
//!
//! -- or a G(E) factor per channel energy; the engine sums cps * gain(E)
//! -- across the detector's discriminator window
//! function gain(energy)
//!   return 0.0012 * (energy / 1000) ^ 1.2
//! end
//! ```
//!
//! Only the `math`, `string` and `table` libraries are available. The base
//! library loses `dofile`, `loadfile`, `load`, `require`, `print` and
//! `collectgarbage`.

use std::path::Path;

use mlua::{Function, Lua, LuaOptions, StdLib, Table, Value};

use crate::data::detector::Detector;
use crate::error::{Error, Result};
use crate::geo::Coordinate;

const SPECTRUM_ENTRY: &str = "doserate";
const GAIN_ENTRY: &str = "gain";
const MEMORY_LIMIT: usize = 64 * 1024 * 1024;
const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Everything a script may look at for one measurement.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub energies: &'a [f64],
    pub counts: &'a [f64],
    /// Microseconds.
    pub livetime: f64,
    /// Microseconds.
    pub realtime: Option<f64>,
    pub coordinate: Coordinate,
    pub detector: &'a Detector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryPoint {
    Spectrum,
    Gain,
}

struct LoadedScript {
    name: String,
    lua: Lua,
    entry: EntryPoint,
}

enum ScriptState {
    Unloaded,
    Ready(LoadedScript),
}

/// Owns one sandboxed interpreter. Not shared between threads.
pub struct DoserateScriptEngine {
    state: ScriptState,
}

impl Default for DoserateScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DoserateScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            ScriptState::Unloaded => f.write_str("DoserateScriptEngine(unloaded)"),
            ScriptState::Ready(s) => write!(f, "DoserateScriptEngine({}, {:?})", s.name, s.entry),
        }
    }
}

impl DoserateScriptEngine {
    pub fn new() -> Self {
        DoserateScriptEngine {
            state: ScriptState::Unloaded,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ScriptState::Ready(_))
    }

    /// Name of the loaded script, if any.
    pub fn script_name(&self) -> Option<&str> {
        match &self.state {
            ScriptState::Ready(s) => Some(&s.name),
            ScriptState::Unloaded => None,
        }
    }

    pub fn load_script(&mut self, path: &Path) -> Result<()> {
        let name = path.display().to_string();
        let source = std::fs::read_to_string(path).map_err(|e| Error::ScriptLoad {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        self.load_script_source(&name, &source)
    }

    /// Compile and run `source` in a fresh interpreter. The current script,
    /// if any, is only replaced when this succeeds.
    pub fn load_script_source(&mut self, name: &str, source: &str) -> Result<()> {
        let script = LoadedScript::compile(name, source).map_err(|reason| Error::ScriptLoad {
            name: name.to_string(),
            reason,
        })?;
        log::info!("Loaded doserate script {name} ({:?} entry point)", script.entry);
        self.state = ScriptState::Ready(script);
        Ok(())
    }

    pub fn evaluate(&self, input: &ScoreInput<'_>) -> Result<f64> {
        let ScriptState::Ready(script) = &self.state else {
            return Err(Error::ScriptNotLoaded);
        };

        let doserate = match script.entry {
            EntryPoint::Spectrum => script.call_spectrum(input),
            EntryPoint::Gain => script.call_gain(input),
        }
        .map_err(|e| Error::ScriptRuntime(e.to_string()))?;

        if !doserate.is_finite() {
            return Err(Error::ScriptRuntime(format!("{} returned {doserate}", script.name)));
        }
        Ok(doserate)
    }

    /// Like [`DoserateScriptEngine::evaluate`] but never fails: `None` when
    /// no script is loaded or the script errors (logged).
    pub fn score(&self, input: &ScoreInput<'_>) -> Option<f64> {
        match self.evaluate(input) {
            Ok(v) => Some(v),
            Err(Error::ScriptNotLoaded) => None,
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }
}

/// Base-library functions that reach the filesystem, stdout or the collector.
const STRIPPED_GLOBALS: [&str; 6] = ["dofile", "loadfile", "load", "require", "print", "collectgarbage"];

fn strip_base_library(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in STRIPPED_GLOBALS {
        globals.set(name, Value::Nil)?;
    }
    Ok(())
}

impl LoadedScript {
    fn compile(name: &str, source: &str) -> std::result::Result<Self, String> {
        let lua = Lua::new_with(StdLib::MATH | StdLib::STRING | StdLib::TABLE, LuaOptions::default())
            .map_err(|e| e.to_string())?;
        lua.set_memory_limit(MEMORY_LIMIT).map_err(|e| e.to_string())?;
        strip_base_library(&lua).map_err(|e| e.to_string())?;
        lua.load(source)
            .set_name(name)
            .exec()
            .map_err(|e| e.to_string())?;

        let entry = {
            let globals = lua.globals();
            let is_function = |key: &str| {
                matches!(globals.get::<Value>(key), Ok(Value::Function(_)))
            };
            if is_function(SPECTRUM_ENTRY) {
                EntryPoint::Spectrum
            } else if is_function(GAIN_ENTRY) {
                EntryPoint::Gain
            } else {
                return Err(format!(
                    "script defines neither `{SPECTRUM_ENTRY}` nor `{GAIN_ENTRY}`"
                ));
            }
        };

        Ok(LoadedScript {
            name: name.to_string(),
            lua,
            entry,
        })
    }

    fn call_spectrum(&self, input: &ScoreInput<'_>) -> mlua::Result<f64> {
        let spectrum = self.lua.create_table()?;
        spectrum.set("energies", self.lua.create_sequence_from(input.energies.iter().copied())?)?;
        spectrum.set("counts", self.lua.create_sequence_from(input.counts.iter().copied())?)?;
        spectrum.set("livetime", input.livetime)?;
        spectrum.set("realtime", input.realtime)?;
        spectrum.set("latitude", input.coordinate.latitude)?;
        spectrum.set("longitude", input.coordinate.longitude)?;
        spectrum.set("altitude", input.coordinate.altitude)?;

        let detector = self.detector_table(input.detector)?;
        let func: Function = self.lua.globals().get(SPECTRUM_ENTRY)?;
        func.call::<f64>((spectrum, detector))
    }

    fn call_gain(&self, input: &ScoreInput<'_>) -> mlua::Result<f64> {
        if input.livetime <= 0.0 {
            return Err(mlua::Error::RuntimeError(format!(
                "livetime {} leaves no counting time",
                input.livetime
            )));
        }
        let seconds = input.livetime / MICROS_PER_SECOND;
        let channels = input.counts.len().min(input.energies.len());

        let func: Function = self.lua.globals().get(GAIN_ENTRY)?;
        let mut doserate = 0.0;
        for i in input.detector.discriminator_window(channels) {
            let cps = input.counts[i] / seconds;
            if cps == 0.0 {
                continue;
            }
            doserate += cps * func.call::<f64>(input.energies[i])?;
        }
        Ok(doserate)
    }

    fn detector_table(&self, detector: &Detector) -> mlua::Result<Table> {
        let t = self.lua.create_table()?;
        t.set("type_name", detector.type_name.as_str())?;
        t.set("serialnumber", detector.serialnumber.as_str())?;
        t.set("hv", detector.hv)?;
        t.set("num_channels", detector.num_channels)?;
        t.set("coarse_gain", detector.coarse_gain)?;
        t.set("fine_gain", detector.fine_gain)?;
        t.set("livetime", detector.livetime)?;
        t.set("lld", detector.lld)?;
        t.set("uld", detector.uld)?;
        Ok(t)
    }
}
