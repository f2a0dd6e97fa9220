use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue};

use super::detector::CalibrationModel;
use crate::error::{Error, Result};

pub type JsonObject = Map<String, JsonValue>;

pub const SESSION_FILE: &str = "session.json";
pub const SPECTRUM_DIR: &str = "json";

// ---------------------------------------------------------------------------
// Session directory layout
// ---------------------------------------------------------------------------

/// Paths of a validated session directory.
///
/// ```text
///  <root>/
///    session.json      detector configuration
///    json/*.json       one measurement per file
/// ```
#[derive(Debug, Clone)]
pub struct SessionLayout {
    pub root: PathBuf,
    pub session_file: PathBuf,
    pub spectrum_dir: PathBuf,
}

impl SessionLayout {
    pub fn validate(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::DirectoryNotFound(root.to_path_buf()));
        }

        let spectrum_dir = root.join(SPECTRUM_DIR);
        if !spectrum_dir.is_dir() {
            return Err(Error::DirectoryNotASession(spectrum_dir));
        }

        let session_file = root.join(SESSION_FILE);
        if !session_file.is_file() {
            return Err(Error::DirectoryNotASession(root.to_path_buf()));
        }

        Ok(SessionLayout {
            root: root.to_path_buf(),
            session_file,
            spectrum_dir,
        })
    }

    /// All `*.json` files under `json/`, in lexical path order.
    pub fn spectrum_files(&self) -> Result<Vec<PathBuf>> {
        let unreadable = |source| Error::UnreadableDirectory {
            path: self.spectrum_dir.clone(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.spectrum_dir).map_err(unreadable)? {
            let path = entry.map_err(unreadable)?.path();
            let is_json = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"));
            if is_json && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

// ---------------------------------------------------------------------------
// session.json
// ---------------------------------------------------------------------------

/// Contents of `session.json`.
///
/// ```json
/// {
///   "Name": "...", "Comment": "...", "Livetime": 2000000, "Iterations": 120,
///   "DetectorType": { "Name": "...", "MaxNumChannels": 1024, ... },
///   "Detector": { "TypeName": "...", "EnergyCurveCoefficients": [..], ... }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionFile {
    pub name: String,
    pub comment: String,
    pub livetime: i64,
    pub iterations: i64,
    pub calibration: CalibrationModel,
}

pub fn load_session_file(path: &Path) -> Result<SessionFile> {
    let invalid = |reason: String| Error::InvalidSessionFile {
        path: path.to_path_buf(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let root: JsonValue = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
    let root = root
        .as_object()
        .ok_or_else(|| invalid("expected a top-level JSON object".into()))?;

    parse_session_document(root)
}

pub fn parse_session_document(root: &JsonObject) -> Result<SessionFile> {
    const SCOPE: &str = "Session";

    let name = required_str(root, SCOPE, "Name")?;
    let comment = required_str(root, SCOPE, "Comment")?;
    let livetime = required_i64(root, SCOPE, "Livetime")?;
    let iterations = required_i64(root, SCOPE, "Iterations")?;
    let calibration = CalibrationModel::from_json(root)?;

    Ok(SessionFile {
        name,
        comment,
        livetime,
        iterations,
        calibration,
    })
}

// ---------------------------------------------------------------------------
// Field extraction helpers
// ---------------------------------------------------------------------------

fn field<'a>(obj: &'a JsonObject, scope: &str, key: &str) -> Result<&'a JsonValue> {
    obj.get(key)
        .ok_or_else(|| Error::MissingField(format!("{scope}:{key}")))
}

fn invalid(scope: &str, key: &str, expected: &'static str) -> Error {
    Error::InvalidField {
        field: format!("{scope}:{key}"),
        expected,
    }
}

pub fn required_str(obj: &JsonObject, scope: &str, key: &str) -> Result<String> {
    field(obj, scope, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(scope, key, "a string"))
}

pub fn required_f64(obj: &JsonObject, scope: &str, key: &str) -> Result<f64> {
    field(obj, scope, key)?
        .as_f64()
        .ok_or_else(|| invalid(scope, key, "a number"))
}

/// Integers also accept JSON floats, truncated toward zero.
pub fn required_i64(obj: &JsonObject, scope: &str, key: &str) -> Result<i64> {
    let val = field(obj, scope, key)?;
    val.as_i64()
        .or_else(|| val.as_f64().map(|f| f as i64))
        .ok_or_else(|| invalid(scope, key, "an integer"))
}

pub fn required_object<'a>(obj: &'a JsonObject, scope: &str, key: &str) -> Result<&'a JsonObject> {
    field(obj, scope, key)?
        .as_object()
        .ok_or_else(|| invalid(scope, key, "an object"))
}

pub fn required_f64_array(obj: &JsonObject, scope: &str, key: &str) -> Result<Vec<f64>> {
    let arr = field(obj, scope, key)?
        .as_array()
        .ok_or_else(|| invalid(scope, key, "an array"))?;

    arr.iter()
        .map(|v| v.as_f64().ok_or_else(|| invalid(scope, key, "an array of numbers")))
        .collect()
}

pub fn optional_str(obj: &JsonObject, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

pub fn optional_f64(obj: &JsonObject, key: &str) -> Option<f64> {
    obj.get(key).and_then(|v| v.as_f64())
}

pub fn optional_i64(obj: &JsonObject, key: &str) -> Option<i64> {
    obj.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
}

/// Numbers separated by whitespace, commas or semicolons: `"0 3 5;7,2"`.
pub fn parse_separated_floats(s: &str) -> std::result::Result<Vec<f64>, String> {
    s.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|tok| !tok.is_empty())
        .enumerate()
        .map(|(j, tok)| {
            tok.parse::<f64>()
                .map_err(|_| format!("[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(v: JsonValue) -> JsonObject {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_field_names_scope_and_key() {
        let obj = object(json!({ "Name": "x" }));
        match required_i64(&obj, "Session", "Livetime") {
            Err(Error::MissingField(f)) => assert_eq!(f, "Session:Livetime"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn integers_accept_floats() {
        let obj = object(json!({ "HV": 712.9, "Bad": "high" }));
        assert_eq!(required_i64(&obj, "D", "HV").unwrap(), 712);
        assert!(matches!(
            required_i64(&obj, "D", "Bad"),
            Err(Error::InvalidField { .. })
        ));
    }

    #[test]
    fn optional_integers_accept_floats() {
        let obj = object(json!({ "SessionIndex": 12.0, "Other": 7, "Name": "x" }));
        assert_eq!(optional_i64(&obj, "SessionIndex"), Some(12));
        assert_eq!(optional_i64(&obj, "Other"), Some(7));
        assert_eq!(optional_i64(&obj, "Name"), None);
        assert_eq!(optional_i64(&obj, "Missing"), None);
    }

    #[test]
    fn float_arrays() {
        let obj = object(json!({ "C": [1, 2.5, -3], "Mixed": [1, "two"] }));
        assert_eq!(required_f64_array(&obj, "D", "C").unwrap(), vec![1.0, 2.5, -3.0]);
        assert!(required_f64_array(&obj, "D", "Mixed").is_err());
    }

    #[test]
    fn separated_floats() {
        assert_eq!(
            parse_separated_floats(" 0 3 5;7,2 \n").unwrap(),
            vec![0.0, 3.0, 5.0, 7.0, 2.0]
        );
        assert!(parse_separated_floats("1 x 2").is_err());
        assert!(parse_separated_floats("").unwrap().is_empty());
    }
}
