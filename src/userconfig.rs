//! User configuration files: INI sections of options, with typed defaults.
//!
//! Values are stored as text.  Strings are stored verbatim, everything else as a Python literal
//! (`True`, `12`, `0.5`, `[1, 2]`, `None`, arrays as `['array', [...], 'float64']`).  Reading an
//! option decodes it according to the kind of its default value; options without a typed default
//! are decoded as literals and fall back to the raw text.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use ini::{EscapePolicy, Ini, ParseOption, WriteOption};
use log::{debug, warn};
use num_bigint::BigInt;
use regex::Regex;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::value::Value;

/// Section that always exists, holding the configuration version.
pub const MAIN_SECTION: &str = "main";

/// Default values, section name to option name to value.
pub type Defaults = IndexMap<String, IndexMap<String, Value>>;

/// A set of INI sections with typed defaults.
///
/// ```
/// use guidata::{UserConfig, Value};
/// use indexmap::IndexMap;
///
/// let mut defaults = IndexMap::new();
/// defaults.insert("window".to_string(), IndexMap::from([("width".to_string(), Value::Int(640))]));
/// let mut conf = UserConfig::new(defaults)?;
///
/// conf.set("window", "width", 800.0)?;
/// assert_eq!(conf.get("window", "width")?, Value::Int(800));
/// assert_eq!(conf.get_raw("window", "width"), Some("800"));
/// # Ok::<(), guidata::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct UserConfig {
    defaults: Defaults,
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl Default for UserConfig {
    fn default() -> Self {
        let mut defaults = Defaults::new();
        defaults.insert(MAIN_SECTION.to_string(), IndexMap::new());
        let mut sections = IndexMap::new();
        sections.insert(MAIN_SECTION.to_string(), IndexMap::new());
        UserConfig { defaults, sections }
    }
}

impl UserConfig {
    /// Build a configuration holding `defaults`.
    ///
    /// Fails when a default is something other than `None`, a bool, a number, a string, or lists
    /// and dicts of those.
    pub fn new(mut defaults: Defaults) -> Result<Self> {
        check_default_values(&defaults)?;
        defaults.entry(MAIN_SECTION.to_string()).or_default();
        let mut conf = UserConfig { defaults, ..UserConfig::default() };
        conf.reset_to_defaults()?;
        Ok(conf)
    }

    /// Merge more defaults in, then reset every option to its default.
    pub fn update_defaults(&mut self, defaults: Defaults) -> Result<()> {
        check_default_values(&defaults)?;
        for (section, options) in defaults {
            self.defaults.entry(section).or_default().extend(options);
        }
        self.reset_to_defaults()
    }

    /// Load `path` as the configuration of an application at `version` (`X.Y.Z`).
    ///
    /// When the stored configuration version differs, every option is reset to its default,
    /// options without a default are dropped, and the version is updated.
    pub fn set_application(&mut self, path: impl AsRef<Path>, version: &str) -> Result<()> {
        let pattern = Regex::new(r"^(\d+).(\d+).(\d+)").map_err(|e| Error::Unsupported(e.to_string()))?;
        if !pattern.is_match(version) {
            return Err(Error::Unsupported(format!(
                "version number {:?} is incorrect - must be in X.Y.Z format", version,
            )));
        }
        self.load(path)?;
        if self.get_or(MAIN_SECTION, "version", version)?.to_string() != version {
            debug!("configuration version changed to {}, resetting to defaults", version);
            self.reset_to_defaults()?;
            self.remove_deprecated_options();
            self.set_version(version)?;
        }
        Ok(())
    }

    /// Configuration (not application) version.
    pub fn version(&mut self) -> Result<String> {
        Ok(self.get_or(MAIN_SECTION, "version", "0.0.0")?.to_string())
    }

    pub fn set_version(&mut self, version: &str) -> Result<()> {
        self.set(MAIN_SECTION, "version", version)
    }

    /// Merge the options stored in `path`.  A missing file is not an error.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!("no configuration file at {}", path.display());
            return Ok(());
        }
        debug!("loading configuration from {}", path.display());
        let text = fs::read_to_string(path)?;
        self.merge_str(&text)
    }

    /// Write every section to `path`, creating its directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        debug!("saving configuration to {}", path.display());
        fs::write(path, self.to_string())?;
        Ok(())
    }

    fn merge_str(&mut self, text: &str) -> Result<()> {
        let opt = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            enabled_indented_mutiline_value: true,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(text, opt)?;
        for (section, props) in ini.iter() {
            let Some(section) = section else {
                if props.iter().next().is_some() {
                    warn!("configuration text contains options outside of any section, ignored");
                }
                continue;
            };
            let options = self.sections.entry(section.to_string()).or_default();
            for (key, value) in props.iter() {
                options.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    /// Replace the defaults by the current (raw) contents.
    pub fn set_as_defaults(&mut self) {
        self.defaults = self.sections.iter()
            .map(|(section, options)| {
                let options = options.iter().map(|(k, v)| (k.clone(), Value::Str(v.clone()))).collect();
                (section.clone(), options)
            })
            .collect();
    }

    /// Set every option that has a default back to it.
    pub fn reset_to_defaults(&mut self) -> Result<()> {
        let mut stored = Vec::new();
        for (section, options) in &self.defaults {
            for (option, value) in options {
                stored.push((section.clone(), option.clone(), stored_text(value)?));
            }
        }
        for (section, option, text) in stored {
            self.sections.entry(section).or_default().insert(option, text);
        }
        Ok(())
    }

    fn remove_deprecated_options(&mut self) {
        let defaults = &self.defaults;
        for (section, options) in self.sections.iter_mut() {
            options.retain(|option, _| {
                let keep = defaults.get(section).is_some_and(|d| d.contains_key(option));
                if !keep {
                    debug!("removing deprecated option {}/{}", section, option);
                }
                keep
            });
        }
        self.sections.retain(|section, options| section == MAIN_SECTION || !options.is_empty());
    }

    pub fn get_default(&self, section: &str, option: &str) -> Option<&Value> {
        self.defaults.get(section)?.get(option)
    }

    /// Record the default of an option.  [`set`](Self::set) does this for options without one.
    pub fn set_default(&mut self, section: &str, option: &str, value: impl Into<Value>) {
        self.defaults.entry(section.to_string()).or_default().insert(option.to_string(), value.into());
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn has_option(&self, section: &str, option: &str) -> bool {
        self.get_raw(section, option).is_some()
    }

    /// Whether some option of `section` is named `prefix/...`.
    pub fn has_option_prefix(&self, section: &str, prefix: &str) -> bool {
        let Some(options) = self.sections.get(section) else { return false };
        options.keys().any(|key| {
            key.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Options stored in `section`, in file order.
    pub fn options(&self, section: &str) -> impl Iterator<Item = &str> {
        self.sections.get(section).into_iter().flat_map(|options| options.keys().map(String::as_str))
    }

    /// The stored text of an option.
    pub fn get_raw(&self, section: &str, option: &str) -> Option<&str> {
        self.sections.get(section)?.get(option).map(String::as_str)
    }

    /// Decode an option.  Fails with [`Error::MissingKey`] when it is not stored.
    pub fn get(&self, section: &str, option: &str) -> Result<Value> {
        let path = format!("{}/{}", section, option);
        let raw = self.get_raw(section, option).ok_or_else(|| Error::missing(&path))?;
        match self.get_default(section, option) {
            Some(Value::Bool(_)) => match decode(raw) {
                Some(Value::Bool(b)) => Ok(Value::Bool(b)),
                Some(Value::Int(i)) => Ok(Value::Bool(i != 0)),
                _ => Err(Error::mismatch(path, "bool", &Value::Str(raw.to_string()))),
            },
            Some(Value::Float(_)) => parse_float(raw)
                .map(Value::Float)
                .ok_or_else(|| Error::mismatch(path, "float", &Value::Str(raw.to_string()))),
            Some(Value::Int(_)) => raw.trim().parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Error::mismatch(path, "int", &Value::Str(raw.to_string()))),
            Some(Value::Str(_)) => Ok(Value::Str(raw.to_string())),
            _ => Ok(decode(raw).unwrap_or_else(|| Value::Str(raw.to_string()))),
        }
    }

    /// Like [`get`](Self::get), but stores and returns `default` when the option is absent.
    pub fn get_or(&mut self, section: &str, option: &str, default: impl Into<Value>) -> Result<Value> {
        if self.has_option(section, option) {
            return self.get(section, option);
        }
        let default = default.into();
        self.set(section, option, default.clone())?;
        Ok(default)
    }

    /// Every option of `section`, defaults included.
    pub fn get_section(&self, section: &str) -> Result<IndexMap<String, Value>> {
        let mut values = self.defaults.get(section).cloned().unwrap_or_default();
        for option in self.options(section) {
            values.insert(option.to_string(), self.get(section, option)?);
        }
        Ok(values)
    }

    /// Store an option, converted to the kind of its default.
    ///
    /// An option without a default gets `value` as its default.
    pub fn set(&mut self, section: &str, option: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let default = match self.get_default(section, option) {
            Some(default) => default.clone(),
            None => {
                self.set_default(section, option, value.clone());
                value.clone()
            },
        };
        let path = || format!("{}/{}", section, option);
        let value = match default {
            Value::Bool(_) => Value::Bool(value.truthy()),
            Value::Float(_) => match value.as_f64() {
                Some(x) => Value::Float(x),
                None => match value.as_str().and_then(parse_float) {
                    Some(x) => Value::Float(x),
                    None => return Err(Error::mismatch(path(), "float", &value)),
                },
            },
            Value::Int(_) => match value {
                Value::Int(_) => value,
                Value::Bool(b) => Value::Int(b as i64),
                Value::Float(x) if x.is_finite() => Value::Int(x.trunc() as i64),
                Value::Str(ref s) => match s.trim().parse() {
                    Ok(i) => Value::Int(i),
                    Err(_) => return Err(Error::mismatch(path(), "int", &value)),
                },
                _ => return Err(Error::mismatch(path(), "int", &value)),
            },
            Value::Str(_) => value,
            // stored as a literal, even for strings
            _ => Value::Str(encode(&value)?),
        };
        let text = stored_text(&value)?;
        self.sections.entry(section.to_string()).or_default().insert(option.to_string(), text);
        Ok(())
    }

    /// Returns whether the option existed.
    pub fn remove_option(&mut self, section: &str, option: &str) -> bool {
        self.sections.get_mut(section).is_some_and(|options| options.shift_remove(option).is_some())
    }

    /// Returns whether the section existed.
    pub fn remove_section(&mut self, section: &str) -> bool {
        self.sections.shift_remove(section).is_some()
    }
}

/// `name/name.ini` in the user configuration directory of application `name`.
///
/// On Linux this is `$XDG_CONFIG_HOME/.name/name.ini` (defaulting to `~/.config`), elsewhere
/// `~/.name/name.ini`.
pub fn config_path(name: &str) -> Result<PathBuf> {
    let base = if cfg!(target_os = "linux") {
        match std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => home_dir()?.join(".config"),
        }
    } else {
        home_dir()?
    };
    Ok(base.join(format!(".{}", name)).join(format!("{}.ini", name)))
}

fn home_dir() -> Result<PathBuf> {
    ["HOME", "USERPROFILE", "TMP"].iter()
        .filter_map(|var| std::env::var_os(var))
        .map(PathBuf::from)
        .find(|path| path.is_dir())
        .ok_or_else(|| Error::Unsupported(
            "please set the environment variable HOME to your user/home directory path".into(),
        ))
}

fn check_default_values(defaults: &Defaults) -> Result<()> {
    fn check(key: &str, value: &Value, errors: &mut Vec<String>) {
        match value {
            Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => {},
            Value::Seq(items) => items.iter().for_each(|v| check(&format!("{}[]", key), v, errors)),
            Value::Dict(map) => map.iter().for_each(|(k, v)| check(&format!("{}/{}", key, k), v, errors)),
            other => errors.push(format!("invalid value for {}: {}", key, other)),
        }
    }

    let mut errors = Vec::new();
    for options in defaults.values() {
        for (key, value) in options {
            check(key, value, &mut errors);
        }
    }
    match errors.is_empty() {
        true => Ok(()),
        false => Err(Error::Unsupported(format!("invalid default values: {}", errors.join("; ")))),
    }
}

fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse().ok()
}

fn stored_text(value: &Value) -> Result<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => encode(other),
    }
}

/// Python literal of a value.
pub(crate) fn encode(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Array(a) => encode(&a.to_tagged())?,
        Value::Seq(items) => {
            let items = items.iter().map(encode).collect::<Result<Vec<_>>>()?;
            format!("[{}]", items.join(", "))
        },
        Value::Dict(map) => {
            let items = map.iter()
                .map(|(k, v)| Ok(format!("{}: {}", Value::from(k.as_str()).repr(), encode(v)?)))
                .collect::<Result<Vec<_>>>()?;
            format!("{{{}}}", items.join(", "))
        },
        Value::Object(_) => return Err(Error::Literal("a dataset has no literal form".into())),
        other => other.repr(),
    })
}

/// Parse a Python literal.  `None` when `text` is not one.
pub(crate) fn decode(text: &str) -> Option<Value> {
    convert(text.trim().parse::<py_literal::Value>().ok()?)
}

fn convert(value: py_literal::Value) -> Option<Value> {
    use py_literal::Value as Py;

    Some(match value {
        Py::None => Value::None,
        Py::Boolean(b) => Value::Bool(b),
        Py::Integer(i) => integer(&i)?,
        Py::Float(x) => Value::Float(x),
        Py::String(s) => Value::Str(s),
        Py::Bytes(b) => Value::Str(String::from_utf8_lossy(&b).into_owned()),
        Py::List(items) | Py::Tuple(items) | Py::Set(items) => {
            let seq = Value::Seq(items.into_iter().map(convert).collect::<Option<_>>()?);
            match Array::from_tagged(&seq) {
                Some(array) => Value::Array(array),
                None => seq,
            }
        },
        Py::Dict(pairs) => Value::Dict(pairs.into_iter()
            .map(|(k, v)| match k {
                Py::String(k) => Some((k, convert(v)?)),
                _ => None,
            })
            .collect::<Option<_>>()?),
        Py::Complex(_) => return None,
    })
}

fn integer(i: &BigInt) -> Option<Value> {
    match i64::try_from(i) {
        Ok(i) => Some(Value::Int(i)),
        Err(_) => i.to_string().parse().ok().map(Value::Float),
    }
}

/// INI text, one `key = value` line per option.
impl fmt::Display for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut ini = Ini::new();
        for (section, options) in &self.sections {
            let mut setter = ini.with_section(Some(section.as_str()));
            for (key, value) in options {
                // continuation lines are indented
                setter.set(key.as_str(), value.replace('\n', "\n\t"));
            }
        }
        let opt = WriteOption {
            escape_policy: EscapePolicy::Nothing,
            kv_separator: " = ",
            ..WriteOption::default()
        };
        let mut buf = Vec::new();
        ini.write_to_opt(&mut buf, opt).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Parse INI text into a configuration without defaults.
impl FromStr for UserConfig {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut conf = UserConfig::default();
        conf.merge_str(text)?;
        Ok(conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn window_defaults() -> Defaults {
        let mut window = IndexMap::new();
        window.insert("width".to_string(), Value::Int(640));
        window.insert("ratio".to_string(), Value::Float(1.5));
        window.insert("maximized".to_string(), Value::Bool(false));
        window.insert("title".to_string(), Value::from("Main"));
        window.insert("recent".to_string(), Value::Seq(vec![]));
        let mut defaults = Defaults::new();
        defaults.insert("window".to_string(), window);
        defaults
    }

    #[test]
    fn defaults_are_stored() -> TestResult {
        let conf = UserConfig::new(window_defaults())?;
        assert!(conf.has_section(MAIN_SECTION));
        assert_eq!(conf.get_raw("window", "maximized"), Some("False"));
        assert_eq!(conf.get_raw("window", "title"), Some("Main"));
        assert_eq!(conf.get("window", "ratio")?, Value::Float(1.5));
        assert_eq!(conf.get("window", "recent")?, Value::Seq(vec![]));
        Ok(())
    }

    #[test]
    fn set_converts_to_default_kind() -> TestResult {
        let mut conf = UserConfig::new(window_defaults())?;
        conf.set("window", "maximized", 1)?;
        conf.set("window", "ratio", 2)?;
        conf.set("window", "recent", vec![Value::from("a.txt")])?;
        assert_eq!(conf.get_raw("window", "maximized"), Some("True"));
        assert_eq!(conf.get("window", "ratio")?, Value::Float(2.0));
        assert_eq!(conf.get_raw("window", "recent"), Some("['a.txt']"));
        assert!(conf.set("window", "width", "wide").is_err());
        Ok(())
    }

    #[test]
    fn missing_option() {
        let conf = UserConfig::default();
        let err = conf.get("window", "width").unwrap_err();
        assert!(err.is_missing_key());
    }

    #[test]
    fn get_or_registers_default() -> TestResult {
        let mut conf = UserConfig::default();
        assert_eq!(conf.get_or("plot", "grid", true)?, Value::Bool(true));
        assert_eq!(conf.get_default("plot", "grid"), Some(&Value::Bool(true)));
        assert_eq!(conf.version()?, "0.0.0");
        Ok(())
    }

    #[test]
    fn undecodable_text_reads_raw() -> TestResult {
        let conf: UserConfig = "[paths]\nhome = /tmp/data\ncount = 3\n".parse()?;
        assert_eq!(conf.get("paths", "home")?, Value::from("/tmp/data"));
        assert_eq!(conf.get("paths", "count")?, Value::Int(3));
        Ok(())
    }

    #[test]
    fn arrays_are_tagged_lists() -> TestResult {
        let mut conf = UserConfig::default();
        conf.set("data", "xs", Array::from_f64(vec![1.0, 2.5]))?;
        assert_eq!(conf.get_raw("data", "xs"), Some("['array', [1.0, 2.5], 'float64']"));
        assert_eq!(conf.get("data", "xs")?, Value::Array(Array::from_f64(vec![1.0, 2.5])));
        Ok(())
    }

    #[test]
    fn text_roundtrip() -> TestResult {
        let mut conf = UserConfig::new(window_defaults())?;
        conf.set("window", "width", 1024)?;
        let text = conf.to_string();
        assert!(text.contains("[window]"));
        assert!(text.contains("width = 1024"));

        let back: UserConfig = text.parse()?;
        assert_eq!(back.get_raw("window", "width"), Some("1024"));
        assert_eq!(back.get("window", "maximized")?, Value::Bool(false));
        Ok(())
    }

    #[test]
    fn version_change_resets() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("app").join("app.ini");
        {
            let mut conf = UserConfig::new(window_defaults())?;
            conf.set_application(&path, "1.0.0")?;
            conf.set("window", "width", 1024)?;
            conf.set("old", "flag", true)?;
            conf.save(&path)?;
        }
        let mut same = UserConfig::new(window_defaults())?;
        same.set_application(&path, "1.0.0")?;
        assert_eq!(same.get("window", "width")?, Value::Int(1024));

        let mut newer = UserConfig::new(window_defaults())?;
        newer.set_application(&path, "1.1.0")?;
        assert_eq!(newer.get("window", "width")?, Value::Int(640));
        assert!(!newer.has_section("old"));
        assert_eq!(newer.version()?, "1.1.0");

        assert!(UserConfig::default().set_application(&path, "one").is_err());
        Ok(())
    }

    #[test]
    fn option_prefix() -> TestResult {
        let mut conf = UserConfig::default();
        conf.set("s", "opt/a", 1)?;
        assert!(conf.has_option_prefix("s", "opt"));
        assert!(!conf.has_option_prefix("s", "op"));
        assert!(!conf.has_option_prefix("s", "opt/a"));
        Ok(())
    }
}
