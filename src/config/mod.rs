//! Crawler configuration.
//!
//! `Config` is an INI-style configuration store in the ConfigParser mold:
//! `[section]` headers, `option = value` (or `option: value`) assignments,
//! a `DEFAULT` section consulted as a fallback by every lookup, and `#`/`;`
//! comments. On top of the raw store it adds:
//!
//! - typed accessors: durations like `10 sec` / `2hr` / `7 minutes` come
//!   back as seconds, sizes like `20kb` / `5 Gib` as byte counts, and
//!   booleans that read as `false` instead of erroring when absent;
//! - sensitivity to updates of the backing file (`changed`);
//! - quiet-time evaluation over the `crawler.quiet_time` option, with the
//!   parsed window set cached and atomically swapped when the option text
//!   changes.

pub mod quiet;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, RwLock};
use std::time::SystemTime;

use log::debug;
use regex::Regex;

use crate::error_handling::ConfigError;
use crate::util;

pub use quiet::{QuietWindowSet, WindowRule, WindowSpec};

/// Placeholder used in error text before a config has been read from disk.
const NO_FILE: &str = "<???>";

static TIME_SPEC_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)\s*(\w*)").expect("valid time spec regex"));

type SectionMap = BTreeMap<String, BTreeMap<String, String>>;

/// An INI-style configuration store with typed accessors and quiet-time
/// window evaluation.
#[derive(Debug, Default)]
pub struct Config {
    defaults: BTreeMap<String, String>,
    sections: SectionMap,
    filename: Option<PathBuf>,
    loadtime: Option<SystemTime>,
    qt_cache: RwLock<Option<Arc<QuietWindowSet>>>,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    /// Build a config from nested `(section, [(option, value)])` pairs.
    /// Option names are lower-cased, as the file reader would do.
    pub fn from_dict<S, O, V, I, J>(dict: I) -> Self
    where
        I: IntoIterator<Item = (S, J)>,
        J: IntoIterator<Item = (O, V)>,
        S: Into<String>,
        O: Into<String>,
        V: Into<String>,
    {
        let mut cfg = Config::new();
        for (section, options) in dict {
            let section = section.into();
            for (option, value) in options {
                cfg.set(&section, &option.into(), value.into());
            }
        }
        cfg
    }

    /// Parse INI text into this config, replacing nothing that is not
    /// mentioned. *filename* is only used in error messages.
    pub fn load_str(&mut self, text: &str, filename: &str) -> Result<(), ConfigError> {
        let mut current: Option<String> = None;
        let mut last_option: Option<String> = None;
        for (lineno, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim_end();
            let stripped = line.trim_start();
            if stripped.is_empty() || stripped.starts_with('#') || stripped.starts_with(';') {
                continue;
            }

            if stripped.starts_with('[') {
                let name = stripped
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .ok_or_else(|| ConfigError::Parse {
                        filename: filename.to_string(),
                        line: lineno + 1,
                        msg: format!("malformed section header '{stripped}'"),
                    })?;
                current = Some(name.trim().to_string());
                last_option = None;
                continue;
            }

            // continuation line: indented text extends the previous value
            if line.starts_with(char::is_whitespace) {
                if let (Some(section), Some(option)) = (&current, &last_option) {
                    let section = section.clone();
                    let option = option.clone();
                    if let Some(value) = self.lookup_mut(&section, &option) {
                        value.push(' ');
                        value.push_str(stripped);
                        continue;
                    }
                }
                return Err(ConfigError::Parse {
                    filename: filename.to_string(),
                    line: lineno + 1,
                    msg: format!("continuation line without a preceding option: '{stripped}'"),
                });
            }

            let (option, value) = split_assignment(stripped).ok_or_else(|| ConfigError::Parse {
                filename: filename.to_string(),
                line: lineno + 1,
                msg: format!("line contains no '=' or ':' delimiter: '{stripped}'"),
            })?;
            let section = current.clone().ok_or_else(|| ConfigError::Parse {
                filename: filename.to_string(),
                line: lineno + 1,
                msg: format!("assignment before any section header: '{stripped}'"),
            })?;
            let option = option.to_lowercase();
            self.set(&section, &option, value.to_string());
            last_option = Some(option);
        }
        Ok(())
    }

    /// Read a configuration file, recording the file name and load time so
    /// `changed()` can notice later updates.
    pub fn read<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            filename: path.display().to_string(),
            detail: e.to_string(),
        })?;
        self.load_str(&text, &path.display().to_string())?;
        self.filename = Some(path.to_path_buf());
        self.loadtime = Some(SystemTime::now());
        debug!("loaded configuration from {}", path.display());
        Ok(())
    }

    /// True when the file this config was loaded from has been modified
    /// since load time. A config never read from a file reports false.
    pub fn changed(&self) -> bool {
        let (Some(path), Some(loadtime)) = (&self.filename, self.loadtime) else {
            return false;
        };
        match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime > loadtime,
            Err(_) => false,
        }
    }

    /// The path this config was read from, or `<???>` if none.
    pub fn filename(&self) -> String {
        self.filename
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| NO_FILE.to_string())
    }

    pub fn set(&mut self, section: &str, option: &str, value: String) {
        let option = option.to_lowercase();
        if section.eq_ignore_ascii_case("DEFAULT") {
            self.defaults.insert(option, value);
        } else {
            self.sections
                .entry(section.to_string())
                .or_default()
                .insert(option, value);
        }
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn has_option(&self, section: &str, option: &str) -> bool {
        self.get(section, option).is_ok()
    }

    /// Section names, excluding DEFAULT.
    pub fn sections(&self) -> Vec<&str> {
        self.sections.keys().map(String::as_str).collect()
    }

    /// Option names defined in *section*, including inherited defaults.
    pub fn options(&self, section: &str) -> Result<Vec<&str>, ConfigError> {
        let sect = self
            .sections
            .get(section)
            .ok_or_else(|| self.no_section(section))?;
        let mut names: Vec<&str> = sect
            .keys()
            .chain(self.defaults.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        Ok(names)
    }

    /// Look up an option, falling back to the DEFAULT section.
    pub fn get(&self, section: &str, option: &str) -> Result<&str, ConfigError> {
        let sect = self
            .sections
            .get(section)
            .ok_or_else(|| self.no_section(section))?;
        let option_lc = option.to_lowercase();
        sect.get(&option_lc)
            .or_else(|| self.defaults.get(&option_lc))
            .map(String::as_str)
            .ok_or_else(|| ConfigError::NoOption {
                section: section.to_string(),
                option: option.to_string(),
                filename: self.filename(),
            })
    }

    /// Like `get`, but a missing section or option yields *default*.
    pub fn get_d<'a>(&'a self, section: &str, option: &str, default: &'a str) -> &'a str {
        self.get(section, option).unwrap_or(default)
    }

    /// Retrieve an option as a boolean. Missing sections, missing options,
    /// and unparsable values all read as false.
    pub fn getboolean(&self, section: &str, option: &str) -> bool {
        match self.get(section, option) {
            Ok(value) => matches!(value.to_lowercase().as_str(), "1" | "yes" | "true" | "on"),
            Err(_) => false,
        }
    }

    /// Retrieve a duration option like `10 seconds`, `2hr` or `7 minutes`
    /// as a number of seconds.
    pub fn get_time(&self, section: &str, option: &str) -> Result<i64, ConfigError> {
        let spec = self.get(section, option)?;
        to_seconds(spec)
    }

    /// Like `get_time`, but a missing section or option yields *default*.
    /// A malformed value still errors.
    pub fn get_time_d(
        &self,
        section: &str,
        option: &str,
        default: i64,
    ) -> Result<i64, ConfigError> {
        match self.get(section, option) {
            Ok(spec) => to_seconds(spec),
            Err(_) => Ok(default),
        }
    }

    /// Retrieve a size option like `10mb` or `2 GiB` as a number of bytes.
    pub fn get_size(&self, section: &str, option: &str) -> Result<u64, ConfigError> {
        let spec = self.get(section, option)?;
        Ok(util::scale(spec, 1000))
    }

    /// Like `get_size`, but a missing section or option yields *default*.
    pub fn get_size_d(&self, section: &str, option: &str, default: u64) -> u64 {
        match self.get(section, option) {
            Ok(spec) => util::scale(spec, 1000),
            Err(_) => default,
        }
    }

    /// Render the config as INI text. The DEFAULT section is included only
    /// when *with_defaults* is set.
    pub fn dump(&self, with_defaults: bool) -> String {
        let mut out = String::new();
        if with_defaults && !self.defaults.is_empty() {
            out.push_str("[DEFAULT]\n");
            for (option, value) in &self.defaults {
                out.push_str(&format!("{option} = {value}\n"));
            }
        }
        for (section, options) in &self.sections {
            out.push_str(&format!("\n[{section}]\n"));
            for (option, value) in options {
                out.push_str(&format!("{option} = {value}\n"));
            }
        }
        out
    }

    /// True when *when* (epoch seconds) falls inside a configured quiet
    /// window. A missing `crawler.quiet_time` option means no windows are
    /// configured and nothing is ever quiet; a malformed one is an error.
    pub fn quiet_time(&self, when: i64) -> Result<bool, ConfigError> {
        let spec = match self.get("crawler", "quiet_time") {
            Ok(spec) => spec.to_string(),
            Err(ConfigError::NoSection { .. }) | Err(ConfigError::NoOption { .. }) => {
                return Ok(false)
            }
            Err(other) => return Err(other),
        };
        Ok(self.quiet_windows(&spec)?.is_quiet(when))
    }

    /// The current quiet window set, rebuilt only when the option text has
    /// changed since the last build. Readers holding the previous `Arc`
    /// keep a consistent view while a rebuild swaps in the new set.
    fn quiet_windows(&self, spec: &str) -> Result<Arc<QuietWindowSet>, ConfigError> {
        {
            let cache = self.qt_cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.as_ref() {
                if cached.source() == spec {
                    return Ok(Arc::clone(cached));
                }
            }
        }
        let fresh = Arc::new(QuietWindowSet::build(spec)?);
        let mut cache = self.qt_cache.write().unwrap_or_else(|e| e.into_inner());
        *cache = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    fn lookup_mut(&mut self, section: &str, option: &str) -> Option<&mut String> {
        if section.eq_ignore_ascii_case("DEFAULT") {
            self.defaults.get_mut(option)
        } else {
            self.sections.get_mut(section)?.get_mut(option)
        }
    }

    fn no_section(&self, section: &str) -> ConfigError {
        ConfigError::NoSection {
            section: section.to_string(),
            filename: self.filename(),
        }
    }
}

/// Convert a duration spec like `10min` to seconds.
pub fn to_seconds(spec: &str) -> Result<i64, ConfigError> {
    let trimmed = spec.trim();
    if !trimmed.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(ConfigError::InvalidTimeMagnitude(spec.to_string()));
    }
    let caps = TIME_SPEC_RX
        .captures(trimmed)
        .ok_or_else(|| ConfigError::InvalidTimeMagnitude(spec.to_string()))?;
    let mag: f64 = caps[1]
        .parse()
        .map_err(|_| ConfigError::InvalidTimeMagnitude(spec.to_string()))?;
    let mult = map_time_unit(&caps[2])?;
    Ok((mag * mult as f64) as i64)
}

/// Map a duration unit to a number of seconds: `1s` is 1, `1 min` is 60,
/// `2 days` is 172800, and so on. An empty unit means seconds.
pub fn map_time_unit(unit: &str) -> Result<i64, ConfigError> {
    let mult = match unit.to_lowercase().as_str() {
        "" | "s" | "sec" | "second" | "seconds" => 1,
        "m" | "min" | "minute" | "minutes" => 60,
        "h" | "hr" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => util::DAY,
        "w" | "week" | "weeks" => util::WEEK,
        "month" | "months" => 30 * util::DAY,
        "y" | "year" | "years" => 365 * util::DAY,
        _ => return Err(ConfigError::InvalidTimeUnit(unit.to_string())),
    };
    Ok(mult)
}

fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let eq = line.find('=');
    let colon = line.find(':');
    let pos = match (eq, colon) {
        (Some(e), Some(c)) => e.min(c),
        (Some(e), None) => e,
        (None, Some(c)) => c,
        (None, None) => return None,
    };
    let (option, rest) = line.split_at(pos);
    Some((option.trim(), rest[1..].trim()))
}
