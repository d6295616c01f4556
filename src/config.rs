//! Process-wide settings for the request pipeline.
//!
//! Built once at startup and shared read-only by every connection. Three keys
//! are recognised:
//!
//! | Key | Environment | Default |
//! |---|---|---|
//! | `shape.cors.enable` | `SHAPE_CORS_ENABLE` | `false` |
//! | `shape.except.login.urls` | `SHAPE_EXCEPT_LOGIN_URLS` | empty |
//! | `shape.except.cors.urls` | `SHAPE_EXCEPT_CORS_URLS` | empty |
//!
//! Loading goes through the `config` crate: a TOML file, the environment, or
//! explicit key/value pairs. Environment values win over the file.
//!
//! ```rust
//! use shape_web::Config;
//!
//! let config = Config::parse_toml(r#"
//!     [shape]
//!     cors.enable = true
//!     except.login.urls = "/health, /login"
//! "#).unwrap();
//!
//! assert!(config.enable_cors);
//! assert!(config.exclude_login_paths.matches("/login"));
//! assert!(config.exclude_cors_paths.is_empty());
//! ```

use std::ffi::OsString;
use std::path::Path;

use config::{ConfigError, Environment, File, FileFormat, Map};
use serde::{Deserialize, Deserializer};

use crate::error::Error;

pub const CORS_ENABLE: &str = "shape.cors.enable";
pub const EXCEPT_LOGIN_URLS: &str = "shape.except.login.urls";
pub const EXCEPT_CORS_URLS: &str = "shape.except.cors.urls";

const ENV_PREFIX: &str = "SHAPE";
const URL_SEPARATOR: char = ',';

/// Immutable pipeline configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(from = "Settings")]
pub struct Config {
    /// Runs the CORS stage when set.
    pub enable_cors: bool,
    /// Paths the login interceptor never sees.
    pub exclude_login_paths: ExcludePaths,
    /// Paths the CORS interceptor never sees.
    pub exclude_cors_paths: ExcludePaths,
}

// Key layout of the `shape.*` tree.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    shape: ShapeSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShapeSection {
    cors: CorsSection,
    except: ExceptSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CorsSection {
    enable: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExceptSection {
    login: UrlsSection,
    cors: UrlsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UrlsSection {
    urls: ExcludePaths,
}

impl From<Settings> for Config {
    fn from(s: Settings) -> Self {
        Self {
            enable_cors: s.shape.cors.enable,
            exclude_login_paths: s.shape.except.login.urls,
            exclude_cors_paths: s.shape.except.cors.urls,
        }
    }
}

impl Config {
    /// Builds a config from `key = value` pairs. Unknown keys are ignored;
    /// missing keys keep their defaults.
    pub fn from_properties<I, K, V>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(key.as_ref().trim(), value.as_ref().trim())?;
        }
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Parses TOML text with a `[shape]` table.
    pub fn parse_toml(text: &str) -> Result<Self, Error> {
        let settings = config::Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Reads `SHAPE_CORS_ENABLE`, `SHAPE_EXCEPT_LOGIN_URLS` and
    /// `SHAPE_EXCEPT_CORS_URLS` from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        let settings = config::Config::builder().add_source(environment()?).build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Reads a TOML file, then lets the environment override it. A missing
    /// file is not an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using environment and defaults");
        }
        let settings = config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(environment()?)
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// `SHAPE_CORS_ENABLE` → `shape.cors.enable`.
fn environment() -> Result<Environment, ConfigError> {
    environment_from(std::env::vars_os())
}

/// The variables are collected here rather than by the `config` crate so a
/// `SHAPE_*` value that is not UTF-8 is reported instead of skipped.
fn environment_from<I>(vars: I) -> Result<Environment, ConfigError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let prefix = format!("{ENV_PREFIX}_");
    let mut source = Map::new();
    for (name, value) in vars {
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(&prefix) {
            continue;
        }
        let value = value.into_string().map_err(|_| {
            ConfigError::Message(format!("environment variable `{name}` is not valid UTF-8"))
        })?;
        source.insert(name.to_owned(), value);
    }

    Ok(Environment::with_prefix(ENV_PREFIX)
        .separator("_")
        .keep_prefix(true)
        .source(Some(source)))
}

// ── ExcludePaths ──────────────────────────────────────────────────────────────

/// A set of path patterns a stage skips.
///
/// Patterns are exact paths, except that a trailing `/**` matches the prefix
/// itself and anything below it: `/static/**` covers `/static` and
/// `/static/css/app.css` but not `/staticfiles`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExcludePaths {
    patterns: Vec<String>,
}

impl ExcludePaths {
    /// Splits a comma-separated list. Blank input yields the empty set, which
    /// excludes nothing.
    pub fn parse(raw: &str) -> Self {
        raw.split(URL_SEPARATOR).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern.strip_suffix("/**") {
            Some(prefix) => {
                path == prefix
                    || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
            }
            None => pattern == path,
        })
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExcludePaths {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let patterns = iter
            .into_iter()
            .map(|p| p.as_ref().trim().to_owned())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }
}

/// Accepts a comma-joined string or a list of strings.
impl<'de> Deserialize<'de> for ExcludePaths {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Joined(String),
            List(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Joined(s) => Self::parse(&s),
            Raw::List(list) => list.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_list_excludes_nothing() {
        for raw in ["", "   ", ",", " , ,"] {
            let paths = ExcludePaths::parse(raw);
            assert!(paths.is_empty(), "{raw:?}");
            assert!(!paths.matches("/"));
            assert!(!paths.matches(""));
        }
    }

    #[test]
    fn entries_are_trimmed_and_exact() {
        let paths = ExcludePaths::parse(" /login , /health,/api/public ");
        assert_eq!(paths.patterns(), ["/login", "/health", "/api/public"]);
        assert!(paths.matches("/login"));
        assert!(paths.matches("/api/public"));
        assert!(!paths.matches("/login/extra"));
        assert!(!paths.matches("/api"));
    }

    #[test]
    fn double_star_matches_prefix_and_descendants() {
        let paths = ExcludePaths::parse("/static/**");
        assert!(paths.matches("/static"));
        assert!(paths.matches("/static/css/app.css"));
        assert!(!paths.matches("/staticfiles"));
        assert!(!paths.matches("/"));
    }

    #[test]
    fn defaults_when_nothing_configured() {
        let config = Config::from_properties(Vec::<(&str, &str)>::new()).unwrap();
        assert!(!config.enable_cors);
        assert!(config.exclude_login_paths.is_empty());
        assert!(config.exclude_cors_paths.is_empty());
    }

    #[test]
    fn pairs_are_applied_and_unknown_keys_ignored() {
        let config = Config::from_properties([
            (CORS_ENABLE, " TRUE "),
            (EXCEPT_LOGIN_URLS, "/health,/login"),
            (EXCEPT_CORS_URLS, ""),
            ("server.port", "8080"),
        ])
        .unwrap();

        assert!(config.enable_cors);
        assert_eq!(config.exclude_login_paths.patterns(), ["/health", "/login"]);
        assert!(config.exclude_cors_paths.is_empty());
    }

    #[test]
    fn toml_accepts_string_or_list() {
        let config = Config::parse_toml(
            r#"
            [shape.except.login]
            urls = ["/health", " /login ", ""]

            [shape.except.cors]
            urls = "/static/**"
            "#,
        )
        .unwrap();

        assert!(!config.enable_cors);
        assert_eq!(config.exclude_login_paths.patterns(), ["/health", "/login"]);
        assert!(config.exclude_cors_paths.matches("/static/app.js"));
    }

    #[test]
    fn bad_bool_is_a_config_error() {
        let err = Config::from_properties([(CORS_ENABLE, "maybe")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");
    }

    fn env(pairs: &[(&str, &str)]) -> Vec<(OsString, OsString)> {
        pairs.iter().map(|(k, v)| (OsString::from(k), OsString::from(v))).collect()
    }

    fn from_vars(vars: Vec<(OsString, OsString)>) -> Result<Config, Error> {
        let settings = config::Config::builder()
            .add_source(environment_from(vars)?)
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    #[test]
    fn environment_names_map_onto_keys() {
        let config = from_vars(env(&[
            ("SHAPE_CORS_ENABLE", "true"),
            ("SHAPE_EXCEPT_LOGIN_URLS", "/health, /login"),
            ("SHAPE_EXCEPT_CORS_URLS", "/internal"),
            ("PATH", "/usr/bin"),
        ]))
        .unwrap();

        assert!(config.enable_cors);
        assert_eq!(config.exclude_login_paths.patterns(), ["/health", "/login"]);
        assert_eq!(config.exclude_cors_paths.patterns(), ["/internal"]);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_environment_value_is_reported() {
        use std::os::unix::ffi::OsStringExt;

        let mut vars = env(&[("SHAPE_CORS_ENABLE", "true")]);
        vars.push((
            OsString::from("SHAPE_EXCEPT_CORS_URLS"),
            OsString::from_vec(b"/a\xff".to_vec()),
        ));

        let err = from_vars(vars).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("SHAPE_EXCEPT_CORS_URLS"), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_values_outside_the_prefix_are_ignored() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![(OsString::from("LANG"), OsString::from_vec(vec![0xff]))];
        let config = from_vars(vars).unwrap();
        assert!(!config.enable_cors);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        assert!(Config::load("/nonexistent/shape-web.toml").is_ok());
    }
}
