//! Environment-driven settings, resolved once before the boot sequence runs.
//!
//! Parsing is centralised here so every knob is validated the same way and
//! can be tested in isolation. Debug builds tolerate sloppy values and fall
//! back to defaults with a warning; release builds reject them outright.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use actix_web::cookie::Key;
use mockable::Env;
use tracing::warn;
use zeroize::Zeroize;

const PORT_ENV: &str = "PORT";
const BODY_SIZE_LIMIT_ENV: &str = "API_BODY_SIZE_LIMIT";
const PARAMETER_LIMIT_ENV: &str = "API_PARAMETER_LIMIT";
const ENVIRONMENT_ENV: &str = "APP_ENV";
const TESTING_ENV: &str = "APP_TESTING";
const CRASH_TOKEN_ENV: &str = "CRASH_REPORT_TOKEN";
const CRASH_ENVIRONMENT_ENV: &str = "CRASH_REPORT_ENVIRONMENT";
const KEY_FILE_ENV: &str = "SESSION_KEY_FILE";
const DATABASE_URL_ENV: &str = "DATABASE_URL";
const DB_POOL_SIZE_ENV: &str = "DB_POOL_SIZE";
const DB_POOL_TIMEOUT_ENV: &str = "DB_POOL_TIMEOUT_SECS";
const VIEWS_GLOB_ENV: &str = "VIEWS_GLOB";
const DOCS_DIR_ENV: &str = "DOCS_DIR";
const PUBLIC_DIR_ENV: &str = "PUBLIC_DIR";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BODY_SIZE_LIMIT: usize = 10 * 1024 * 1024;
const DEFAULT_PARAMETER_LIMIT: usize = 10_000;
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_DB_POOL_SIZE: u32 = 10;
const DEFAULT_DB_POOL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_VIEWS_GLOB: &str = "views/**/*.html";
const DEFAULT_DOCS_DIR: &str = "docs";
const DEFAULT_PUBLIC_DIR: &str = "public";
const SESSION_KEY_DEFAULT_PATH: &str = "/var/run/secrets/session_key";
const SESSION_KEY_MIN_LEN: usize = 64;
const BOOL_EXPECTED: &str = "1|0|true|false|yes|no|y|n";

/// Build mode for settings validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    /// Debug builds tolerate invalid values and fall back with warnings.
    Debug,
    /// Release builds require valid values wherever one is supplied.
    Release,
}

impl BuildMode {
    /// Determine the build mode from `cfg!(debug_assertions)`.
    #[must_use]
    pub fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }

    fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

/// Everything the boot sequence needs, resolved from the environment.
#[derive(Clone)]
pub struct Settings {
    /// TCP port the listener binds.
    pub port: u16,
    /// Maximum accepted request body, in bytes.
    pub body_size_limit: usize,
    /// Maximum number of body parameters accepted per request.
    pub parameter_limit: usize,
    /// Deployment environment label, e.g. `development` or `production`.
    pub environment: String,
    /// Testing mode skips the migration check and disables access logging.
    pub testing: bool,
    /// Crash-reporting DSN; reporting stays dormant when absent.
    pub crash_token: Option<String>,
    /// Environment label sent with crash reports; falls back to `environment`.
    pub crash_environment: Option<String>,
    /// Signing key for the session cookie.
    pub session_key: Key,
    /// PostgreSQL connection string; fixtures serve lookups when absent.
    pub database_url: Option<String>,
    /// Connection cap for the database pool.
    pub db_pool_size: u32,
    /// Deadline for checking a connection out of the pool.
    pub db_pool_timeout: Duration,
    /// Glob the view engine loads templates from.
    pub views_glob: String,
    /// Directory served under `/docs`.
    pub docs_dir: PathBuf,
    /// Directory served at the root for unmatched paths.
    pub public_dir: PathBuf,
}

// The session key is secret material and exposes no `Debug` of its own.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings").finish_non_exhaustive()
    }
}

/// Errors raised while resolving settings.
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    /// A variable is present but contains an invalid value.
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    InvalidEnv {
        /// Environment variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
        /// Description of acceptable values.
        expected: &'static str,
    },
    /// Reading the session key file failed.
    #[error("failed to read session key at {path}: {source}")]
    KeyRead {
        /// Path the key was expected at.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// The session key file exists but is too short for release builds.
    #[error("session key at {path} too short: need >= {min_len} bytes, got {length}")]
    KeyTooShort {
        /// Path the key was read from.
        path: PathBuf,
        /// Bytes actually read.
        length: usize,
        /// Minimum acceptable length.
        min_len: usize,
    },
}

/// Resolve the full settings snapshot from environment variables.
pub fn settings_from_env<E: Env>(env: &E, mode: BuildMode) -> Result<Settings, SettingsError> {
    let testing = bool_from_env(env, TESTING_ENV, false, mode)?;
    let session_key = session_key_from_env(env, mode, testing)?;

    Ok(Settings {
        port: numeric_from_env(env, PORT_ENV, DEFAULT_PORT, "a TCP port number", mode)?,
        body_size_limit: numeric_from_env(
            env,
            BODY_SIZE_LIMIT_ENV,
            DEFAULT_BODY_SIZE_LIMIT,
            "a byte count",
            mode,
        )?,
        parameter_limit: numeric_from_env(
            env,
            PARAMETER_LIMIT_ENV,
            DEFAULT_PARAMETER_LIMIT,
            "a parameter count",
            mode,
        )?,
        environment: env
            .string(ENVIRONMENT_ENV)
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
        testing,
        crash_token: env.string(CRASH_TOKEN_ENV).filter(|t| !t.is_empty()),
        crash_environment: env.string(CRASH_ENVIRONMENT_ENV),
        session_key,
        database_url: env.string(DATABASE_URL_ENV),
        db_pool_size: numeric_from_env(
            env,
            DB_POOL_SIZE_ENV,
            DEFAULT_DB_POOL_SIZE,
            "a connection count",
            mode,
        )?,
        db_pool_timeout: Duration::from_secs(numeric_from_env(
            env,
            DB_POOL_TIMEOUT_ENV,
            DEFAULT_DB_POOL_TIMEOUT_SECS,
            "a number of seconds",
            mode,
        )?),
        views_glob: env
            .string(VIEWS_GLOB_ENV)
            .unwrap_or_else(|| DEFAULT_VIEWS_GLOB.to_string()),
        docs_dir: dir_from_env(env, DOCS_DIR_ENV, DEFAULT_DOCS_DIR),
        public_dir: dir_from_env(env, PUBLIC_DIR_ENV, DEFAULT_PUBLIC_DIR),
    })
}

fn numeric_from_env<E: Env, T: FromStr + Copy>(
    env: &E,
    name: &'static str,
    default: T,
    expected: &'static str,
    mode: BuildMode,
) -> Result<T, SettingsError> {
    let Some(value) = env.string(name) else {
        return Ok(default);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(_) => {
            if mode.is_debug() {
                warn!(name, value = %value, "invalid numeric setting; using default");
                Ok(default)
            } else {
                Err(SettingsError::InvalidEnv {
                    name,
                    value,
                    expected,
                })
            }
        }
    }
}

fn bool_from_env<E: Env>(
    env: &E,
    name: &'static str,
    default: bool,
    mode: BuildMode,
) -> Result<bool, SettingsError> {
    let Some(value) = env.string(name) else {
        return Ok(default);
    };
    match parse_bool(&value) {
        Some(flag) => Ok(flag),
        None => {
            if mode.is_debug() {
                warn!(name, value = %value, "invalid boolean setting; using default");
                Ok(default)
            } else {
                Err(SettingsError::InvalidEnv {
                    name,
                    value,
                    expected: BOOL_EXPECTED,
                })
            }
        }
    }
}

fn dir_from_env<E: Env>(env: &E, name: &'static str, default: &str) -> PathBuf {
    env.string(name).map_or_else(|| PathBuf::from(default), PathBuf::from)
}

fn session_key_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
    testing: bool,
) -> Result<Key, SettingsError> {
    let path = PathBuf::from(
        env.string(KEY_FILE_ENV)
            .unwrap_or_else(|| SESSION_KEY_DEFAULT_PATH.to_string()),
    );
    let fallback_allowed = mode.is_debug() || testing;

    let mut bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(source) if fallback_allowed => {
            warn!(
                path = %path.display(),
                error = %source,
                "using temporary session key (dev only)"
            );
            return Ok(Key::generate());
        }
        Err(source) => return Err(SettingsError::KeyRead { path, source }),
    };

    // Key::derive_from rejects anything shorter than the minimum.
    if bytes.len() < SESSION_KEY_MIN_LEN {
        let length = bytes.len();
        bytes.zeroize();
        if fallback_allowed {
            warn!(
                path = %path.display(),
                length,
                "session key too short; using temporary key (dev only)"
            );
            return Ok(Key::generate());
        }
        return Err(SettingsError::KeyTooShort {
            path,
            length,
            min_len: SESSION_KEY_MIN_LEN,
        });
    }

    let key = Key::derive_from(&bytes);
    bytes.zeroize();
    Ok(key)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}
