use crate::core::db::Driver;
use crate::core::{EtlError, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Configuration file picked up from the working directory when no explicit
/// path is given.
pub const DEFAULT_CONFIG_FILE: &str = "roomstat.toml";

/// dotenv-style file read from the working directory when present. Its
/// values sit below the TOML file and the environment.
pub const ENV_FILE: &str = "config.env";

/// Keys recognised in the configuration mapping.
pub const CONFIG_KEYS: [&str; 6] = [
    "DB_DRIVER",
    "DB_USERNAME",
    "DB_PASSWORD",
    "DB_HOST",
    "DB_PORT",
    "DB_DATABASE",
];

/// Connection parameters for a single run.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub driver: Driver,
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Database name for PostgreSQL, file path (or `:memory:`) for SQLite.
    pub database: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("driver", &self.driver)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

impl Credentials {
    /// Builds credentials from a `DB_*` key/value mapping.
    ///
    /// SQLite only needs `DB_DATABASE`; PostgreSQL needs every key except
    /// `DB_DRIVER`, which defaults to `postgres`.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let driver = match map.get("DB_DRIVER") {
            Some(name) => name.parse::<Driver>()?,
            None => Driver::Postgres,
        };
        let database = required(map, "DB_DATABASE")?;

        if driver == Driver::Sqlite {
            return Ok(Credentials {
                driver,
                username: String::new(),
                password: String::new(),
                host: String::new(),
                port: 0,
                database,
            });
        }

        let port_text = required(map, "DB_PORT")?;
        let port = port_text.trim().parse::<u16>().map_err(|_| {
            EtlError::Config(format!("DB_PORT must be a port number, got '{}'", port_text))
        })?;

        Ok(Credentials {
            driver,
            username: required(map, "DB_USERNAME")?,
            password: map.get("DB_PASSWORD").cloned().unwrap_or_default(),
            host: required(map, "DB_HOST")?,
            port,
            database,
        })
    }
}

fn required(map: &HashMap<String, String>, key: &str) -> Result<String> {
    match map.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(EtlError::Config(format!("{} is not set", key))),
    }
}

/// Reads the top-level scalar entries of a TOML file into a string mapping.
///
/// # Example
///
/// ```toml
/// DB_USERNAME = "postgres"
/// DB_PORT = 5432
/// ```
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| EtlError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    parse_config(&content)
        .map_err(|e| EtlError::Config(format!("cannot parse {}: {}", path.display(), e)))
}

fn parse_config(content: &str) -> std::result::Result<HashMap<String, String>, String> {
    let table: toml::value::Table = toml::from_str(content).map_err(|e| e.to_string())?;
    let mut map = HashMap::new();
    for (key, value) in table {
        let text = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            // Tables and arrays carry nothing we understand.
            _ => continue,
        };
        map.insert(key, text);
    }
    Ok(map)
}

/// Reads `KEY=value` lines from a dotenv-style file.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let entries = dotenvy::from_path_iter(path)
        .map_err(|e| EtlError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    entries
        .map(|entry| {
            entry.map_err(|e| EtlError::Config(format!("cannot parse {}: {}", path.display(), e)))
        })
        .collect()
}

/// Assembles the configuration mapping: [`ENV_FILE`] if present, then the
/// TOML file, then any `DB_*` environment variables on top.
///
/// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] is read
/// only if present.
pub fn load(path: Option<&Path>) -> Result<HashMap<String, String>> {
    load_layers(Path::new(ENV_FILE), path, Path::new(DEFAULT_CONFIG_FILE), std::env::vars())
}

fn load_layers<I>(
    env_file: &Path,
    path: Option<&Path>,
    default_file: &Path,
    vars: I,
) -> Result<HashMap<String, String>>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut map = if env_file.exists() {
        load_env_file(env_file)?
    } else {
        HashMap::new()
    };
    match path {
        Some(p) => map.extend(load_config_file(p)?),
        None if default_file.exists() => map.extend(load_config_file(default_file)?),
        None => {}
    }
    overlay_env(&mut map, vars);
    Ok(map)
}

fn overlay_env<I>(map: &mut HashMap<String, String>, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        if CONFIG_KEYS.contains(&key.as_str()) {
            map.insert(key, value);
        }
    }
}
