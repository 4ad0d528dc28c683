use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_USERS_PROFILE_ID: &str = "ce8bde1e-5b43-4790-943f-aedc076b6574";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid database connection string: {0}")]
    InvalidConnection(#[source] tokio_postgres::Error),
}

/// On-disk shape of `config.toml`. Every key is optional so files can be
/// layered.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub database: Option<DatabaseSection>,
    pub server: Option<ServerSection>,
    pub engine: Option<EngineSection>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct DatabaseSection {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub max_connections: Option<usize>,
    pub idle_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct EngineSection {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub users_profile_id: Option<String>,
}

fn take<T: Clone>(slot: &mut Option<T>, other: &Option<T>) {
    if other.is_some() {
        slot.clone_from(other);
    }
}

impl DatabaseSection {
    fn merge(&mut self, other: &DatabaseSection) {
        take(&mut self.url, &other.url);
        take(&mut self.host, &other.host);
        take(&mut self.port, &other.port);
        take(&mut self.user, &other.user);
        take(&mut self.password, &other.password);
        take(&mut self.name, &other.name);
        take(&mut self.max_connections, &other.max_connections);
        take(&mut self.idle_timeout_secs, &other.idle_timeout_secs);
        take(&mut self.connect_timeout_secs, &other.connect_timeout_secs);
    }
}

impl ServerSection {
    fn merge(&mut self, other: &ServerSection) {
        take(&mut self.bind, &other.bind);
        take(&mut self.port, &other.port);
        take(&mut self.static_dir, &other.static_dir);
    }
}

impl EngineSection {
    fn merge(&mut self, other: &EngineSection) {
        take(&mut self.url, &other.url);
        take(&mut self.timeout_secs, &other.timeout_secs);
        take(&mut self.users_profile_id, &other.users_profile_id);
    }
}

impl ConfigFile {
    /// Merge another file into this one (other takes priority for set fields).
    pub fn merge(&mut self, other: &ConfigFile) {
        if let Some(db) = &other.database {
            self.database.get_or_insert_with(Default::default).merge(db);
        }
        if let Some(server) = &other.server {
            self.server.get_or_insert_with(Default::default).merge(server);
        }
        if let Some(engine) = &other.engine {
            self.engine.get_or_insert_with(Default::default).merge(engine);
        }
    }

    /// Overlay `DB_*`, `PORT`, `BASELINE_ENGINE_URL`, `STATIC_DIR` and
    /// `INDIVIDUAL_USERS_PROFILE_ID` as read through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = self.database.get_or_insert_with(Default::default);
        if let Some(v) = var("DB_HOST") {
            db.host = Some(v);
        }
        if let Some(v) = var("DB_PORT") {
            db.port = Some(parse_num("DB_PORT", &v)?);
        }
        if let Some(v) = var("DB_USER") {
            db.user = Some(v);
        }
        if let Some(v) = var("DB_PASSWORD") {
            db.password = Some(v);
        }
        if let Some(v) = var("DB_NAME") {
            db.name = Some(v);
        }

        let server = self.server.get_or_insert_with(Default::default);
        if let Some(v) = var("PORT") {
            server.port = Some(parse_num("PORT", &v)?);
        }
        if let Some(v) = var("STATIC_DIR") {
            server.static_dir = Some(v);
        }

        let engine = self.engine.get_or_insert_with(Default::default);
        if let Some(v) = var("BASELINE_ENGINE_URL") {
            engine.url = Some(v);
        }
        if let Some(v) = var("INDIVIDUAL_USERS_PROFILE_ID") {
            engine.users_profile_id = Some(v);
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database: DbConfig,
    pub server: ServerConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    /// Full connection string; wins over the discrete fields when set.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
    pub max_connections: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub static_dir: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub url: String,
    pub timeout: Duration,
    pub users_profile_id: String,
}

impl DbConfig {
    pub fn pg_config(&self) -> Result<tokio_postgres::Config, ConfigError> {
        let mut cfg = match &self.url {
            Some(url) => url
                .parse::<tokio_postgres::Config>()
                .map_err(ConfigError::InvalidConnection)?,
            None => {
                let mut cfg = tokio_postgres::Config::new();
                cfg.host(&self.host)
                    .port(self.port)
                    .user(&self.user)
                    .dbname(&self.name);
                if let Some(password) = &self.password {
                    cfg.password(password);
                }
                cfg
            }
        };
        cfg.connect_timeout(self.connect_timeout);
        cfg.application_name("uba-gateway");
        Ok(cfg)
    }

    /// Connection target without credentials, for log lines.
    pub fn describe(&self) -> String {
        match &self.url {
            Some(_) => "connection string from --db".to_string(),
            None => format!("{}@{}:{}/{}", self.user, self.host, self.port, self.name),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let db = file.database.unwrap_or_default();
        let server = file.server.unwrap_or_default();
        let engine = file.engine.unwrap_or_default();
        Config {
            database: DbConfig {
                url: db.url,
                host: db.host.unwrap_or_else(|| "localhost".into()),
                port: db.port.unwrap_or(5432),
                user: db.user.unwrap_or_else(|| "postgres".into()),
                password: db.password,
                name: db.name.unwrap_or_else(|| "uba".into()),
                max_connections: db.max_connections.unwrap_or(20).max(1),
                idle_timeout: Duration::from_secs(db.idle_timeout_secs.unwrap_or(30)),
                connect_timeout: Duration::from_secs(db.connect_timeout_secs.unwrap_or(2)),
            },
            server: ServerConfig {
                bind: server.bind.unwrap_or_else(|| "0.0.0.0".into()),
                port: server.port.unwrap_or(3000),
                static_dir: server.static_dir.unwrap_or_else(|| "./public".into()),
            },
            engine: EngineConfig {
                url: engine.url.unwrap_or_else(|| "http://localhost:8000".into()),
                timeout: Duration::from_secs(engine.timeout_secs.unwrap_or(30)),
                users_profile_id: engine
                    .users_profile_id
                    .unwrap_or_else(|| DEFAULT_USERS_PROFILE_ID.into()),
            },
        }
    }
}

/// Command-line overrides, highest priority.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db: Option<String>,
    pub port: Option<u16>,
    pub engine_url: Option<String>,
    pub static_dir: Option<String>,
}

impl Overrides {
    fn as_file(&self) -> ConfigFile {
        ConfigFile {
            database: Some(DatabaseSection {
                url: self.db.clone(),
                ..Default::default()
            }),
            server: Some(ServerSection {
                port: self.port,
                static_dir: self.static_dir.clone(),
                ..Default::default()
            }),
            engine: Some(EngineSection {
                url: self.engine_url.clone(),
                ..Default::default()
            }),
        }
    }
}

/// Walk up from the current directory looking for `.uba/config.toml`.
pub fn find_project_config() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(".uba").join("config.toml");
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Global config path: `~/.config/uba-gateway/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("uba-gateway").join("config.toml"))
}

pub fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file(path, &content)
}

fn parse_file(path: &Path, content: &str) -> Result<ConfigFile, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve settings: global file → project file → environment → flags.
pub fn load_config(overrides: &Overrides) -> Result<Config, ConfigError> {
    let mut file = ConfigFile::default();

    for path in [global_config_path(), find_project_config()].into_iter().flatten() {
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading config file");
            file.merge(&load_file(&path)?);
        }
    }

    file.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))?;
    file.merge(&overrides.as_file());
    Ok(Config::from(file))
}
