use std::{net::SocketAddr, time::Duration};

use crate::poetry::like::DEFAULT_MAX_ATTEMPTS;

#[derive(Clone, Debug, PartialEq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub env: Env,
    pub listen_addr: SocketAddr,
    /// Comments and likes are kept in memory when this is not set.
    pub database_url: Option<String>,
    pub database_max_connections: usize,
    pub request_deadline: Duration,
    pub like_toggle_max_attempts: u32,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            env: Env::Dev,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            database_max_connections: 10,
            request_deadline: Duration::from_millis(5000),
            like_toggle_max_attempts: DEFAULT_MAX_ATTEMPTS,
            cors_allowed_origins: vec![],
        }
    }
}

type Lookup<'a> = &'a dyn Fn(&str) -> Result<Option<String>, String>;

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(e) => match e {
            std::env::VarError::NotPresent => Ok(None),
            std::env::VarError::NotUnicode(_) => Err(format!(
                "Could not get the environment variable `{key}` due to unicode error"
            )),
        },
    }
}

/// Parses an optional variable, falling back to `default` when it is unset.
fn parsed_var<T>(lookup: Lookup, key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key)? {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| format!("Environment variable `{key}` is invalid: {e}")),
        None => Ok(default),
    }
}

impl ServerConfig {
    /// Reads the config from the process environment. Warnings are handed
    /// back instead of logged since this runs before tracing is set up.
    pub fn new_from_env() -> Result<(Self, Vec<String>), String> {
        Self::from_lookup(&var)
    }

    fn from_lookup(lookup: Lookup) -> Result<(Self, Vec<String>), String> {
        let defaults = ServerConfig::default();
        let mut warnings = vec![];

        let env = match lookup("ENVIRONMENT")?.as_deref() {
            Some("dev") | None => Env::Dev,
            Some("staging") => Env::Staging,
            Some("production") => Env::Production,
            Some(other) => {
                warnings.push(format!("Unknown ENVIRONMENT `{other}`, falling back to dev"));
                Env::Dev
            }
        };

        let database_url = lookup("DATABASE_URL")?;
        if database_url.is_none() {
            if env == Env::Production {
                return Err("Environment variable `DATABASE_URL` is required in production".into());
            }
            warnings.push(
                "Missing environment variable `DATABASE_URL`, using the in-memory store".into(),
            );
        }

        let like_toggle_max_attempts: u32 = parsed_var(
            lookup,
            "LIKE_TOGGLE_MAX_ATTEMPTS",
            defaults.like_toggle_max_attempts,
        )?;
        if like_toggle_max_attempts == 0 {
            return Err("Environment variable `LIKE_TOGGLE_MAX_ATTEMPTS` must be at least 1".into());
        }

        let config = ServerConfig {
            env,
            listen_addr: parsed_var(lookup, "LISTEN_ADDR", defaults.listen_addr)?,
            database_url,
            database_max_connections: parsed_var(
                lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            request_deadline: Duration::from_millis(parsed_var(
                lookup,
                "REQUEST_DEADLINE_MS",
                defaults.request_deadline.as_millis() as u64,
            )?),
            like_toggle_max_attempts,
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")?
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        Ok((config, warnings))
    }
}
