use std::env;

use crate::{Error, Result};

pub const LOG_VAR: &str = "TARLOGS_LOG";
pub const DEREFERENCE_VAR: &str = "TARLOGS_DEREFERENCE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Timestamped progress lines on stderr.
    pub verbose: bool,
    /// Follow symlinks when archiving paths directly.
    pub dereference: bool,
}

impl Config {
    /// Reads settings from the environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        // No .env file is the common case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let flag = |var: &'static str| match lookup(var) {
            Some(value) => parse_bool(var, &value),
            None => Ok(false),
        };
        Ok(Config {
            verbose: flag(LOG_VAR)?,
            dereference: flag(DEREFERENCE_VAR)?,
        })
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config {
            var,
            value: value.to_string(),
        }),
    }
}
