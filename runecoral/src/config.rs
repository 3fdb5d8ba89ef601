// SPDX-License-Identifier: Apache-2.0

use crate::{accel::DeviceType, Error, Result};
use std::{env, str::FromStr};

pub const ENV_STRICT_ACCELERATION: &str = "RUNECORAL_STRICT_ACCELERATION";
pub const ENV_EDGETPU_DEVICE: &str = "RUNECORAL_EDGETPU_DEVICE";
pub const ENV_PROFILING: &str = "RUNECORAL_PROFILING";

/// Policy knobs applied when creating inference contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Fail context creation when a requested, available accelerator cannot
    /// be bound, instead of falling back to the next candidate.
    pub strict_acceleration: bool,
    /// Preferred EdgeTPU attachment when several devices are present.
    pub edgetpu_device: Option<DeviceType>,
    /// Record `load` and `infer` profiling regions.
    pub profiling: bool,
}

impl Config {
    /// Create new config from environment variables
    ///
    /// Unset variables keep their default value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(value) = lookup(ENV_STRICT_ACCELERATION) {
            config.strict_acceleration = parse_bool(ENV_STRICT_ACCELERATION, &value)?;
        }
        if let Some(value) = lookup(ENV_EDGETPU_DEVICE) {
            config.edgetpu_device = Some(value.parse()?);
        }
        if let Some(value) = lookup(ENV_PROFILING) {
            config.profiling = parse_bool(ENV_PROFILING, &value)?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidArgument(format!(
            "Invalid boolean for {}: {}",
            key, value
        ))),
    }
}

/// Parses options in the format `opt1=value1,opt2=value2`.
impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut config = Config::default();

        for part in s.split(',').filter(|p| !p.trim().is_empty()) {
            let mut kv = part.splitn(2, '=');
            let key = kv
                .next()
                .map(str::trim)
                .ok_or(Error::InvalidArgument("Missing key".to_string()))?;
            let value = kv
                .next()
                .map(str::trim)
                .ok_or(Error::InvalidArgument(format!("Missing value for {}", key)))?;
            match key {
                "strict_acceleration" => config.strict_acceleration = parse_bool(key, value)?,
                "edgetpu_device" => config.edgetpu_device = Some(value.parse()?),
                "profiling" => config.profiling = parse_bool(key, value)?,
                _ => return Err(Error::InvalidArgument(format!("Unknown key: {}", key))),
            }
        }

        Ok(config)
    }
}
