//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [scheduler] section
    if let Some(section) = ini.section(Some("scheduler")) {
        if let Some(v) = positive::<usize>(section, "scheduler", "max_concurrency")? {
            config.scheduler.max_concurrency = v;
        }
        if let Some(v) = positive::<u64>(section, "scheduler", "lease_timeout_secs")? {
            config.scheduler.lease_timeout_secs = v;
        }
        if let Some(v) = number::<u64>(section, "scheduler", "shutdown_grace_secs")? {
            config.scheduler.shutdown_grace_secs = v;
        }
    }

    // [pool] section
    if let Some(section) = ini.section(Some("pool")) {
        if let Some(v) = number::<usize>(section, "pool", "capacity")? {
            config.pool.capacity = v;
        }
        if let Some(v) = number::<usize>(section, "pool", "prewarm")? {
            config.pool.prewarm = v;
        }
        if let Some(v) = positive::<u32>(section, "pool", "navigation_retries")? {
            config.pool.navigation_retries = v;
        }
        if let Some(v) = number::<u64>(section, "pool", "element_wait_secs")? {
            config.pool.element_wait_secs = v;
        }
    }

    // [sweeper] section
    if let Some(section) = ini.section(Some("sweeper")) {
        if let Some(v) = positive::<u64>(section, "sweeper", "interval_secs")? {
            config.sweeper.interval_secs = v;
        }
        if let Some(v) = number::<u64>(section, "sweeper", "retention_secs")? {
            config.sweeper.retention_secs = v;
        }
        if let Some(v) = positive::<u64>(section, "sweeper", "lease_idle_secs")? {
            config.sweeper.lease_idle_secs = v;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Reads a non-negative integer; an empty value counts as unset.
fn number<T: FromStr>(
    section: &Properties,
    name: &str,
    key: &str,
) -> Result<Option<T>, ConfigFileError> {
    let Some(raw) = section.get(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| invalid(name, key, raw, "must be a non-negative integer"))
}

/// Like [`number`] but rejects zero.
fn positive<T: FromStr + Default + PartialEq>(
    section: &Properties,
    name: &str,
    key: &str,
) -> Result<Option<T>, ConfigFileError> {
    match number::<T>(section, name, key) {
        Ok(Some(v)) if v == T::default() => {
            Err(invalid(name, key, "0", "must be greater than zero"))
        }
        Err(ConfigFileError::InvalidValue { value, .. }) => {
            Err(invalid(name, key, &value, "must be a positive integer"))
        }
        other => other,
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
