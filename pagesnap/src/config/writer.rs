//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[scheduler]
; Number of workers. At most this many jobs render at once.
; Defaults to the number of logical CPUs.
max_concurrency = {}
; Seconds a job waits for a render session before failing (default: 30)
lease_timeout_secs = {}
; Seconds shutdown waits for running jobs to finish (default: 10)
shutdown_grace_secs = {}

[pool]
; Maximum live render sessions. 0 follows max_concurrency (default: 0)
capacity = {}
; Sessions launched at start-up so the first jobs skip the launch cost (default: 0)
prewarm = {}
; Navigation attempts per job before it fails (default: 3)
navigation_retries = {}
; Seconds to wait for a selector to match a visible element (default: 30)
element_wait_secs = {}

[sweeper]
; Seconds between cleanup sweeps (default: 60)
interval_secs = {}
; Seconds finished jobs stay readable before they are forgotten (default: 600)
retention_secs = {}
; Seconds a render session may go unused before it is closed or reclaimed (default: 300)
lease_idle_secs = {}

[logging]
; Log file path (default: ~/.pagesnap/pagesnap.log)
file = {}
"#,
        config.scheduler.max_concurrency,
        config.scheduler.lease_timeout_secs,
        config.scheduler.shutdown_grace_secs,
        config.pool.capacity,
        config.pool.prewarm,
        config.pool.navigation_retries,
        config.pool.element_wait_secs,
        config.sweeper.interval_secs,
        config.sweeper.retention_secs,
        config.sweeper.lease_idle_secs,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
pub(super) fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
