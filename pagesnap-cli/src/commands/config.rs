//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, `config show`,
//! `config init`, and `config path` for viewing and modifying configuration
//! settings from the command line.

use std::fmt::Write as _;

use clap::Subcommand;
use pagesnap::config::{config_file_path, ConfigFile, ConfigKey};
use pagesnap::scheduler::SchedulerConfig;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., pool.capacity)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., pool.capacity)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the effective runtime configuration
    ///
    /// Resolves derived values, such as a pool capacity that follows
    /// max_concurrency, the way the scheduler would at start-up.
    Show,

    /// Write the default configuration file if none exists
    Init,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init => run_init(),
        ConfigCommands::Path => run_path(),
    }
}

/// Get a configuration value.
fn run_get(key: &str) -> Result<(), CliError> {
    let config_key: ConfigKey = key.parse()?;
    let config = ConfigFile::load()?;
    println!("{}", display_value(&config_key.get(&config)));
    Ok(())
}

/// Set a configuration value.
fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let config_key: ConfigKey = key.parse()?;

    let mut config = ConfigFile::load()?;
    config_key.set(&mut config, value)?;
    config.save()?;

    println!("Set {} = {}", config_key.name(), value);
    Ok(())
}

/// List all configuration settings.
fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    print!("{}", render_list(&config));
    Ok(())
}

/// Show the effective runtime configuration.
fn run_show() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    print!("{}", render_effective(&config));
    Ok(())
}

/// Write the default configuration file.
fn run_init() -> Result<(), CliError> {
    let path = config_file_path();
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        return Ok(());
    }

    let created = ConfigFile::ensure_exists()?;
    println!("Created default configuration at {}", created.display());
    Ok(())
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn render_list(config: &ConfigFile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Configuration Settings");
    let _ = writeln!(out, "======================");

    let mut current_section = "";
    for key in ConfigKey::all() {
        let section = key.section();

        // Print section header when section changes
        if section != current_section {
            let _ = writeln!(out);
            let _ = writeln!(out, "[{}]", section);
            current_section = section;
        }

        let _ = writeln!(
            out,
            "  {} = {}",
            key.key_name(),
            display_value(&key.get(config))
        );
    }
    out
}

fn render_effective(config: &ConfigFile) -> String {
    let runtime = SchedulerConfig::from(config);
    let mut out = String::new();

    let _ = writeln!(out, "Scheduler");
    let _ = writeln!(out, "  Workers:            {}", runtime.max_concurrency);
    let _ = writeln!(out, "  Lease timeout:      {:?}", runtime.lease_timeout);
    let _ = writeln!(out, "  Shutdown grace:     {:?}", runtime.shutdown_grace);
    let _ = writeln!(out, "  Navigation retries: {}", runtime.navigation_retries);
    let _ = writeln!(out, "  Element wait:       {:?}", runtime.element_wait);
    let _ = writeln!(out);
    let _ = writeln!(out, "Render session pool");
    let _ = writeln!(out, "  Capacity:           {}", runtime.pool.capacity);
    let _ = writeln!(out, "  Pre-warmed:         {}", runtime.pool.prewarm);
    let _ = writeln!(out);
    let _ = writeln!(out, "Cleanup sweeper");
    let _ = writeln!(out, "  Interval:           {:?}", runtime.sweeper.interval);
    let _ = writeln!(out, "  Job retention:      {:?}", runtime.sweeper.retention);
    let _ = writeln!(out, "  Lease idle limit:   {:?}", runtime.sweeper.lease_idle);
    let _ = writeln!(out);
    let _ = writeln!(out, "Logging");
    let _ = writeln!(out, "  File:               {}", config.logging.file.display());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_groups_keys_by_section() {
        let config = ConfigFile::default();
        let listing = render_list(&config);

        for section in ["[scheduler]", "[pool]", "[sweeper]", "[logging]"] {
            assert_eq!(listing.matches(section).count(), 1, "{}", section);
        }
        assert!(listing.contains("  lease_timeout_secs = 30"));
        assert!(listing.contains("  retention_secs = 600"));
    }

    #[test]
    fn test_show_resolves_pool_capacity() {
        let mut config = ConfigFile::default();
        config.scheduler.max_concurrency = 6;
        config.pool.capacity = 0;

        let shown = render_effective(&config);
        assert!(shown.contains("Workers:            6"));
        assert!(shown.contains("Capacity:           6"));
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let err = run_get("pool.size").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_empty_value_displays_not_set() {
        assert_eq!(display_value(""), "(not set)");
        assert_eq!(display_value("4"), "4");
    }
}
