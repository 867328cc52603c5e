//! User configuration.
//!
//! [`ConfigFile`] is the INI file at `~/.pagesnap/config.ini`. Runtime
//! components take their own config structs (`SchedulerConfig`,
//! `PoolConfig`, `SweeperConfig`), each of which implements
//! `From<&ConfigFile>`.
//!
//! # Example
//!
//! ```
//! use pagesnap::config::ConfigFile;
//! use pagesnap::scheduler::SchedulerConfig;
//!
//! let file = ConfigFile::default();
//! let config = SchedulerConfig::from(&file);
//! assert_eq!(config.max_concurrency, file.scheduler.max_concurrency);
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{ConfigKey, ConfigKeyError};
pub use settings::{
    ConfigFile, LoggingSettings, PoolSettings, SchedulerSettings, SweeperSettings,
};
