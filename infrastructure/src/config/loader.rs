//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::Path;

/// Configuration loader that merges defaults, file, and environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    ///
    /// Priority (highest to lowest):
    /// 1. `SWITCHBOARD_*` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project-level `./switchboard.toml` (if present)
    /// 4. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        let project = Path::new("switchboard.toml");
        if project.exists() {
            figment = figment.merge(Toml::file(project));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("SWITCHBOARD_").split("__"));

        figment.extract().map_err(Box::new)
    }

    /// Load only default configuration (for `--no-config`).
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }
}
