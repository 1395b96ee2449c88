//! Run configuration loaded from an optional RON file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use migration_engine::SiteConfig;
use migration_logging::{migration_debug, migration_info};

pub const DEFAULT_CONFIG_FILE: &str = "migration.ron";

/// Loads `path`, or `migration.ron` in the working directory when no path
/// is given. Only the default file may be absent; the defaults apply then.
/// `root` replaces the configured site root.
pub fn load_config(path: Option<&Path>, root: Option<PathBuf>) -> Result<SiteConfig> {
    let mut config = match path {
        Some(path) => read_config(path, true)?,
        None => read_config(Path::new(DEFAULT_CONFIG_FILE), false)?,
    };
    if let Some(root) = root {
        config.site_root = root;
    }
    Ok(config)
}

fn read_config(path: &Path, required: bool) -> Result<SiteConfig> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
            migration_debug!("No {:?}; using the default configuration", path);
            return Ok(SiteConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("could not read config {:?}", path));
        }
    };

    let config: SiteConfig =
        ron::from_str(&content).with_context(|| format!("invalid config {:?}", path))?;
    migration_info!("Loaded configuration from {:?}", path);
    Ok(config)
}
