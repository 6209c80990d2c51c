pub mod build;
pub mod serve;

use std::path::Path;

use anyhow::Result;
use vectiles::Config;

/// Config from `path`, or the defaults.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}
