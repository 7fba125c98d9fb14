//! Precomputed farm list, used to skip the expensive event scan

use async_trait::async_trait;
use eyre::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{dedupe_farms, Farm, FarmSource};
use crate::errors::{KeeperError, KeeperResult};

/// JSON array of `{ "name": ..., "address": ... }`
#[derive(Debug, Clone)]
pub struct StaticFarmList {
    path: PathBuf,
}

impl StaticFarmList {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<Vec<Farm>> {
        let content = fs::read_to_string(&self.path)?;
        let farms: Vec<Farm> = serde_json::from_str(&content)?;
        Ok(dedupe_farms(farms))
    }

    /// Write a list in the format [`StaticFarmList::load`] reads
    pub fn save<P: AsRef<Path>>(path: P, farms: &[Farm]) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(farms)?)?;
        Ok(())
    }
}

#[async_trait]
impl FarmSource for StaticFarmList {
    async fn farms(&self) -> KeeperResult<Vec<Farm>> {
        // Re-read every cycle so the list can be edited without a restart
        let farms = self.load().map_err(|e| {
            KeeperError::cycle_dependency("farm list", format!("{}: {}", self.path.display(), e))
        })?;
        debug!("Loaded {} farms from {}", farms.len(), self.path.display());
        Ok(farms)
    }
}
