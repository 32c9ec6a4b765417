//! Calibration ratio persistence.
//!
//! The file is loaded on the first read and written through on every change.
//! A missing file is initialized with zero ratios (uncalibrated), mirroring
//! how a blank EEPROM is treated on the device.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::WrapErr;
use pumps_traits::{BoxError, RatioStore};
use serde::{Deserialize, Serialize};

/// Layout version; a file with another version is reset to zeros.
pub const RATIOS_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PersistedRatios {
    pub version: u32,
    /// Stepper pumps.
    pub steps_per_ml: u32,
    /// Duty-cycled pumps.
    pub ticks_per_ml: u32,
}

impl Default for PersistedRatios {
    fn default() -> Self {
        Self {
            version: RATIOS_VERSION,
            steps_per_ml: 0,
            ticks_per_ml: 0,
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

/// TOML-file backed ratio store with a lazily filled cache.
#[derive(Debug)]
pub struct FileRatioStore {
    path: PathBuf,
    cache: Option<PersistedRatios>,
}

impl FileRatioStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file has been read yet.
    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    fn load(&mut self) -> eyre::Result<&mut PersistedRatios> {
        if self.cache.is_none() {
            let ratios = if self.path.exists() {
                let text = fs::read_to_string(&self.path)
                    .wrap_err_with(|| format!("read ratio store {:?}", self.path))?;
                let parsed: PersistedRatios = toml::from_str(&text)
                    .wrap_err_with(|| format!("parse ratio store {:?}", self.path))?;
                if parsed.version == RATIOS_VERSION {
                    parsed
                } else {
                    let fresh = PersistedRatios::default();
                    save(&self.path, &fresh)?;
                    fresh
                }
            } else {
                let fresh = PersistedRatios::default();
                save(&self.path, &fresh)?;
                fresh
            };
            self.cache = Some(ratios);
        }
        self.cache
            .as_mut()
            .ok_or_else(|| eyre::eyre!("ratio cache empty after load"))
    }

    /// Snapshot of both ratios, loading the file if needed.
    pub fn ratios(&mut self) -> eyre::Result<PersistedRatios> {
        self.load().map(|r| *r)
    }

    /// The cache only takes the new value once it is on disk.
    fn update(&mut self, apply: impl FnOnce(&mut PersistedRatios)) -> eyre::Result<()> {
        let before = *self.load()?;
        let mut next = before;
        apply(&mut next);
        if next != before {
            save(&self.path, &next)?;
            self.cache = Some(next);
        }
        Ok(())
    }
}

fn save(path: &Path, ratios: &PersistedRatios) -> eyre::Result<()> {
    let text = toml::to_string(ratios).wrap_err("serialize ratios")?;
    write_atomic(path, text.as_bytes()).wrap_err_with(|| format!("write ratio store {path:?}"))
}

impl RatioStore for FileRatioStore {
    fn steps_per_ml(&mut self) -> Result<u32, BoxError> {
        Ok(self.load()?.steps_per_ml)
    }

    fn set_steps_per_ml(&mut self, value: u32) -> Result<(), BoxError> {
        self.update(|r| r.steps_per_ml = value)?;
        Ok(())
    }

    fn ticks_per_ml(&mut self) -> Result<u32, BoxError> {
        Ok(self.load()?.ticks_per_ml)
    }

    fn set_ticks_per_ml(&mut self, value: u32) -> Result<(), BoxError> {
        self.update(|r| r.ticks_per_ml = value)?;
        Ok(())
    }
}

/// Volatile ratio store for simulation and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryRatioStore {
    pub steps_per_ml: u32,
    pub ticks_per_ml: u32,
    /// Number of `set_*` calls that changed a value.
    pub writes: u32,
}

impl MemoryRatioStore {
    pub fn new(steps_per_ml: u32, ticks_per_ml: u32) -> Self {
        Self {
            steps_per_ml,
            ticks_per_ml,
            writes: 0,
        }
    }
}

impl RatioStore for MemoryRatioStore {
    fn steps_per_ml(&mut self) -> Result<u32, BoxError> {
        Ok(self.steps_per_ml)
    }

    fn set_steps_per_ml(&mut self, value: u32) -> Result<(), BoxError> {
        if self.steps_per_ml != value {
            self.steps_per_ml = value;
            self.writes += 1;
        }
        Ok(())
    }

    fn ticks_per_ml(&mut self) -> Result<u32, BoxError> {
        Ok(self.ticks_per_ml)
    }

    fn set_ticks_per_ml(&mut self, value: u32) -> Result<(), BoxError> {
        if self.ticks_per_ml != value {
            self.ticks_per_ml = value;
            self.writes += 1;
        }
        Ok(())
    }
}
