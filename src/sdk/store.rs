use crate::sdk::location::{CargoMode, Location, LocationId};
use serde::{Deserialize, Serialize};
use std::{fs, io::Result as IoResult, path::Path};

/// Everything that survives between sessions. Each entry defaults on its own, so a
/// file missing one of them still loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchState {
    #[serde(default)]
    pub base: Option<Location>,
    #[serde(default)]
    pub destinations: Vec<Location>,
    #[serde(default)]
    pub cargo_mode: CargoMode,
}

impl DispatchState {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        if path.as_ref().exists() {
            let data = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&data)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> IoResult<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
    }

    /// One past the largest id in use.
    pub fn next_id(&self) -> LocationId {
        let max = self
            .base
            .iter()
            .chain(self.destinations.iter())
            .map(|loc| loc.id.0)
            .max()
            .unwrap_or(0);
        LocationId(max + 1)
    }
}
