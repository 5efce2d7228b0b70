use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Empirically selected hardware launch configuration for one tuning
/// signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub block: (u32, u32, u32),
    pub grid: (u32, u32, u32),
    pub shared_bytes: u32,
    /// Packing-kernel internal fan-out (blocks per direction).
    pub aux: u32,
}

impl LaunchConfig {
    pub fn new(block: u32, grid: u32, shared_bytes: u32) -> Self {
        Self {
            block: (block, 1, 1),
            grid: (grid, 1, 1),
            shared_bytes,
            aux: 1,
        }
    }
}

/// Process-lifetime map from tuning signature to launch configuration.
/// Populated on miss, never evicted within a run; an explicit service a
/// caller owns and injects, so tests can start fresh or pre-seeded.
/// Append-only and safe under a single control thread; concurrent
/// control threads need external synchronization.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TuningCache {
    entries: HashMap<String, LaunchConfig>,
}

impl TuningCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, signature: &str) -> Option<&LaunchConfig> {
        self.entries.get(signature)
    }

    pub fn insert(&mut self, signature: String, config: LaunchConfig) {
        self.entries.insert(signature, config);
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.entries.contains_key(signature)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a previously persisted cache; missing file is not an error.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| format!("failed to read tuning cache {}: {}", path.display(), e))?;
        let entries = serde_json::from_str(&content)
            .map_err(|e| format!("failed to parse tuning cache {}: {}", path.display(), e))?;
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| format!("failed to serialize tuning cache: {}", e))?;
        fs::write(path, content)
            .map_err(|e| format!("failed to write tuning cache {}: {}", path.display(), e))
    }
}
