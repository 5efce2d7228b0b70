//! Persistence for learned transfer parameters: rank-stamped binary
//! files of flat f32 coefficients, fronted by a process-lifetime cache
//! so repeated solves never re-read the filesystem.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Canonical parameter file name. The rank stamp keeps per-process
/// files apart; loading always reads rank 0's file so every process
/// trains against the same parameters.
pub fn param_file_name(prefix: &str, rank: usize, ls: usize, ls_base: usize, mu: f64) -> String {
    format!(
        "{}_rank_{:05}_ls_{:02}_{:02}_mu_{:.3}.dat",
        prefix, rank, ls, ls_base, mu
    )
}

/// File-backed store of transfer parameter vectors with an in-memory
/// cache keyed by file name.
pub struct TransferParamStore {
    cache: HashMap<String, Vec<f32>>,
    rank: usize,
}

impl TransferParamStore {
    pub fn new(rank: usize) -> Self {
        Self {
            cache: HashMap::new(),
            rank,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn cached(&self, name: &str) -> Option<&[f32]> {
        self.cache.get(name).map(Vec::as_slice)
    }

    /// Load a parameter vector of `len` coefficients. Every rank reads
    /// the rank-0 file; the result is cached for the process lifetime.
    pub fn load(
        &mut self,
        dir: &Path,
        prefix: &str,
        ls: usize,
        ls_base: usize,
        mu: f64,
        len: usize,
    ) -> Result<Vec<f32>, String> {
        let name = param_file_name(prefix, 0, ls, ls_base, mu);
        if let Some(params) = self.cache.get(&name) {
            return Ok(params.clone());
        }

        let path = dir.join(&name);
        let mut file = File::open(&path)
            .map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

        let expected = len * 4;
        if raw.len() != expected {
            return Err(format!(
                "{}: expected {} bytes, found {}",
                path.display(),
                expected,
                raw.len()
            ));
        }

        let params: Vec<f32> = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        eprintln!("[Transfer] loaded {} coefficients from {}", len, path.display());
        self.cache.insert(name, params.clone());
        Ok(params)
    }

    /// Save this rank's parameter vector under its own rank stamp.
    pub fn save(
        &mut self,
        dir: &Path,
        prefix: &str,
        ls: usize,
        ls_base: usize,
        mu: f64,
        params: &[f32],
    ) -> Result<(), String> {
        let name = param_file_name(prefix, self.rank, ls, ls_base, mu);
        let path = dir.join(&name);
        let bytes: &[u8] = bytemuck::cast_slice(params);
        let mut file = File::create(&path)
            .map_err(|e| format!("failed to create {}: {}", path.display(), e))?;
        file.write_all(bytes)
            .map_err(|e| format!("failed to write {}: {}", path.display(), e))?;
        eprintln!(
            "[Transfer] saved {} coefficients to {}",
            params.len(),
            path.display()
        );
        self.cache.insert(name, params.to_vec());
        Ok(())
    }

    /// Gaussian initialization for training from scratch: small
    /// N(0, 0.1) coefficients, deterministically seeded per rank.
    pub fn fill_random(&self, len: usize) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(23 * self.rank as u64);
        let normal = Normal::new(0.0f32, 1.0).unwrap();
        (0..len).map(|_| 1e-1 * normal.sample(&mut rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_rank_and_shape_stamped() {
        assert_eq!(
            param_file_name("mobius", 3, 12, 4, 0.01),
            "mobius_rank_00003_ls_12_04_mu_0.010.dat"
        );
    }

    #[test]
    fn save_then_load_round_trips_through_rank_zero() {
        let dir = std::env::temp_dir().join("transfer_store_test");
        std::fs::create_dir_all(&dir).unwrap();

        let mut rank0 = TransferParamStore::new(0);
        let params = rank0.fill_random(64);
        rank0.save(&dir, "trip", 8, 4, 0.25, &params).unwrap();

        let mut other = TransferParamStore::new(5);
        let loaded = other.load(&dir, "trip", 8, 4, 0.25, 64).unwrap();
        assert_eq!(loaded, params);
        assert!(other.cached(&param_file_name("trip", 0, 8, 4, 0.25)).is_some());
    }

    #[test]
    fn short_file_reports_expected_and_actual_sizes() {
        let dir = std::env::temp_dir().join("transfer_store_test");
        std::fs::create_dir_all(&dir).unwrap();

        let mut writer = TransferParamStore::new(0);
        writer.save(&dir, "short", 4, 4, 0.5, &[1.0; 8]).unwrap();
        let mut reader = TransferParamStore::new(1);
        let err = reader.load(&dir, "short", 4, 4, 0.5, 16).unwrap_err();
        assert!(err.contains("expected 64 bytes"));
        assert!(err.contains("found 32"));
    }

    #[test]
    fn random_fill_is_deterministic_per_rank() {
        let store = TransferParamStore::new(2);
        assert_eq!(store.fill_random(16), store.fill_random(16));
        let other = TransferParamStore::new(3);
        assert_ne!(store.fill_random(16), other.fill_random(16));
    }
}
