use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::region::KernelRegion;

/// Global packing mode: when set, the temporal-face pack kernel spin
/// projects and the projection scale drops from 2 to 1. Process-wide,
/// set by the communication policy layer before dispatch.
static KERNEL_PACK_T: AtomicBool = AtomicBool::new(false);

pub fn set_kernel_pack_t(enabled: bool) {
    KERNEL_PACK_T.store(enabled, Ordering::Relaxed);
}

pub fn kernel_pack_t() -> bool {
    KERNEL_PACK_T.load(Ordering::Relaxed)
}

/// Per-call configuration for one full operator application. Owned by
/// the caller; the dispatcher derives one immutable [`PhaseContext`] per
/// region from it rather than mutating it in place between launches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorContext {
    /// Which axes have inter-device communication enabled.
    pub comm_dim: [bool; 4],
    /// Apply the adjoint (conjugate-transpose) form of the operator.
    pub dagger: bool,
    /// Accumulate onto a scaled existing vector instead of overwriting.
    pub xpay: bool,
    pub n_parity: usize,
    /// Boundary face depth per direction.
    pub n_face: usize,
    /// Interior work-item count.
    pub threads: usize,
    /// Boundary-packing work-item count; zero disables the fused pack.
    pub pack_threads: usize,
    /// Projection scale derived from the global packing mode.
    pub proj_scale: f64,
}

impl OperatorContext {
    pub fn new(comm_dim: [bool; 4], dagger: bool, xpay: bool, n_parity: usize) -> Self {
        Self {
            comm_dim,
            dagger,
            xpay,
            n_parity,
            n_face: 1,
            threads: 0,
            pack_threads: 0,
            proj_scale: if kernel_pack_t() { 1.0 } else { 2.0 },
        }
    }

    /// Parity counts other than 1 and 2 indicate a caller bug, not a
    /// recoverable condition.
    pub fn validate(&self) -> Result<(), String> {
        match self.n_parity {
            1 | 2 => Ok(()),
            p => Err(format!("n_parity = {} undefined", p)),
        }
    }

    /// The communication bitmask rendered as the canonical "1100"-style
    /// tag used in tuning signatures.
    pub fn comm_tag(&self) -> String {
        self.comm_dim
            .iter()
            .map(|&c| if c { '1' } else { '0' })
            .collect()
    }
}

/// Immutable view of one region execution: everything a kernel launch
/// needs, frozen at planning time so a stale region or thread count can
/// never leak between phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseContext {
    pub region: KernelRegion,
    pub threads: usize,
    pub pack_threads: usize,
    pub comm_dim: [bool; 4],
    pub dagger: bool,
    pub xpay: bool,
    pub n_parity: usize,
    pub n_face: usize,
    pub proj_scale: f64,
}

impl PhaseContext {
    pub fn packing(&self) -> bool {
        self.region == KernelRegion::Interior && self.pack_threads > 0
    }
}
