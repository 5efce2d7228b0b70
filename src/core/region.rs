use serde::{Deserialize, Serialize};

use crate::core::context::{OperatorContext, PhaseContext};
use crate::core::geometry::FieldGeometry;

/// One of the four lattice axes a halo exchange can run along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    T,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::X, Axis::Y, Axis::Z, Axis::T];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::T => 3,
        }
    }

    pub fn from_index(idx: usize) -> Option<Axis> {
        Axis::ALL.get(idx).copied()
    }

    pub fn tag(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::T => "t",
        }
    }
}

/// Closed enumeration of the kernel phases one operator application can
/// be split into. `Policy` is a virtual aggregate used only for cost
/// accounting of the whole operator and is never launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelRegion {
    Interior,
    Exterior(Axis),
    ExteriorAll,
    Policy,
}

impl KernelRegion {
    /// Regions other than Interior/Policy both read and write the output
    /// field, so the output must be snapshotted around speculative
    /// timing runs.
    pub fn is_aliased(self) -> bool {
        !matches!(self, KernelRegion::Interior | KernelRegion::Policy)
    }

    pub fn is_exterior(self) -> bool {
        matches!(self, KernelRegion::Exterior(_) | KernelRegion::ExteriorAll)
    }
}

/// How the exterior phases are sequenced after the interior pass. Which
/// of the two a caller picks is a communication-overlap policy decided
/// above this layer; both resolve through the same signature and launch
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExteriorStrategy {
    /// One combined pass over every received boundary slab.
    Fused,
    /// One pass per communication-enabled axis, in X, Y, Z, T order.
    PerDimension,
}

/// Enumerates the regions one operator application executes, interior
/// first so the halo exchange overlaps with the interior computation.
#[derive(Debug, Clone, Copy)]
pub struct RegionPlan {
    pub comm_dim: [bool; 4],
    pub strategy: ExteriorStrategy,
}

impl RegionPlan {
    pub fn new(comm_dim: [bool; 4], strategy: ExteriorStrategy) -> Self {
        Self { comm_dim, strategy }
    }

    pub fn n_dim_comms(&self) -> usize {
        self.comm_dim.iter().filter(|&&c| c).count()
    }

    /// The ordered region sequence for one operator application. With no
    /// communication-enabled axis only the interior runs.
    pub fn sequence(&self) -> Vec<KernelRegion> {
        let mut seq = vec![KernelRegion::Interior];
        if self.n_dim_comms() == 0 {
            return seq;
        }
        match self.strategy {
            ExteriorStrategy::Fused => seq.push(KernelRegion::ExteriorAll),
            ExteriorStrategy::PerDimension => {
                for axis in Axis::ALL {
                    if self.comm_dim[axis.index()] {
                        seq.push(KernelRegion::Exterior(axis));
                    }
                }
            }
        }
        seq
    }

    /// Expands the region sequence into immutable per-phase contexts.
    ///
    /// This makes the phase-to-phase variation explicit: the region and
    /// the packing-thread count differ across the sequence (packing work
    /// rides only on the interior phase, exterior phases size their
    /// thread count from the boundary slab), while every flag is carried
    /// through unchanged.
    pub fn phases(
        &self,
        ctx: &OperatorContext,
        geom: &FieldGeometry,
    ) -> Result<Vec<PhaseContext>, String> {
        ctx.validate()?;
        let mut phases = Vec::new();
        for region in self.sequence() {
            let (threads, pack_threads) = match region {
                KernelRegion::Interior => (ctx.threads, ctx.pack_threads),
                KernelRegion::Exterior(axis) => (2 * ctx.n_face * geom.ghost_face(axis), 0),
                KernelRegion::ExteriorAll => {
                    let mut t = 0;
                    for axis in Axis::ALL {
                        if self.comm_dim[axis.index()] {
                            t += 2 * ctx.n_face * geom.ghost_face(axis);
                        }
                    }
                    (t, 0)
                }
                KernelRegion::Policy => unreachable!("policy region is never sequenced"),
            };
            phases.push(PhaseContext {
                region,
                threads,
                pack_threads,
                comm_dim: ctx.comm_dim,
                dagger: ctx.dagger,
                xpay: ctx.xpay,
                n_parity: ctx.n_parity,
                n_face: ctx.n_face,
                proj_scale: ctx.proj_scale,
            });
        }
        Ok(phases)
    }
}
