use crate::core::context::OperatorContext;
use crate::core::geometry::FieldGeometry;
use crate::core::region::{Axis, KernelRegion};

/// Pure arithmetic and memory-traffic accounting per region. No device
/// interaction; used for telemetry and as a tuner tie-break heuristic.
///
/// Accounting invariant: the interior count subtracts the full exterior
/// contribution of every communication-enabled axis, so interior plus
/// the sum of enabled exterior regions equals the policy aggregate
/// exactly once.
pub struct CostModel;

struct FlopTerms {
    mv_flops: u64,
    num_mv_multiply: u64,
    ghost_flops: u64,
    xpay_flops: u64,
    pack_flops: u64,
}

impl FlopTerms {
    fn new(geom: &FieldGeometry) -> Self {
        let nc = geom.n_color as u64;
        let ns = geom.n_spin as u64;
        let mv_flops = (8 * nc - 2) * nc;
        let num_mv_multiply = if ns == 4 { 2 } else { 1 };
        Self {
            mv_flops,
            num_mv_multiply,
            ghost_flops: num_mv_multiply * mv_flops + 2 * nc * ns,
            xpay_flops: 2 * 2 * nc * ns,
            // only costs anything when spin projecting
            pack_flops: if ns == 4 { 2 * (ns / 2) * nc } else { 0 },
        }
    }

    /// Per ghost site, including the accumulate term the exterior pass
    /// carries (halved when not accumulating onto an existing vector).
    fn exterior_site_flops(&self, xpay: bool) -> u64 {
        self.ghost_flops + if xpay { self.xpay_flops } else { self.xpay_flops / 2 }
    }
}

fn enabled_ghost_sites(ctx: &OperatorContext, geom: &FieldGeometry) -> u64 {
    let mut sites = 0u64;
    for axis in Axis::ALL {
        if ctx.comm_dim[axis.index()] {
            sites += 2 * geom.ghost_face(axis) as u64;
        }
    }
    sites
}

impl CostModel {
    pub fn flop_count(region: KernelRegion, ctx: &OperatorContext, geom: &FieldGeometry) -> u64 {
        let t = FlopTerms::new(geom);
        let nc = geom.n_color as u64;
        let ns = geom.n_spin as u64;
        let num_dir = 2 * 4u64;

        match region {
            KernelRegion::Exterior(axis) => {
                t.exterior_site_flops(ctx.xpay) * 2 * geom.ghost_face(axis) as u64
            }
            KernelRegion::ExteriorAll => {
                t.exterior_site_flops(ctx.xpay) * enabled_ghost_sites(ctx, geom)
            }
            KernelRegion::Interior | KernelRegion::Policy => {
                let mut flops = 0u64;
                if region == KernelRegion::Interior && ctx.pack_threads > 0 {
                    flops += t.pack_flops
                        * ctx.n_parity as u64
                        * geom.ls as u64
                        * ctx.pack_threads as u64;
                }
                let sites = geom.volume() as u64;
                flops += (num_dir * (ns / 4) * nc * ns // spin project (=0 for staggered)
                    + num_dir * t.num_mv_multiply * t.mv_flops
                    + (num_dir - 1) * 2 * nc * ns)
                    * sites;
                if ctx.xpay {
                    flops += t.xpay_flops * sites;
                }
                if region == KernelRegion::Interior {
                    // correct for flops done by the exterior passes
                    flops -= t.exterior_site_flops(ctx.xpay) * enabled_ghost_sites(ctx, geom);
                }
                flops
            }
        }
    }

    pub fn byte_count(region: KernelRegion, ctx: &OperatorContext, geom: &FieldGeometry) -> u64 {
        let nc = geom.n_color as u64;
        let ns = geom.n_spin as u64;
        let prec = geom.precision.size() as u64;
        let is_fixed = geom.precision.is_fixed();

        let gauge_bytes = geom.reconstruct as u64 * prec;
        let spinor_bytes = 2 * nc * ns * prec + if is_fixed { 4 } else { 0 };
        let proj_spinor_bytes = if ns == 4 { spinor_bytes / 2 } else { spinor_bytes };
        // the partial result has to be loaded back, hence 2x
        let ghost_bytes = (proj_spinor_bytes + gauge_bytes) + 2 * spinor_bytes;
        let num_dir = 2 * 4u64;
        let mut pack_bytes = 2 * (if ns == 4 { ns / 2 } else { ns } + ns) * nc * prec;
        if is_fixed {
            pack_bytes += 2 * 4; // input and output norms
        }

        match region {
            KernelRegion::Exterior(axis) => ghost_bytes * 2 * geom.ghost_face(axis) as u64,
            KernelRegion::ExteriorAll => ghost_bytes * enabled_ghost_sites(ctx, geom),
            KernelRegion::Interior | KernelRegion::Policy => {
                let mut bytes = 0u64;
                if region == KernelRegion::Interior && ctx.pack_threads > 0 {
                    bytes +=
                        pack_bytes * ctx.n_parity as u64 * geom.ls as u64 * ctx.pack_threads as u64;
                }
                let sites = geom.volume() as u64;
                bytes += (num_dir * gauge_bytes
                    + ((num_dir - 2) * spinor_bytes + 2 * proj_spinor_bytes)
                    + spinor_bytes)
                    * sites;
                if ctx.xpay {
                    bytes += spinor_bytes;
                }
                if region == KernelRegion::Interior {
                    bytes -= ghost_bytes * enabled_ghost_sites(ctx, geom);
                }
                bytes
            }
        }
    }
}
