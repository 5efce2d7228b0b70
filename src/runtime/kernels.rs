//! Host reference kernel bodies and the ghost-pointer table they read
//! through. Each body is monomorphized over the dagger/xpay flags and
//! the parity count, matching the specialization axes of the resolver.

use half::f16;
use rayon::prelude::*;

use crate::core::context::PhaseContext;
use crate::core::geometry::{FieldGeometry, Precision, StencilField};
use crate::core::region::{Axis, KernelRegion};
use crate::staging::{slab_bytes, PeerCapability, StagingPools, StagingRoute};
use crate::tuner::LaunchConfig;

/// One attached ghost buffer: the element offset of its slab within the
/// axis's ghost region, and whether a peer writes it directly.
#[derive(Debug, Clone, Copy)]
pub struct GhostRef {
    pub offset: usize,
    pub peer: bool,
}

/// Persistent table of the eight ghost buffer attachments. Exterior
/// kernels read boundary data exclusively through this table.
#[derive(Debug, Clone, Copy, Default)]
pub struct GhostTable {
    entries: [Option<GhostRef>; 8],
}

impl GhostTable {
    /// Re-attach ghost buffers before a region launch. The interior
    /// refreshes all eight entries; exterior launches refresh only the
    /// channels without a peer link, since peer-written slabs keep
    /// their attachment from the interior pass.
    pub fn refresh(
        &mut self,
        region: KernelRegion,
        geom: &FieldGeometry,
        peers: &dyn PeerCapability,
    ) {
        for axis in Axis::ALL {
            for dir in 0..2 {
                let peer = peers.peer_enabled(axis, dir);
                if region == KernelRegion::Interior || !peer {
                    self.entries[2 * axis.index() + dir] = Some(GhostRef {
                        offset: geom.ghost_offset(axis, dir),
                        peer,
                    });
                }
            }
        }
    }

    pub fn get(&self, axis: Axis, dir: usize) -> Option<GhostRef> {
        self.entries[2 * axis.index() + dir]
    }
}

/// Everything one kernel launch touches, assembled by the dispatcher.
pub struct KernelInvocation<'a> {
    pub out: &'a mut dyn StencilField,
    pub input: &'a dyn StencilField,
    pub phase: &'a PhaseContext,
    pub config: &'a LaunchConfig,
    pub ghosts: &'a GhostTable,
    /// Accumulation coefficient for the xpay form.
    pub coeff: f64,
}

pub type KernelFn = fn(&mut KernelInvocation<'_>) -> Result<(), String>;

/// Interior stencil pass: for every active site, sum the eight nearest
/// neighbors that do not cross a communication-enabled boundary. The
/// output is overwritten, never read, so this body tolerates repeated
/// speculative launches without protection.
pub fn interior_body<const DAGGER: bool, const XPAY: bool, const NPARITY: usize>(
    inv: &mut KernelInvocation<'_>,
) -> Result<(), String> {
    let geom = inv.input.geometry().clone();
    let site_len = geom.site_len();
    let active = geom.volume() * NPARITY / 2;
    let sign: f32 = if DAGGER { -1.0 } else { 1.0 };
    let coeff = inv.coeff as f32;
    let comm = inv.phase.comm_dim;
    let input = inv.input.data();
    let out = inv.out.data_mut();

    out[..active * site_len]
        .par_chunks_mut(site_len)
        .enumerate()
        .for_each(|(site, o)| {
            for (k, v) in o.iter_mut().enumerate() {
                *v = if XPAY {
                    coeff * input[site * site_len + k]
                } else {
                    0.0
                };
            }
            for axis in Axis::ALL {
                for dir in 0..2 {
                    // neighbor arrives through the halo exchange instead
                    if comm[axis.index()] && geom.on_boundary(site, axis, dir) {
                        continue;
                    }
                    let n = geom.neighbor(site, axis, dir);
                    for (k, v) in o.iter_mut().enumerate() {
                        *v += sign * input[n * site_len + k];
                    }
                }
            }
        });
    Ok(())
}

/// Exterior stencil pass: accumulate the received boundary contributions
/// onto the interior result. Reads and writes the output, so the tuner
/// must snapshot it around speculative launches.
pub fn exterior_body<const DAGGER: bool, const XPAY: bool, const NPARITY: usize>(
    inv: &mut KernelInvocation<'_>,
) -> Result<(), String> {
    let geom = inv.input.geometry().clone();
    let site_len = geom.site_len();
    let sign: f32 = if DAGGER { -1.0 } else { 1.0 };

    let axes: Vec<Axis> = match inv.phase.region {
        KernelRegion::Exterior(a) => vec![a],
        KernelRegion::ExteriorAll => Axis::ALL
            .iter()
            .copied()
            .filter(|a| inv.phase.comm_dim[a.index()])
            .collect(),
        r => return Err(format!("{:?} is not an exterior region", r)),
    };

    for axis in axes {
        let limit = geom.ghost_face(axis) * NPARITY / 2;
        for dir in 0..2 {
            let gref = inv.ghosts.get(axis, dir).ok_or_else(|| {
                format!(
                    "ghost buffer for axis {} dir {} not attached",
                    axis.tag(),
                    dir
                )
            })?;
            let ghost = inv.input.ghost(axis);
            let out = inv.out.data_mut();
            for site in 0..geom.volume() {
                if !geom.on_boundary(site, axis, dir) {
                    continue;
                }
                let f = slab_index(&geom, site, axis, dir);
                if f >= limit {
                    continue;
                }
                let base = gref.offset + f * site_len;
                let o = &mut out[site * site_len..(site + 1) * site_len];
                for (k, v) in o.iter_mut().enumerate() {
                    *v += sign * ghost[base + k];
                }
            }
        }
    }
    Ok(())
}

/// Position of a boundary site within its (axis, dir) slab, layer-major
/// so deeper faces land behind the surface face.
fn slab_index(
    geom: &FieldGeometry,
    site: usize,
    axis: Axis,
    dir: usize,
) -> usize {
    let d = axis.index();
    let c = geom.coords(site);
    let layer = if dir == 0 {
        c[d]
    } else {
        geom.dims[d] - 1 - c[d]
    };
    layer * (geom.volume() / geom.dims[d]) + geom.face_index(site, axis)
}

/// Stage the boundary slabs of every communication-enabled axis into
/// their resolved staging slabs, converting to the ghost precision.
/// Temporal slabs carry the projection scale.
pub fn pack_halo(
    input: &dyn StencilField,
    routes: &[[StagingRoute; 2]; 4],
    pools: &mut StagingPools,
    comm_dim: &[bool; 4],
    proj_scale: f64,
) -> Result<(), String> {
    let geom = input.geometry().clone();
    let site_len = geom.site_len();
    let data = input.data();

    for axis in Axis::ALL {
        if !comm_dim[axis.index()] {
            continue;
        }
        let scale = if axis == Axis::T {
            proj_scale as f32
        } else {
            1.0
        };
        for dir in 0..2 {
            let mut slab = vec![0.0f32; geom.ghost_face(axis) * site_len];
            for site in 0..geom.volume() {
                if !geom.on_boundary(site, axis, dir) {
                    continue;
                }
                let f = slab_index(&geom, site, axis, dir);
                let dst = &mut slab[f * site_len..(f + 1) * site_len];
                let src = &data[site * site_len..(site + 1) * site_len];
                for k in 0..site_len {
                    dst[k] = scale * src[k];
                }
            }
            write_slab(pools, routes[axis.index()][dir], &geom, axis, &slab)?;
        }
    }
    Ok(())
}

fn write_slab(
    pools: &mut StagingPools,
    route: StagingRoute,
    geom: &FieldGeometry,
    axis: Axis,
    slab: &[f32],
) -> Result<(), String> {
    let bytes = slab_bytes(geom, axis);
    let out = pools.slab_mut(route, bytes);
    match geom.ghost_precision {
        Precision::Half => {
            for (chunk, v) in out.chunks_exact_mut(2).zip(slab.iter()) {
                chunk.copy_from_slice(&f16::from_f32(*v).to_le_bytes());
            }
        }
        Precision::Single => out.copy_from_slice(bytemuck::cast_slice(slab)),
        p => return Err(format!("ghost precision {:?} has no packing path", p)),
    }
    Ok(())
}

/// Loopback exchange for the host backend: deliver each staged slab
/// into the field's own ghost region, converting back to f32. The slab
/// staged toward `dir` arrives as the neighbor's `1 - dir` ghost, and
/// with periodic wrap that neighbor is this process. A real transport
/// replaces this with the inter-device copy.
///
/// Temporal slabs were staged with the projection scale applied; the
/// consuming side divides it back out, so pack plus delivery is the
/// identity in either packing mode.
pub fn unpack_halo(
    field: &mut dyn StencilField,
    routes: &[[StagingRoute; 2]; 4],
    pools: &StagingPools,
    comm_dim: &[bool; 4],
    proj_scale: f64,
) -> Result<(), String> {
    let geom = field.geometry().clone();
    let site_len = geom.site_len();

    for axis in Axis::ALL {
        if !comm_dim[axis.index()] {
            continue;
        }
        let inv_scale = if axis == Axis::T {
            1.0 / proj_scale as f32
        } else {
            1.0
        };
        for dir in 0..2 {
            let bytes = slab_bytes(&geom, axis);
            let src = pools.slab(routes[axis.index()][dir], bytes);
            let offset = geom.ghost_offset(axis, 1 - dir);
            let n = geom.ghost_face(axis) * site_len;
            let ghost = field.ghost_mut(axis);
            match geom.ghost_precision {
                Precision::Half => {
                    for (i, chunk) in src.chunks_exact(2).take(n).enumerate() {
                        ghost[offset + i] =
                            inv_scale * f16::from_le_bytes([chunk[0], chunk[1]]).to_f32();
                    }
                }
                Precision::Single => {
                    // the slab offset breaks f32 alignment, so no cast
                    for (i, chunk) in src.chunks_exact(4).take(n).enumerate() {
                        ghost[offset + i] = inv_scale
                            * f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    }
                }
                p => return Err(format!("ghost precision {:?} has no unpacking path", p)),
            }
        }
    }
    Ok(())
}
