//! Halo staging policy: where boundary data gets packed for each
//! neighbor channel, and the double-buffered pools it lands in.
//!
//! Resolution is recomputed on every packing call and never cached;
//! peer-link availability can change between calls and a stale route
//! would silently write into the wrong pool.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::core::geometry::FieldGeometry;
use crate::core::region::Axis;

/// Capability bitmask over the three staging destinations a pack may
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackTarget(u8);

impl PackTarget {
    pub const DEVICE: PackTarget = PackTarget(1);
    pub const HOST: PackTarget = PackTarget(2);
    pub const REMOTE: PackTarget = PackTarget(4);

    pub fn empty() -> PackTarget {
        PackTarget(0)
    }

    pub fn contains(self, other: PackTarget) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for PackTarget {
    type Output = PackTarget;
    fn bitor(self, rhs: PackTarget) -> PackTarget {
        PackTarget(self.0 | rhs.0)
    }
}

/// Per neighbor-channel zero-copy capability queries, answered by the
/// process-group layer.
pub trait PeerCapability {
    fn peer_enabled(&self, axis: Axis, dir: usize) -> bool;
    fn any_peer_enabled(&self) -> bool;
}

/// No peer links anywhere; the single-process default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeers;

impl PeerCapability for NoPeers {
    fn peer_enabled(&self, _axis: Axis, _dir: usize) -> bool {
        false
    }
    fn any_peer_enabled(&self) -> bool {
        false
    }
}

/// Explicit per-channel peer matrix, indexed [axis][dir].
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerMatrix {
    pub enabled: [[bool; 2]; 4],
}

impl PeerMatrix {
    pub fn all() -> Self {
        Self {
            enabled: [[true; 2]; 4],
        }
    }
}

impl PeerCapability for PeerMatrix {
    fn peer_enabled(&self, axis: Axis, dir: usize) -> bool {
        self.enabled[axis.index()][dir]
    }
    fn any_peer_enabled(&self) -> bool {
        self.enabled.iter().flatten().any(|&e| e)
    }
}

/// Which pool a resolved route lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    LocalDevice,
    PinnedHost,
    PeerDevice,
}

/// One resolved staging destination: pool, double-buffer slot, and byte
/// offset within the pool buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingRoute {
    pub destination: Destination,
    pub slot: usize,
    pub offset: usize,
}

/// Discrete label of a pack-target combination, appended to the tuning
/// signature: each combination exercises a materially different code
/// path and must not share a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackLabel {
    DeviceDevice,
    DeviceRemote,
    HostRemote,
    HostHost,
    HostDevice,
}

impl PackLabel {
    pub fn tag(self) -> &'static str {
        match self {
            PackLabel::DeviceDevice => ",device-device",
            PackLabel::DeviceRemote => ",device-remote",
            PackLabel::HostRemote => ",host-remote",
            PackLabel::HostHost => ",host-host",
            PackLabel::HostDevice => ",host-device",
        }
    }

    /// Classify a capability mask into its signature label. Combinations
    /// outside the four supported ones are a configuration error.
    pub fn classify(mask: PackTarget, any_peer: bool) -> Result<PackLabel, String> {
        if mask == PackTarget::DEVICE | PackTarget::REMOTE {
            Ok(PackLabel::DeviceRemote)
        } else if mask == PackTarget::HOST | PackTarget::REMOTE {
            Ok(PackLabel::HostRemote)
        } else if mask == PackTarget::DEVICE {
            Ok(PackLabel::DeviceDevice)
        } else if mask == PackTarget::HOST {
            if any_peer {
                Ok(PackLabel::HostDevice)
            } else {
                Ok(PackLabel::HostHost)
            }
        } else {
            Err(format!("unknown pack target location {}", mask.bits()))
        }
    }
}

/// Byte size of one direction's staging slab for an axis.
pub fn slab_bytes(geom: &FieldGeometry, axis: Axis) -> usize {
    geom.ghost_face(axis) * geom.site_len() * geom.ghost_precision.size()
}

/// Byte offset of a (axis, dir) slab within a pool buffer; slabs are
/// laid out axis-major, both directions back to back.
pub fn slab_offset(geom: &FieldGeometry, axis: Axis, dir: usize) -> usize {
    let mut offset = 0;
    for a in Axis::ALL {
        if a == axis {
            break;
        }
        offset += 2 * slab_bytes(geom, a);
    }
    offset + dir * slab_bytes(geom, axis)
}

/// Resolve the staging destination for one neighbor channel.
///
/// Priority: peer receive buffer when a zero-copy link exists and the
/// caller permits remote writes (addressed through the *reversed*
/// direction, since we write the slab the neighbor will read); else the
/// pinned-host send buffer when permitted and no peer link exists; else
/// the local device send buffer. An empty mask is unsatisfiable.
pub fn resolve_route(
    axis: Axis,
    dir: usize,
    mask: PackTarget,
    peers: &dyn PeerCapability,
    geom: &FieldGeometry,
    slot: usize,
) -> Result<StagingRoute, String> {
    if mask.is_empty() {
        return Err(format!(
            "no staging capability granted for axis {} dir {}",
            axis.tag(),
            dir
        ));
    }
    let peer = peers.peer_enabled(axis, dir);
    let (destination, offset) = if peer && mask.contains(PackTarget::REMOTE) {
        (Destination::PeerDevice, slab_offset(geom, axis, 1 - dir))
    } else if mask.contains(PackTarget::HOST) && !peer {
        (Destination::PinnedHost, slab_offset(geom, axis, dir))
    } else {
        (Destination::LocalDevice, slab_offset(geom, axis, dir))
    };
    Ok(StagingRoute {
        destination,
        slot,
        offset,
    })
}

/// Resolve every (axis, dir) channel for one packing call.
pub fn resolve_all(
    mask: PackTarget,
    peers: &dyn PeerCapability,
    geom: &FieldGeometry,
    slot: usize,
) -> Result<[[StagingRoute; 2]; 4], String> {
    let mut routes = [[StagingRoute {
        destination: Destination::LocalDevice,
        slot,
        offset: 0,
    }; 2]; 4];
    for axis in Axis::ALL {
        for dir in 0..2 {
            routes[axis.index()][dir] = resolve_route(axis, dir, mask, peers, geom, slot)?;
        }
    }
    Ok(routes)
}

/// Double-buffered staging pools: local device send buffers, pinned
/// host send buffers, and the window peers write into via zero-copy.
/// Safe to reuse across calls only because routes are recomputed every
/// call and the rotation slot advances before a buffer is reused.
#[derive(Debug)]
pub struct StagingPools {
    device_send: [Vec<u8>; 2],
    host_send: [Vec<u8>; 2],
    peer_recv: [Vec<u8>; 2],
}

impl StagingPools {
    pub fn new(geom: &FieldGeometry) -> Self {
        let total: usize = Axis::ALL.iter().map(|&a| 2 * slab_bytes(geom, a)).sum();
        Self {
            device_send: [vec![0; total], vec![0; total]],
            host_send: [vec![0; total], vec![0; total]],
            peer_recv: [vec![0; total], vec![0; total]],
        }
    }

    /// The slab a resolved route points at.
    pub fn slab_mut(&mut self, route: StagingRoute, len: usize) -> &mut [u8] {
        let pool = match route.destination {
            Destination::LocalDevice => &mut self.device_send[route.slot],
            Destination::PinnedHost => &mut self.host_send[route.slot],
            Destination::PeerDevice => &mut self.peer_recv[route.slot],
        };
        &mut pool[route.offset..route.offset + len]
    }

    pub fn slab(&self, route: StagingRoute, len: usize) -> &[u8] {
        let pool = match route.destination {
            Destination::LocalDevice => &self.device_send[route.slot],
            Destination::PinnedHost => &self.host_send[route.slot],
            Destination::PeerDevice => &self.peer_recv[route.slot],
        };
        &pool[route.offset..route.offset + len]
    }
}
