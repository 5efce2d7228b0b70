//! Tessella: stencil operator dispatch for halo-exchanged lattice
//! fields.
//!
//! One operator application is split into an interior pass that
//! overlaps with the halo exchange and one or more exterior passes that
//! fold the received boundary contributions back in. The dispatcher
//! resolves, per region, where boundary data stages, which monomorphized
//! kernel variant runs, and which launch configuration the autotuner
//! has measured fastest for that exact scenario.

pub mod core;
pub mod dispatch;
pub mod runtime;
pub mod staging;
pub mod transfer;
pub mod tuner;

pub use crate::core::context::{kernel_pack_t, set_kernel_pack_t, OperatorContext, PhaseContext};
pub use crate::core::cost::CostModel;
pub use crate::core::geometry::{FieldGeometry, HostField, Precision, StencilField};
pub use crate::core::region::{Axis, ExteriorStrategy, KernelRegion, RegionPlan};
pub use crate::dispatch::signature::SignatureSet;
pub use crate::dispatch::variant::{
    default_resolver, JitResolver, KernelKey, KernelResolver, StaticResolver,
};
pub use crate::dispatch::{DispatchConfig, DispatchReport, StencilDispatcher};
pub use crate::runtime::{DeviceStream, HostStream, LaunchRequest};
pub use crate::staging::{
    Destination, NoPeers, PackLabel, PackTarget, PeerCapability, PeerMatrix, StagingPools,
    StagingRoute,
};
pub use crate::transfer::TransferParamStore;
pub use crate::tuner::{AutoTuner, LaunchConfig, TunableLaunch, TuningCache, TuningStats};
