//! Operator dispatch: turns one application request into the ordered
//! region sequence, resolving staging routes, kernel variants, and
//! launch configurations along the way.

pub mod signature;
pub mod variant;

use std::sync::Arc;

use serde::Serialize;

use crate::core::context::{OperatorContext, PhaseContext};
use crate::core::cost::CostModel;
use crate::core::geometry::{FieldGeometry, HostField, StencilField};
use crate::core::region::{Axis, ExteriorStrategy, KernelRegion, RegionPlan};
use crate::runtime::kernels::{self, GhostTable, KernelInvocation};
use crate::runtime::{DeviceStream, LaunchRequest};
use crate::staging::{self, PackLabel, PackTarget, PeerCapability, StagingPools};
use crate::tuner::{AutoTuner, LaunchConfig, TunableLaunch, TuningCache};

use self::signature::SignatureSet;
use self::variant::{default_resolver, KernelKey, KernelResolver, ResolvedKernel};

/// Static configuration of one dispatcher instance.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Whether this process is part of a multi-device domain.
    pub multi_device: bool,
    /// Process-grid partition mask. Communication can only run along a
    /// partitioned axis.
    pub partitioned: [bool; 4],
    pub strategy: ExteriorStrategy,
    /// Staging destinations the transport layer permits.
    pub pack_target: PackTarget,
    /// Accumulation coefficient for the xpay form.
    pub xpay_coeff: f64,
    pub max_block: u32,
}

impl DispatchConfig {
    pub fn single_device() -> Self {
        Self {
            multi_device: false,
            partitioned: [false; 4],
            strategy: ExteriorStrategy::PerDimension,
            pack_target: PackTarget::DEVICE,
            xpay_coeff: 1.0,
            max_block: 256,
        }
    }

    pub fn multi_device(partitioned: [bool; 4]) -> Self {
        Self {
            multi_device: true,
            partitioned,
            ..Self::single_device()
        }
    }
}

/// What one operator application executed and what it cost.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DispatchReport {
    pub regions: Vec<KernelRegion>,
    pub flops: u64,
    pub bytes: u64,
}

/// The dispatch engine: owns the tuner, the staging pools, the variant
/// resolver, and the ghost attachment table across applications.
pub struct StencilDispatcher {
    pub config: DispatchConfig,
    pub tuner: AutoTuner,
    resolver: Box<dyn KernelResolver>,
    pools: StagingPools,
    peers: Box<dyn PeerCapability>,
    ghosts: GhostTable,
}

impl StencilDispatcher {
    pub fn new(
        config: DispatchConfig,
        geom: &FieldGeometry,
        peers: Box<dyn PeerCapability>,
        cache: TuningCache,
    ) -> Self {
        let resolver = default_resolver(config.multi_device);
        Self {
            config,
            tuner: AutoTuner::new(cache),
            resolver,
            pools: StagingPools::new(geom),
            peers,
            ghosts: GhostTable::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Box<dyn KernelResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Aggregate cost of one full application, independent of how it is
    /// split into regions.
    pub fn policy_cost(ctx: &OperatorContext, geom: &FieldGeometry) -> (u64, u64) {
        (
            CostModel::flop_count(KernelRegion::Policy, ctx, geom),
            CostModel::byte_count(KernelRegion::Policy, ctx, geom),
        )
    }

    /// Apply the operator once: interior first, then the exterior
    /// phase(s) chosen by the strategy, with the fused halo pack riding
    /// on the interior when packing threads are requested.
    pub fn apply(
        &mut self,
        stream: &mut dyn DeviceStream,
        out: &mut HostField,
        input: &mut HostField,
        ctx: &OperatorContext,
    ) -> Result<DispatchReport, String> {
        ctx.validate()?;
        let geom = input.geometry().clone();

        let mut ctx = ctx.clone();
        if ctx.threads == 0 {
            ctx.threads = geom.volume() * ctx.n_parity / 2;
        }

        let plan = RegionPlan::new(ctx.comm_dim, self.config.strategy);
        if plan.n_dim_comms() > 0 && !self.config.multi_device {
            return Err("communication requested on a single-device configuration".into());
        }
        for axis in Axis::ALL {
            if ctx.comm_dim[axis.index()] && !self.config.partitioned[axis.index()] {
                return Err(format!(
                    "communication enabled on unpartitioned axis {}",
                    axis.tag()
                ));
            }
        }

        let mut signatures = SignatureSet::new(&ctx, self.config.partitioned, self.config.multi_device);
        let phases = plan.phases(&ctx, &geom)?;
        let mut report = DispatchReport::default();

        for phase in &phases {
            self.ghosts.refresh(phase.region, &geom, self.peers.as_ref());

            let sig = if phase.packing() {
                // routes are resolved fresh on every packing call
                let slot = input.buffer_index();
                let routes = staging::resolve_all(
                    self.config.pack_target,
                    self.peers.as_ref(),
                    &geom,
                    slot,
                )?;
                let label =
                    PackLabel::classify(self.config.pack_target, self.peers.any_peer_enabled())?;
                signatures.set_pack(KernelRegion::Interior, label);

                kernels::pack_halo(
                    &*input,
                    &routes,
                    &mut self.pools,
                    &phase.comm_dim,
                    phase.proj_scale,
                )?;
                kernels::unpack_halo(
                    &mut *input,
                    &routes,
                    &self.pools,
                    &phase.comm_dim,
                    phase.proj_scale,
                )?;

                signatures.pack().to_string()
            } else {
                signatures.for_region(phase.region).to_string()
            };

            let key = KernelKey::from_phase(phase, &geom);
            let kernel = self.resolver.resolve(&key)?;

            let config = {
                let mut scenario = DispatchScenario {
                    kernel: kernel.clone(),
                    out: &mut *out,
                    input: &*input,
                    phase,
                    ghosts: &self.ghosts,
                    coeff: self.config.xpay_coeff,
                    max_block: self.config.max_block,
                    stream: &mut *stream,
                };
                self.tuner.resolve(&sig, &mut scenario)?
            };

            let request = LaunchRequest {
                name: kernel.name.clone(),
                region: phase.region,
                config,
            };
            let ghosts = &self.ghosts;
            let coeff = self.config.xpay_coeff;
            stream.submit(request, &mut || {
                let mut inv = KernelInvocation {
                    out: &mut *out,
                    input: &*input,
                    phase,
                    config: &config,
                    ghosts,
                    coeff,
                };
                (kernel.entry)(&mut inv)
            })?;

            report.regions.push(phase.region);
            report.flops += CostModel::flop_count(phase.region, &ctx, &geom);
            report.bytes += CostModel::byte_count(phase.region, &ctx, &geom);
        }

        input.rotate_buffer();
        Ok(report)
    }
}

/// One region launch as the tuner sees it: speculative launches run the
/// real kernel on the real fields, so aliased regions snapshot the
/// output around the search window.
struct DispatchScenario<'a> {
    kernel: Arc<ResolvedKernel>,
    out: &'a mut HostField,
    input: &'a HostField,
    phase: &'a PhaseContext,
    ghosts: &'a GhostTable,
    coeff: f64,
    max_block: u32,
    stream: &'a mut dyn DeviceStream,
}

impl TunableLaunch for DispatchScenario<'_> {
    fn min_threads(&self) -> u32 {
        (self.phase.threads + self.phase.pack_threads).max(1) as u32
    }

    fn max_block(&self) -> u32 {
        self.max_block
    }

    fn shared_bytes(&self, block: u32) -> u32 {
        block * self.input.geometry().site_len() as u32 * 4
    }

    fn tune_aux(&self) -> bool {
        self.phase.packing()
    }

    fn launch(&mut self, config: &LaunchConfig) -> Result<(), String> {
        let mut inv = KernelInvocation {
            out: &mut *self.out,
            input: self.input,
            phase: self.phase,
            config,
            ghosts: self.ghosts,
            coeff: self.coeff,
        };
        (self.kernel.entry)(&mut inv)
    }

    fn synchronize(&mut self) {
        self.stream.synchronize();
    }

    fn pre_tune(&mut self) {
        if self.phase.region.is_aliased() {
            self.out.backup();
        }
    }

    fn post_tune(&mut self) {
        if self.phase.region.is_aliased() {
            self.out.restore();
        }
    }
}
