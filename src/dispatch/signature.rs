use std::collections::HashMap;

use crate::core::context::OperatorContext;
use crate::core::region::{Axis, KernelRegion};
use crate::staging::PackLabel;

/// Canonical signature strings for every region of one operator
/// application, used as tuning-cache keys.
///
/// Two invocations that execute numerically identical device work must
/// produce identical signatures; any behaviorally relevant difference
/// must change the signature, or the cache silently serves a wrong
/// launch configuration.
#[derive(Debug, Clone)]
pub struct SignatureSet {
    base: String,
    regions: HashMap<KernelRegion, String>,
    pack: String,
}

fn base_string(ctx: &OperatorContext) -> String {
    let mut s = format!(",commDim={}", ctx.comm_tag());
    if ctx.xpay {
        s.push_str(",xpay");
    }
    if ctx.dagger {
        s.push_str(",dagger");
    }
    s
}

fn region_tag(region: KernelRegion) -> &'static str {
    match region {
        KernelRegion::Interior => "policy_kernel=interior",
        KernelRegion::Exterior(Axis::X) => "policy_kernel=exterior_x",
        KernelRegion::Exterior(Axis::Y) => "policy_kernel=exterior_y",
        KernelRegion::Exterior(Axis::Z) => "policy_kernel=exterior_z",
        KernelRegion::Exterior(Axis::T) => "policy_kernel=exterior_t",
        KernelRegion::ExteriorAll => "policy_kernel=exterior_all",
        KernelRegion::Policy => "policy",
    }
}

impl SignatureSet {
    /// Build the per-region signature table. `partitioned` is the
    /// process-grid partition mask (distinct from the per-call comm
    /// mask: a partitioned axis may still have communication disabled
    /// for this operator). On single-device configurations the interior
    /// carries a dedicated tag and no exterior entries exist.
    pub fn new(ctx: &OperatorContext, partitioned: [bool; 4], multi_device: bool) -> Self {
        let base = base_string(ctx);
        let mut regions = HashMap::new();

        for region in [
            KernelRegion::Interior,
            KernelRegion::Exterior(Axis::X),
            KernelRegion::Exterior(Axis::Y),
            KernelRegion::Exterior(Axis::Z),
            KernelRegion::Exterior(Axis::T),
            KernelRegion::ExteriorAll,
            KernelRegion::Policy,
        ] {
            let mut s = String::new();
            match region {
                KernelRegion::Interior if !multi_device => {
                    s.push_str("policy_kernel=single-device");
                }
                KernelRegion::Interior => {
                    s.push_str(region_tag(region));
                    s.push_str(",comm=");
                    for p in partitioned {
                        s.push(if p { '1' } else { '0' });
                    }
                }
                _ => s.push_str(region_tag(region)),
            }
            s.push_str(&base);
            regions.insert(region, s);
        }

        Self {
            base,
            regions,
            pack: String::new(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn for_region(&self, region: KernelRegion) -> &str {
        &self.regions[&region]
    }

    pub fn set(&mut self, region: KernelRegion, signature: &str) {
        self.regions.insert(region, signature.to_string());
    }

    pub fn augment(&mut self, region: KernelRegion, extra: &str) {
        if let Some(s) = self.regions.get_mut(&region) {
            s.push_str(extra);
        }
    }

    /// Set the fused interior+pack signature from the resolved staging
    /// label. Must be re-derived on every packing call, after route
    /// resolution.
    pub fn set_pack(&mut self, region: KernelRegion, label: PackLabel) {
        let mut s = self.for_region(region).to_string();
        s.push_str(",fused_pack");
        s.push_str(label.tag());
        self.pack = s;
    }

    pub fn pack(&self) -> &str {
        &self.pack
    }
}
