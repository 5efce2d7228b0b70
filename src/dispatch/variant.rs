//! Kernel variant resolution: maps a specialization key to a concrete
//! monomorphized kernel entry point.
//!
//! Two resolvers implement the same contract. The static resolver
//! selects among ahead-of-time compiled entry points through a chain of
//! conditionals; the deferred resolver specializes a variant on first
//! use and caches it for the process lifetime. Callers cannot tell them
//! apart by behavior, only by startup cost.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::core::context::PhaseContext;
use crate::core::geometry::{FieldGeometry, Precision};
use crate::core::region::{Axis, KernelRegion};
use crate::runtime::kernels::{self, KernelFn};

/// Full specialization key of one kernel variant. Every field that
/// changes the generated code participates in identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct KernelKey {
    pub precision: Precision,
    pub n_dim: usize,
    pub n_color: usize,
    pub n_parity: usize,
    pub dagger: bool,
    pub xpay: bool,
    pub region: KernelRegion,
}

impl KernelKey {
    pub fn from_phase(phase: &PhaseContext, geom: &FieldGeometry) -> Self {
        Self {
            precision: geom.precision,
            n_dim: if geom.ls > 1 { 5 } else { 4 },
            n_color: geom.n_color,
            n_parity: phase.n_parity,
            dagger: phase.dagger,
            xpay: phase.xpay,
            region: phase.region,
        }
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let region = match self.region {
            KernelRegion::Interior => "interior".to_string(),
            KernelRegion::Exterior(Axis::X) => "exterior_x".to_string(),
            KernelRegion::Exterior(Axis::Y) => "exterior_y".to_string(),
            KernelRegion::Exterior(Axis::Z) => "exterior_z".to_string(),
            KernelRegion::Exterior(Axis::T) => "exterior_t".to_string(),
            KernelRegion::ExteriorAll => "exterior_all".to_string(),
            KernelRegion::Policy => "policy".to_string(),
        };
        write!(
            f,
            "stencil_{}_{:?}_nc{}_nd{}_p{}{}{}",
            region,
            self.precision,
            self.n_color,
            self.n_dim,
            self.n_parity,
            if self.dagger { "_dagger" } else { "" },
            if self.xpay { "_xpay" } else { "" },
        )
    }
}

/// A resolved variant: the key it satisfies and its entry point.
#[derive(Debug)]
pub struct ResolvedKernel {
    pub key: KernelKey,
    pub name: String,
    pub entry: KernelFn,
}

pub trait KernelResolver: Send + Sync {
    fn resolve(&self, key: &KernelKey) -> Result<Arc<ResolvedKernel>, String>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
enum BodyFamily {
    Interior,
    Exterior,
}

/// The specialization cascade. Region resolves first since it selects
/// the body family and is where launchability errors live; the flag and
/// parity axes then pin down one monomorphization.
fn specialize(key: &KernelKey, multi_device: bool) -> Result<KernelFn, String> {
    let family = match key.region {
        KernelRegion::Policy => {
            return Err("policy region is an accounting aggregate, not a launchable kernel".into())
        }
        KernelRegion::Interior => BodyFamily::Interior,
        KernelRegion::Exterior(_) | KernelRegion::ExteriorAll => {
            if !multi_device {
                return Err(format!(
                    "multi-device region {:?} requested for a single-device configuration",
                    key.region
                ));
            }
            BodyFamily::Exterior
        }
    };
    specialize_dagger(family, key)
}

fn specialize_dagger(family: BodyFamily, key: &KernelKey) -> Result<KernelFn, String> {
    if key.dagger {
        specialize_xpay::<true>(family, key)
    } else {
        specialize_xpay::<false>(family, key)
    }
}

fn specialize_xpay<const DAGGER: bool>(
    family: BodyFamily,
    key: &KernelKey,
) -> Result<KernelFn, String> {
    if key.xpay {
        specialize_parity::<DAGGER, true>(family, key)
    } else {
        specialize_parity::<DAGGER, false>(family, key)
    }
}

fn specialize_parity<const DAGGER: bool, const XPAY: bool>(
    family: BodyFamily,
    key: &KernelKey,
) -> Result<KernelFn, String> {
    match (family, key.n_parity) {
        (BodyFamily::Interior, 1) => Ok(kernels::interior_body::<DAGGER, XPAY, 1>),
        (BodyFamily::Interior, 2) => Ok(kernels::interior_body::<DAGGER, XPAY, 2>),
        (BodyFamily::Exterior, 1) => Ok(kernels::exterior_body::<DAGGER, XPAY, 1>),
        (BodyFamily::Exterior, 2) => Ok(kernels::exterior_body::<DAGGER, XPAY, 2>),
        (_, p) => Err(format!("n_parity = {} undefined", p)),
    }
}

/// Ahead-of-time resolver: every variant already exists; resolution is
/// pure selection.
pub struct StaticResolver {
    multi_device: bool,
}

impl StaticResolver {
    pub fn new(multi_device: bool) -> Self {
        Self { multi_device }
    }
}

impl KernelResolver for StaticResolver {
    fn resolve(&self, key: &KernelKey) -> Result<Arc<ResolvedKernel>, String> {
        let entry = specialize(key, self.multi_device)?;
        Ok(Arc::new(ResolvedKernel {
            key: *key,
            name: key.to_string(),
            entry,
        }))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Deferred resolver: specializes a variant the first time its key is
/// requested and serves the cached entry afterwards.
pub struct JitResolver {
    multi_device: bool,
    cache: Mutex<HashMap<KernelKey, Arc<ResolvedKernel>>>,
}

impl JitResolver {
    pub fn new(multi_device: bool) -> Self {
        Self {
            multi_device,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of variants specialized so far.
    pub fn compiled_count(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl KernelResolver for JitResolver {
    fn resolve(&self, key: &KernelKey) -> Result<Arc<ResolvedKernel>, String> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| "variant cache poisoned".to_string())?;
        if let Some(k) = cache.get(key) {
            return Ok(k.clone());
        }
        eprintln!("[Variant] specializing {}", key);
        let entry = specialize(key, self.multi_device)?;
        let resolved = Arc::new(ResolvedKernel {
            key: *key,
            name: key.to_string(),
            entry,
        });
        cache.insert(*key, resolved.clone());
        Ok(resolved)
    }

    fn name(&self) -> &'static str {
        "jit"
    }
}

/// The build-selected resolver.
pub fn default_resolver(multi_device: bool) -> Box<dyn KernelResolver> {
    if cfg!(feature = "jit") {
        Box::new(JitResolver::new(multi_device))
    } else {
        Box::new(StaticResolver::new(multi_device))
    }
}
