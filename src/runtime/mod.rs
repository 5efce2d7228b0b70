//! Device command-stream abstraction and the host reference backend.

pub mod kernels;

use crate::core::region::KernelRegion;
use crate::tuner::LaunchConfig;

/// One enqueued kernel launch, as recorded by the stream.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub name: String,
    pub region: KernelRegion,
    pub config: LaunchConfig,
}

/// Ordered asynchronous command stream: submissions execute in order,
/// submission itself never blocks the control thread. Only the tuner
/// synchronizes.
pub trait DeviceStream {
    fn submit(
        &mut self,
        request: LaunchRequest,
        work: &mut dyn FnMut() -> Result<(), String>,
    ) -> Result<(), String>;
    fn synchronize(&mut self);
}

/// Host reference stream: executes work inline on the control thread,
/// preserving submission order, and records every launch plus the
/// synchronization count so ordering and blocking behavior are
/// observable.
#[derive(Debug, Default)]
pub struct HostStream {
    pub log: Vec<LaunchRequest>,
    pub sync_count: usize,
}

impl HostStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regions launched so far, in submission order.
    pub fn launched_regions(&self) -> Vec<KernelRegion> {
        self.log.iter().map(|r| r.region).collect()
    }
}

impl DeviceStream for HostStream {
    fn submit(
        &mut self,
        request: LaunchRequest,
        work: &mut dyn FnMut() -> Result<(), String>,
    ) -> Result<(), String> {
        self.log.push(request);
        work()
    }

    fn synchronize(&mut self) {
        self.sync_count += 1;
    }
}
