use crate::tuner::TunableLaunch;

/// Scoped save/restore around a speculative timing window.
///
/// Any region other than interior/policy reads and writes the output
/// field, so a timing run would corrupt it. The guard snapshots on
/// construction and restores on drop, which covers early exits (a
/// failed candidate launch, an error return) as well as the normal
/// path.
pub struct TuneGuard<'a> {
    scenario: &'a mut dyn TunableLaunch,
}

impl<'a> TuneGuard<'a> {
    pub fn protect(scenario: &'a mut dyn TunableLaunch) -> Self {
        scenario.pre_tune();
        Self { scenario }
    }

    pub fn scenario(&mut self) -> &mut dyn TunableLaunch {
        &mut *self.scenario
    }
}

impl Drop for TuneGuard<'_> {
    fn drop(&mut self) {
        self.scenario.post_tune();
    }
}
