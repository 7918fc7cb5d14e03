//! Per-root configuration.

use std::time::Duration;

use super::reconcile::ReconcileStrategy;

/// How render requests are driven to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerMode {
    /// `Root::render` and `Root::request_render` flush before returning.
    #[default]
    Sync,
    /// The host drives the loop through `Root::work` / `Root::work_slice`,
    /// usually from the waker installed with `Root::set_waker`.
    Sliced,
}

/// Configuration of one [`Root`](super::Root).
#[derive(Debug, Clone, PartialEq)]
pub struct RootConfig {
    pub mode: SchedulerMode,
    /// Budget of one `Root::work_slice` call
    pub time_slice: Duration,
    pub reconcile: ReconcileStrategy,
    /// Render cycles one `work` call may commit back to back before giving up
    /// with `RenderError::UpdateDepthExceeded`
    pub max_render_cycles: usize,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            mode: SchedulerMode::Sync,
            time_slice: Duration::from_millis(5),
            reconcile: ReconcileStrategy::Auto,
            max_render_cycles: 50,
        }
    }
}

impl RootConfig {
    pub fn sliced() -> Self {
        Self::default().with_mode(SchedulerMode::Sliced)
    }

    pub fn with_mode(mut self, mode: SchedulerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_time_slice(mut self, time_slice: Duration) -> Self {
        self.time_slice = time_slice;
        self
    }

    pub fn with_reconcile(mut self, reconcile: ReconcileStrategy) -> Self {
        self.reconcile = reconcile;
        self
    }

    pub fn with_max_render_cycles(mut self, max_render_cycles: usize) -> Self {
        self.max_render_cycles = max_render_cycles.max(1);
        self
    }
}
