//! Root entry - binds an element tree to an output container.
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::{h, Attributes, MemoryDom, Root, RootConfig};
//!
//! let mut root = Root::new(MemoryDom::new(), RootConfig::default());
//! let container = root.host_mut().create_container();
//!
//! // Sync mode: rendered and committed before `render` returns
//! root.render(h("p", Attributes::new(), "hello"), container)?;
//! assert_eq!(root.host().inner_html(container), "<p>hello</p>");
//!
//! // Empty element list: everything is removed and cleaned up
//! root.render((), container)?;
//! ```

use std::rc::Rc;

use tracing::{debug, warn};

use super::commit::{self, CommitLog};
use super::config::{RootConfig, SchedulerMode};
use super::work_loop::{Phase, SchedulerShared, WorkInProgress};
use crate::element::{Child, Element};
use crate::engine::{FiberArena, FiberId};
use crate::error::{EffectError, RenderError};
use crate::host::Host;

// =============================================================================
// Stats
// =============================================================================

/// Counters over the lifetime of a root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RootStats {
    /// Render passes started
    pub renders: usize,
    /// Passes replaced by a newer request before completing
    pub restarts: usize,
    /// Passes committed
    pub commits: usize,
    /// Units processed across all passes
    pub units: usize,
    /// Times the loop gave control back to the host
    pub yields: usize,
    pub effects_run: usize,
    pub cleanups_run: usize,
}

// =============================================================================
// Root
// =============================================================================

/// One rendering session: a host, the container it renders into, and the
/// committed unit tree.
pub struct Root<H: Host> {
    pub(crate) host: H,
    pub(crate) config: RootConfig,
    pub(crate) arena: FiberArena<H::Node>,
    pub(crate) container: Option<H::Node>,
    /// Elements rendered under the container
    pub(crate) elements: Rc<[Element]>,
    /// Root unit of the committed tree
    pub(crate) current: Option<FiberId>,
    pub(crate) wip: Option<WorkInProgress>,
    pub(crate) scheduler: Rc<SchedulerShared>,
    pub(crate) phase: Phase,
    pub(crate) stats: RootStats,
    pub(crate) last_commit: Option<CommitLog>,
    pub(crate) effect_errors: Vec<EffectError>,
}

impl<H: Host> Root<H> {
    pub fn new(host: H, config: RootConfig) -> Self {
        Self {
            host,
            config,
            arena: FiberArena::new(),
            container: None,
            elements: Rc::from(Vec::new()),
            current: None,
            wip: None,
            scheduler: Rc::new(SchedulerShared::default()),
            phase: Phase::Idle,
            stats: RootStats::default(),
            last_commit: None,
            effect_errors: Vec::new(),
        }
    }

    /// Render `element` into `container`.
    ///
    /// Binding a different container first unmounts the tree rendered into the
    /// previous one and clears the new container. An empty child (`()`,
    /// `None`) removes everything. In [`SchedulerMode::Sync`] the pass is
    /// committed before returning; in `Sliced` mode it only is requested.
    pub fn render(&mut self, element: impl Into<Child>, container: H::Node) -> Result<(), RenderError> {
        if self.container.as_ref() != Some(&container) {
            self.rebind(container);
        }
        self.elements = element.into().into_elements().into();
        self.scheduler.request();
        self.flush_if_sync()
    }

    /// Re-render the current elements.
    ///
    /// Without anything rendered yet this only logs a warning.
    pub fn request_render(&mut self) -> Result<(), RenderError> {
        if self.current.is_none() && self.wip.is_none() {
            warn!("re-render requested with nothing rendered, ignored");
            return Ok(());
        }
        self.scheduler.request();
        self.flush_if_sync()
    }

    fn flush_if_sync(&mut self) -> Result<(), RenderError> {
        match self.config.mode {
            SchedulerMode::Sync => self.flush(),
            SchedulerMode::Sliced => Ok(()),
        }
    }

    /// Tear down the committed tree and release the container.
    ///
    /// Effect cleanups, `will_unmount` and ref callbacks run; the tree's nodes
    /// are detached from the container.
    pub fn unmount(&mut self) {
        self.discard_work();
        self.scheduler.take_pending();

        if let (Some(current), Some(container)) = (self.current.take(), self.container.as_ref()) {
            let mut cleanups = 0;
            for child in self.arena.children(current) {
                cleanups += commit::teardown(&self.arena, child, &mut self.effect_errors);
                for node in self.arena.host_nodes(child) {
                    if self.host.contains(container, &node) {
                        self.host.remove_child(container, &node);
                    }
                }
            }
            self.stats.cleanups_run += cleanups;
            debug!(cleanups, "unmounted");
        }

        self.arena.clear();
        self.container = None;
        self.elements = Rc::from(Vec::new());
        self.phase = Phase::Idle;
    }

    /// Switch to `container`: unmount from the old one, empty the new one.
    fn rebind(&mut self, container: H::Node) {
        if self.container.is_some() {
            debug!("container changed, unmounting previous tree");
            self.unmount();
        }
        for child in self.host.children(&container) {
            self.host.remove_child(&container, &child);
        }
        self.container = Some(container);
    }

    /// Install the callback fired when a render becomes pending (once per
    /// coalesced request). Hosts use it to schedule `work`.
    pub fn set_waker(&mut self, waker: impl Fn() + 'static) {
        self.scheduler.set_waker(Some(Rc::new(waker)));
    }

    pub fn clear_waker(&mut self) {
        self.scheduler.set_waker(None);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &RootConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> RootStats {
        self.stats
    }

    /// Mutations applied by the latest commit.
    pub fn last_commit(&self) -> Option<&CommitLog> {
        self.last_commit.as_ref()
    }

    /// Effect, cleanup and lifecycle failures collected since the last call.
    pub fn take_effect_errors(&mut self) -> Vec<EffectError> {
        std::mem::take(&mut self.effect_errors)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn container(&self) -> Option<&H::Node> {
        self.container.as_ref()
    }

    pub fn arena(&self) -> &FiberArena<H::Node> {
        &self.arena
    }

    /// Root unit of the committed tree.
    pub fn current(&self) -> Option<FiberId> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::h;
    use crate::host::MemoryDom;
    use crate::types::Attributes;

    fn root() -> Root<MemoryDom> {
        Root::new(MemoryDom::new(), RootConfig::default())
    }

    #[test]
    fn test_render_and_rerender_same_tree() {
        let mut root = root();
        let container = root.host_mut().create_container();
        let tree = || h("div", Attributes::new().with("id", "a"), "hi");

        root.render(tree(), container).unwrap();
        assert_eq!(root.host().inner_html(container), r#"<div id="a">hi</div>"#);
        assert_eq!(root.last_commit().map(|log| log.created), Some(2));

        root.render(tree(), container).unwrap();
        let log = root.last_commit().unwrap();
        assert!(!log.is_structural());
        assert_eq!(log.updated, 2);
        assert_eq!(root.stats().commits, 2);
    }

    #[test]
    fn test_request_render_without_tree_is_noop() {
        let mut root = root();
        root.request_render().unwrap();
        assert_eq!(root.stats().renders, 0);
        assert!(root.current().is_none());
    }

    #[test]
    fn test_rebind_clears_new_container_and_unmounts_old() {
        let mut root = root();
        let first = root.host_mut().create_container();
        let second = root.host_mut().create_container();
        let stale = root.host_mut().create_element("span");
        root.host_mut().append_child(&second, &stale);

        root.render(h("p", Attributes::new(), "x"), first).unwrap();
        root.render(h("p", Attributes::new(), "y"), second).unwrap();

        assert_eq!(root.host().inner_html(first), "");
        assert_eq!(root.host().inner_html(second), "<p>y</p>");
        assert_eq!(root.container(), Some(&second));
    }

    #[test]
    fn test_unmount_releases_everything() {
        let mut root = root();
        let container = root.host_mut().create_container();
        root.render(h("ul", Attributes::new(), h("li", Attributes::new(), "a")), container).unwrap();
        assert!(!root.arena().is_empty());

        root.unmount();
        assert!(root.arena().is_empty());
        assert!(root.current().is_none());
        assert_eq!(root.host().inner_html(container), "");
    }
}
