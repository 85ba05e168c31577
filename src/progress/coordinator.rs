//! Parent/child coordination and stall detection for progress bars.

use super::options::{BarColor, ProgressOptions};
use super::renderer::{NullRenderer, Renderer};
use super::stall_timer::{StallCallback, StallTimer, TimerFactory, delay_timer_factory};
use super::state::ProgressState;
use chrono::{DateTime, Local, TimeDelta};
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

const LOG_TARGET: &str = "  progress";

/// Context shared by every bar spawned from the same root.
struct Tree {
    renderer: Arc<dyn Renderer>,
    on_stalled: Option<StallCallback>,
    timers: TimerFactory,
    root: OnceLock<Weak<Node>>,
    next_id: AtomicU64,
}

impl Tree {
    fn redisplay(&self) {
        if let Some(root) = self.root.get().and_then(Weak::upgrade) {
            self.renderer.display_progress(&ProgressBar { node: root });
        }
    }
}

struct Node {
    id: u64,
    state: ProgressState,
    tree: Arc<Tree>,
    timer: Box<dyn StallTimer>,

    /// Also serializes every transition of `timer` between armed and disarmed.
    children: Mutex<Vec<ProgressBar>>,

    /// Set when the stalled callback fires, cleared by the next tick.
    progress_stopped: AtomicBool,

    /// Set once by `dispose`; the timer is never armed again afterwards.
    disposed: AtomicBool,

    /// Parent to notify on completion; taken when the notification is sent.
    parent: Mutex<Option<Weak<Node>>>,

    this: Weak<Node>,
}

impl Node {
    fn create(tree: Arc<Tree>, max_ticks: i64, message: String, options: ProgressOptions) -> Arc<Self> {
        let id = tree.next_id.fetch_add(1, Ordering::Relaxed);
        let timer = (tree.timers)();

        let node = Arc::new_cyclic(|this| Self {
            id,
            state: ProgressState::new(max_ticks, message, options),
            tree,
            timer,
            children: Mutex::new(Vec::new()),
            progress_stopped: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            parent: Mutex::new(None),
            this: Weak::clone(this),
        });

        node.arm_timer();
        node
    }

    fn lock_children(&self) -> MutexGuard<'_, Vec<ProgressBar>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arm_timer(&self) {
        let this = Weak::clone(&self.this);
        let callback: StallCallback = Arc::new(move |percentage: f64, message: &str| {
            if let Some(node) = this.upgrade() {
                node.check_progress(percentage, message);
            }
        });

        self.timer.start(
            callback,
            self.state.options().idle_timeout,
            self.state.percentage(),
            &self.state.message(),
        );
    }

    fn check_progress(&self, percentage: f64, message: &str) {
        if self.disposed.load(Ordering::Acquire) || self.progress_stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        log::debug!(target: LOG_TARGET, "Bar {} stalled at {percentage:.1}%: {message}", self.id);
        if let Some(on_stalled) = &self.tree.on_stalled {
            on_stalled(percentage, message);
        }
    }

    fn child_done(&self) {
        let children = self.lock_children();
        if !self.disposed.load(Ordering::Acquire)
            && !self.state.is_done()
            && children.iter().all(|child| child.current_tick() >= child.max_ticks()) {
            log::debug!(target: LOG_TARGET, "All children of bar {} finished, resuming its idle timer", self.id);
            self.progress_stopped.store(false, Ordering::Release);
            self.arm_timer();
        }
    }

    fn dispose(&self) {
        let children = {
            let children = self.lock_children();
            self.disposed.store(true, Ordering::Release);
            self.timer.stop();
            children.clone()
        };

        for child in children {
            child.node.dispose();
        }
    }
}

/// A progress bar that may own nested child bars.
///
/// Handles are cheap to clone and may be shared across threads; all clones
/// refer to the same bar. Every mutation ends with a call to the tree's
/// [`Renderer`].
#[derive(Clone)]
pub struct ProgressBar {
    node: Arc<Node>,
}

impl ProgressBar {
    /// Create a root bar that renders nothing and has no stalled callback.
    ///
    /// Negative `max_ticks` are treated as zero.
    #[must_use]
    pub fn new(max_ticks: i64, message: impl Into<String>, options: ProgressOptions) -> Self {
        Self::builder(max_ticks, message).options(options).build()
    }

    /// Start configuring a root bar.
    #[must_use]
    pub fn builder(max_ticks: i64, message: impl Into<String>) -> ProgressBarBuilder {
        ProgressBarBuilder {
            max_ticks,
            message: message.into(),
            options: ProgressOptions::default(),
            renderer: Arc::new(NullRenderer),
            on_stalled: None,
            timers: None,
        }
    }

    /// Identifier unique within this bar's tree. The root is always `0`.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.node.id
    }

    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.node.state.current_tick()
    }

    #[must_use]
    pub fn max_ticks(&self) -> u64 {
        self.node.state.max_ticks()
    }

    /// Replace the expected number of ticks. Negative values are treated as zero.
    pub fn set_max_ticks(&self, max_ticks: i64) {
        self.node.state.set_max_ticks(max_ticks);
        self.node.tree.redisplay();
    }

    #[must_use]
    pub fn message(&self) -> String {
        self.node.state.message()
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.node.state.set_message(message);
        self.node.tree.redisplay();
    }

    /// Completion in the range `[0, 100]`; always 100 when no ticks are expected.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.node.state.percentage()
    }

    #[must_use]
    pub fn start_time(&self) -> DateTime<Local> {
        self.node.state.start_time()
    }

    /// When the bar first reached its maximum, if it has.
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.node.state.end_time()
    }

    #[must_use]
    pub fn elapsed(&self) -> TimeDelta {
        self.node.state.elapsed()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.node.state.is_done()
    }

    /// Whether the renderer should hide or compact this finished bar.
    #[must_use]
    pub fn collapse(&self) -> bool {
        self.node.state.collapse()
    }

    #[must_use]
    pub fn foreground_color(&self) -> BarColor {
        self.node.state.foreground_color()
    }

    #[must_use]
    pub fn options(&self) -> &ProgressOptions {
        self.node.state.options()
    }

    /// Snapshot of the children spawned so far, in spawn order.
    #[must_use]
    pub fn children(&self) -> Vec<Self> {
        self.node.lock_children().clone()
    }

    /// Whether this bar is currently watching itself for stalls.
    ///
    /// Bars with unfinished children leave stall detection to them.
    #[must_use]
    pub fn is_idle_timer_armed(&self) -> bool {
        self.node.timer.is_armed()
    }

    /// Record one unit of work, optionally replacing the message.
    pub fn tick(&self, message: Option<&str>) {
        self.finish_tick(None, message);
    }

    /// Jump to `tick_count` (not an increment), optionally replacing the message.
    pub fn tick_to(&self, tick_count: i64, message: Option<&str>) {
        self.finish_tick(Some(tick_count), message);
    }

    fn finish_tick(&self, explicit: Option<i64>, message: Option<&str>) {
        let node = &self.node;
        node.progress_stopped.store(false, Ordering::Release);

        let finished = node.state.advance(explicit, message);
        node.timer.reset(node.state.percentage(), &node.state.message());

        if finished {
            {
                let _children = node.lock_children();
                node.timer.stop();
            }

            log::debug!(
                target: LOG_TARGET,
                "Bar {} finished {} ticks in {}ms",
                node.id,
                node.state.current_tick(),
                node.state.elapsed().num_milliseconds()
            );

            node.tree.renderer.on_done(self);

            let parent = node.parent.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(parent) = parent.as_ref().and_then(Weak::upgrade) {
                parent.child_done();
            }
        }

        node.tree.redisplay();
    }

    /// Create a child bar that shares this bar's renderer, stalled callback, and timers.
    ///
    /// The child inherits this bar's options unless `options` is given. While
    /// any child is unfinished this bar does not report stalls itself.
    #[must_use]
    pub fn spawn(&self, max_ticks: i64, message: impl Into<String>, options: Option<ProgressOptions>) -> Self {
        let options = options.unwrap_or_else(|| self.options().clone());
        let child = Self {
            node: Node::create(Arc::clone(&self.node.tree), max_ticks, message.into(), options),
        };

        {
            let mut children = self.node.lock_children();
            self.node.timer.stop();
            *child.node.parent.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(&self.node));
            children.push(child.clone());
        }

        if self.node.disposed.load(Ordering::Acquire) {
            child.node.dispose();
        }

        log::debug!(target: LOG_TARGET, "Bar {} spawned child {} expecting {} ticks", self.node.id, child.node.id, child.max_ticks());
        self.node.tree.redisplay();
        child
    }

    /// Stop this bar's idle timer and those of all its descendants.
    ///
    /// The bars stay readable but will never report a stall again.
    pub fn dispose(&self) {
        self.node.dispose();
    }
}

impl Debug for ProgressBar {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressBar")
            .field("id", &self.node.id)
            .field("current_tick", &self.current_tick())
            .field("max_ticks", &self.max_ticks())
            .field("message", &self.message())
            .field("done", &self.is_done())
            .field("children", &self.node.lock_children().len())
            .finish()
    }
}

/// Configures a root [`ProgressBar`].
pub struct ProgressBarBuilder {
    max_ticks: i64,
    message: String,
    options: ProgressOptions,
    renderer: Arc<dyn Renderer>,
    on_stalled: Option<StallCallback>,
    timers: Option<TimerFactory>,
}

impl ProgressBarBuilder {
    #[must_use]
    pub fn options(mut self, options: ProgressOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Called with the last `(percentage, message)` when any bar in the tree stalls.
    #[must_use]
    pub fn on_stalled(mut self, on_stalled: impl Fn(f64, &str) + Send + Sync + 'static) -> Self {
        self.on_stalled = Some(Arc::new(on_stalled));
        self
    }

    /// Replace the tokio-backed idle timers.
    #[must_use]
    pub fn timers(mut self, timers: TimerFactory) -> Self {
        self.timers = Some(timers);
        self
    }

    #[must_use]
    pub fn build(self) -> ProgressBar {
        let tree = Arc::new(Tree {
            renderer: self.renderer,
            on_stalled: self.on_stalled,
            timers: self.timers.unwrap_or_else(delay_timer_factory),
            root: OnceLock::new(),
            next_id: AtomicU64::new(0),
        });

        let node = Node::create(Arc::clone(&tree), self.max_ticks, self.message, self.options);
        let _ = tree.root.set(Arc::downgrade(&node));

        ProgressBar { node }
    }
}

impl Debug for ProgressBarBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressBarBuilder")
            .field("max_ticks", &self.max_ticks)
            .field("message", &self.message)
            .field("options", &self.options)
            .field("renderer", &"<dyn Renderer>")
            .field("on_stalled", &self.on_stalled.is_some())
            .field("timers", &self.timers.is_some())
            .finish()
    }
}
