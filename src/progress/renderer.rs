use super::ProgressBar;

/// Draws a progress tree.
///
/// `display_progress` is called after every observable change anywhere in the
/// tree, possibly from several threads at once and far more often than a
/// terminal can usefully refresh. Implementations are expected to re-read the
/// whole tree from `root` and to throttle their own output.
pub trait Renderer: Send + Sync {
    /// Redraw the tree rooted at `root`.
    fn display_progress(&self, root: &ProgressBar);

    /// Called exactly once when `bar` finishes.
    fn on_done(&self, bar: &ProgressBar) {
        let _ = bar;
    }
}

/// A renderer that draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn display_progress(&self, _root: &ProgressBar) {}
}
