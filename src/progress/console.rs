use super::{BarColor, ProgressBar, Renderer};
use core::fmt::{Debug, Formatter};
use indicatif::{MultiProgress, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

const LOG_TARGET: &str = "   console";

/// Terminal refresh rate (10 Hz).
const REFRESH_HZ: u8 = 10;

const BAR_WIDTH: usize = 25;
const INDENT: &str = "  ";

struct Line {
    bar: indicatif::ProgressBar,
    color: BarColor,
}

/// Draws a progress tree as a stack of terminal bars, children indented below their parent.
///
/// Bars are added in tree order the first time they are seen and updated in place
/// afterwards. indicatif throttles the actual terminal writes.
pub struct ConsoleRenderer {
    multi: MultiProgress,
    lines: Mutex<HashMap<u64, Line>>,
    use_colors: bool,
}

impl ConsoleRenderer {
    /// Render to stderr. When `use_colors` is false, bars are drawn without ANSI styling.
    #[must_use]
    pub fn new(use_colors: bool) -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr_with_hz(REFRESH_HZ), use_colors)
    }

    /// A renderer that keeps its bars up to date without drawing them anywhere.
    #[must_use]
    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden(), false)
    }

    fn with_draw_target(target: ProgressDrawTarget, use_colors: bool) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            lines: Mutex::new(HashMap::new()),
            use_colors,
        }
    }

    /// Run `f` with the bars temporarily cleared, so other terminal output does not tear them.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.multi.suspend(f)
    }

    #[must_use]
    pub const fn use_colors(&self) -> bool {
        self.use_colors
    }

    fn style(&self, color: BarColor) -> ProgressStyle {
        let template = template(self.use_colors, color);
        let style = match ProgressStyle::with_template(&template) {
            Ok(style) => style,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Falling back to the default bar style, template '{template}' is invalid: {e}");
                ProgressStyle::default_bar()
            }
        };

        style.progress_chars("=> ")
    }

    fn sync(&self, bar: &ProgressBar, depth: usize, lines: &mut HashMap<u64, Line>, previous: &mut Option<indicatif::ProgressBar>) {
        let color = bar.foreground_color();
        let line = lines.entry(bar.id()).or_insert_with(|| {
            let fresh = indicatif::ProgressBar::new(bar.max_ticks()).with_style(self.style(color));
            let added = match previous.as_ref() {
                Some(after) => self.multi.insert_after(after, fresh),
                None => self.multi.add(fresh),
            };

            Line { bar: added, color }
        });

        if line.color != color {
            line.bar.set_style(self.style(color));
            line.color = color;
        }

        if !line.bar.is_finished() {
            line.bar.set_prefix(INDENT.repeat(depth));
            line.bar.set_length(bar.max_ticks());
            line.bar.set_position(bar.current_tick());

            if bar.is_done() {
                line.bar.set_message(format!("{} ({}ms)", bar.message(), bar.elapsed().num_milliseconds()));
                if bar.collapse() {
                    line.bar.finish_and_clear();
                } else {
                    line.bar.finish();
                }
            } else {
                line.bar.set_message(bar.message());
            }
        }

        *previous = Some(line.bar.clone());

        for child in bar.children() {
            self.sync(&child, depth + 1, lines, previous);
        }
    }

    /// The terminal bar drawn for the bar with the given id, if it has been rendered.
    #[cfg(test)]
    fn line(&self, id: u64) -> Option<indicatif::ProgressBar> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).get(&id).map(|line| line.bar.clone())
    }
}

fn template(use_colors: bool, color: BarColor) -> String {
    if use_colors {
        format!("{{prefix}}[{{bar:{BAR_WIDTH}.{color}}}] {{pos:>4}}/{{len:4}} {{msg}}")
    } else {
        format!("{{prefix}}[{{bar:{BAR_WIDTH}}}] {{pos:>4}}/{{len:4}} {{msg}}")
    }
}

impl Renderer for ConsoleRenderer {
    fn display_progress(&self, root: &ProgressBar) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        let mut previous = None;
        self.sync(root, 0, &mut lines, &mut previous);
    }

    fn on_done(&self, bar: &ProgressBar) {
        log::debug!(target: LOG_TARGET, "'{}' done after {}ms", bar.message(), bar.elapsed().num_milliseconds());
    }
}

impl Debug for ConsoleRenderer {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConsoleRenderer")
            .field("multi", &"<MultiProgress>")
            .field("lines", &self.lines.lock().unwrap_or_else(PoisonError::into_inner).len())
            .field("use_colors", &self.use_colors)
            .finish()
    }
}
