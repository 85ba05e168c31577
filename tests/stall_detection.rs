//! Stall detection with real tokio-backed idle timers.

use core::time::Duration;
use progress_tree::progress::{ProgressBar, ProgressOptions};
use std::sync::{Arc, Mutex};

const IDLE: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct Stalls {
    seen: Mutex<Vec<(f64, String)>>,
}

impl Stalls {
    fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn last(&self) -> Option<(f64, String)> {
        self.seen.lock().unwrap().last().cloned()
    }
}

fn root(max_ticks: i64, stalls: &Arc<Stalls>) -> ProgressBar {
    let stalls = Arc::clone(stalls);
    ProgressBar::builder(max_ticks, "root")
        .options(ProgressOptions::default().with_idle_timeout(IDLE))
        .on_stalled(move |percentage, message| {
            stalls.seen.lock().unwrap().push((percentage, message.to_string()));
        })
        .build()
}

#[tokio::test]
async fn idle_bar_reports_one_stall_with_last_snapshot() {
    let stalls = Arc::new(Stalls::default());
    let bar = root(10, &stalls);
    bar.tick(Some("downloading"));
    bar.tick(None);

    tokio::time::sleep(IDLE * 4).await;

    assert_eq!(stalls.count(), 1);
    assert_eq!(stalls.last(), Some((20.0, "downloading".to_string())));
}

#[tokio::test]
async fn regular_ticks_keep_bar_quiet() {
    let stalls = Arc::new(Stalls::default());
    let bar = root(20, &stalls);

    for _ in 0..10 {
        tokio::time::sleep(IDLE / 5).await;
        bar.tick(None);
    }

    assert_eq!(stalls.count(), 0);
    bar.dispose();
}

#[tokio::test]
async fn each_idle_period_reports_again() {
    let stalls = Arc::new(Stalls::default());
    let bar = root(10, &stalls);

    bar.tick(Some("first"));
    tokio::time::sleep(IDLE * 3).await;
    assert_eq!(stalls.count(), 1);

    bar.tick(Some("second"));
    tokio::time::sleep(IDLE * 3).await;
    assert_eq!(stalls.count(), 2);
    assert_eq!(stalls.last(), Some((20.0, "second".to_string())));
}

#[tokio::test]
async fn finished_bar_never_stalls() {
    let stalls = Arc::new(Stalls::default());
    let bar = root(2, &stalls);
    bar.tick(None);
    bar.tick(None);
    assert!(bar.is_done());

    tokio::time::sleep(IDLE * 3).await;
    assert_eq!(stalls.count(), 0);
}

#[tokio::test]
async fn parent_is_silent_while_children_run() {
    let stalls = Arc::new(Stalls::default());
    let parent = root(5, &stalls);
    let child = parent.spawn(3, "child", None);
    assert!(!parent.is_idle_timer_armed());

    for step in 0..3 {
        tokio::time::sleep(IDLE / 5).await;
        child.tick(Some(&format!("child step {step}")));
    }
    assert!(child.is_done());
    assert!(parent.is_idle_timer_armed());

    tokio::time::sleep(IDLE * 3).await;

    // only the resumed parent reports, with its own untouched state
    assert_eq!(stalls.count(), 1);
    assert_eq!(stalls.last(), Some((0.0, "root".to_string())));
}

#[tokio::test]
async fn bar_that_never_ticks_reports_its_message() {
    let stalls = Arc::new(Stalls::default());
    let _bar = root(0, &stalls);

    tokio::time::sleep(IDLE * 3).await;

    assert_eq!(stalls.count(), 1);
    assert_eq!(stalls.last(), Some((100.0, "root".to_string())));
}

#[tokio::test]
async fn disposed_tree_stays_silent_when_children_finish() {
    let stalls = Arc::new(Stalls::default());
    let parent = root(5, &stalls);
    let child = parent.spawn(1, "child", None);

    parent.dispose();
    child.tick(None);
    assert!(child.is_done());
    assert!(!parent.is_idle_timer_armed());

    tokio::time::sleep(IDLE * 3).await;
    assert_eq!(stalls.count(), 0);
}

#[tokio::test]
async fn stalled_child_reports_through_root_callback() {
    let stalls = Arc::new(Stalls::default());
    let parent = root(5, &stalls);
    let child = parent.spawn(4, "child", None);
    child.tick(Some("child working"));

    tokio::time::sleep(IDLE * 3).await;

    assert_eq!(stalls.count(), 1);
    assert_eq!(stalls.last(), Some((25.0, "child working".to_string())));
}

#[tokio::test]
async fn concurrent_children_finish_and_resume_parent() {
    let stalls = Arc::new(Stalls::default());
    let parent = root(1, &stalls);

    let children: Vec<ProgressBar> = (0..4).map(|i| parent.spawn(5, format!("child {i}"), None)).collect();
    let tasks: Vec<_> = children
        .iter()
        .cloned()
        .map(|child| {
            tokio::spawn(async move {
                for _ in 0..5 {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    child.tick(None);
                }
            })
        })
        .collect();

    for result in futures_util::future::join_all(tasks).await {
        result.unwrap();
    }

    assert!(children.iter().all(ProgressBar::is_done));
    assert!(parent.is_idle_timer_armed());

    parent.tick(None);
    assert!(parent.is_done());
    assert!(!parent.is_idle_timer_armed());
    assert_eq!(stalls.count(), 0);
}
