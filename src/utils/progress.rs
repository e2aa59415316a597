//! Phase progress that becomes no-op when the `progress` feature is disabled.
//!
//! Build phases run under [`run_phase`]: the work stays on the calling
//! thread while a ticker thread re-renders a status line every 500 ms
//! from shared counters. Shutdown is a rendezvous, so a finished phase
//! never leaves a ticker behind.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::Result;

#[cfg(feature = "progress")]
pub use indicatif::{ProgressBar, ProgressStyle};

#[cfg(not(feature = "progress"))]
pub use self::noop::*;

const TICK: Duration = Duration::from_millis(500);

/// Runs `work` with a live status spinner labelled `label`.
///
/// `render` is called from the ticker thread on every tick and once
/// more for the final line, so it must read only shared counters.
pub fn run_phase<T>(
    label: &str,
    render: impl Fn() -> String + Sync,
    work: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {prefix:>8} {msg}").unwrap());
    bar.set_prefix(label.to_string());

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let result = thread::scope(|scope| {
        let bar = &bar;
        let render = &render;
        let ticker = scope.spawn(move || {
            loop {
                match done_rx.recv_timeout(TICK) {
                    Err(mpsc::RecvTimeoutError::Timeout) => bar.set_message(render()),
                    _ => break,
                }
            }
        });
        let result = work();
        let _ = done_tx.send(());
        let _ = ticker.join();
        result
    });
    bar.finish_with_message(render());
    result
}

/// 1024-based human unit with one decimal, as in `3.2M`.
pub fn format_unit(value: u64) -> String {
    let mut v = value as f64;
    for unit in ["", "K", "M", "G", "T"] {
        if v < 1024.0 {
            return format!("{v:.1}{unit}");
        }
        v /= 1024.0;
    }
    format!("{v:.1}P")
}

#[cfg(not(feature = "progress"))]
mod noop {
    /// No-op progress bar when the `progress` feature is disabled.
    #[derive(Clone)]
    pub struct ProgressBar;

    impl ProgressBar {
        pub fn new_spinner() -> Self {
            ProgressBar
        }

        pub fn set_style(&self, _style: ProgressStyle) {}
        pub fn set_prefix(&self, _prefix: impl Into<std::borrow::Cow<'static, str>>) {}
        pub fn set_message(&self, _msg: impl Into<std::borrow::Cow<'static, str>>) {}
        pub fn finish_with_message(&self, _msg: impl Into<std::borrow::Cow<'static, str>>) {}
    }

    /// No-op progress style.
    pub struct ProgressStyle;

    impl ProgressStyle {
        pub fn with_template(_template: &str) -> Result<Self, std::convert::Infallible> {
            Ok(ProgressStyle)
        }
    }
}
