//! Progress bar management using indicatif
//!
//! All bars live under one MultiProgress so they render on separate lines. A disabled
//! manager hands out `None` and every stage treats that as "no progress output".

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ProgressManager {
    multi: Option<Arc<MultiProgress>>,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        let multi = enabled.then(|| Arc::new(MultiProgress::new()));
        Self { multi }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Bar counting chunk files written or read
    pub fn chunk_bar(&self, total: u64, label: &str) -> Option<ProgressBar> {
        let mp = self.multi.as_ref()?;
        let bar = mp.add(ProgressBar::new(total));
        bar.set_style(chunk_style());
        bar.set_prefix(label.to_string());
        Some(bar)
    }
}

fn chunk_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:24} {pos:>5}/{len:<5} [{bar:40}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█ ")
}
