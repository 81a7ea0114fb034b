//! Display formatting for gather progress and statistics.
//!
//! Front-ends (the CLI today) go through these helpers so progress bars,
//! countdowns and combination strings look the same everywhere.

use crate::{ElementId, GatherTiming};

/// Render a progress value (0..=100) as a fixed-width text bar.
///
/// Values above 100 are clamped.
///
/// # Examples
/// ```
/// use forage_types::formatting::format_progress_bar;
/// assert_eq!(format_progress_bar(0, 10), "[----------]   0%");
/// assert_eq!(format_progress_bar(50, 10), "[#####-----]  50%");
/// assert_eq!(format_progress_bar(100, 4), "[####] 100%");
/// assert_eq!(format_progress_bar(250, 4), "[####] 100%");
/// ```
pub fn format_progress_bar(progress: u8, width: usize) -> String {
    let progress = progress.min(100);
    let filled = usize::from(progress) * width / 100;
    let mut bar = String::with_capacity(width + 7);
    bar.push('[');
    bar.extend(std::iter::repeat_n('#', filled));
    bar.extend(std::iter::repeat_n('-', width - filled));
    bar.push(']');
    format!("{} {:>3}%", bar, progress)
}

/// Seconds left until a run at `progress` reaches 100 under `timing`.
///
/// # Examples
/// ```
/// use forage_types::GatherTiming;
/// use forage_types::formatting::remaining_secs;
/// let timing = GatherTiming::default();
/// assert_eq!(remaining_secs(0, &timing), 3.4);
/// assert_eq!(remaining_secs(99, &timing), 0.1);
/// assert_eq!(remaining_secs(100, &timing), 0.0);
/// ```
pub fn remaining_secs(progress: u8, timing: &GatherTiming) -> f32 {
    let left = 100u32.saturating_sub(u32::from(progress));
    if left == 0 {
        return 0.0;
    }
    let step = u32::from(timing.progress_step.max(1));
    let ticks = left.div_ceil(step);
    let ms = u64::from(ticks) * timing.tick_interval_ms;
    (ms as f32 / 100.0).round() / 10.0
}

/// Format a countdown in seconds with one decimal place.
///
/// Values <= 0 return the provided `zero_label`.
///
/// # Examples
/// ```
/// use forage_types::formatting::format_countdown;
/// assert_eq!(format_countdown(3.4, "Done"), "3.4s");
/// assert_eq!(format_countdown(0.0, "Done"), "Done");
/// ```
pub fn format_countdown(secs: f32, zero_label: &str) -> String {
    if secs <= 0.0 {
        return zero_label.to_string();
    }
    format!("{:.1}s", secs)
}

/// Join a combination into a readable `a + b + c` string.
///
/// # Examples
/// ```
/// use forage_types::ElementId;
/// use forage_types::formatting::format_combination;
/// let combo = vec![ElementId::from("fire"), ElementId::from("earth")];
/// assert_eq!(format_combination(&combo), "fire + earth");
/// assert_eq!(format_combination(&[]), "(none)");
/// ```
pub fn format_combination(elements: &[ElementId]) -> String {
    if elements.is_empty() {
        return "(none)".to_string();
    }
    elements
        .iter()
        .map(ElementId::as_str)
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Format a count with thousands separators.
///
/// # Examples
/// ```
/// use forage_types::formatting::format_thousands;
/// assert_eq!(format_thousands(0), "0");
/// assert_eq!(format_thousands(999), "999");
/// assert_eq!(format_thousands(1_500), "1,500");
/// assert_eq!(format_thousands(1_500_000), "1,500,000");
/// ```
pub fn format_thousands(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}
