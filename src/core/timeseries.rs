//! Bounded sliding window of recent classifications for charting.
//!
//! The window always holds [`CHART_CAPACITY`] slots. It starts filled with
//! empty slots and each accepted sample evicts the oldest one. Samples are
//! throttled to at most one per [`APPEND_INTERVAL_MS`].

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of slots kept for the chart.
pub const CHART_CAPACITY: usize = 60;

/// Minimum spacing between two appended samples.
pub const APPEND_INTERVAL_MS: i64 = 1000;

/// One chart slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSlot {
    /// Wall-clock label (`HH:MM:SS`), empty for unfilled slots
    pub label: String,
    /// 1 when the sample was good posture, 0 when bad, `None` if unfilled
    pub good: Option<u8>,
    /// 1 when the sample was bad posture, 0 when good, `None` if unfilled
    pub bad: Option<u8>,
}

impl ChartSlot {
    fn empty() -> Self {
        Self {
            label: String::new(),
            good: None,
            bad: None,
        }
    }
}

/// Three parallel arrays, as consumed by chart renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSnapshot {
    pub labels: Vec<String>,
    pub good: Vec<Option<u8>>,
    pub bad: Vec<Option<u8>>,
}

/// Fixed-capacity chart buffer.
#[derive(Debug, Clone)]
pub struct TimeSeriesWindow {
    slots: VecDeque<ChartSlot>,
    last_append: Option<DateTime<Utc>>,
    interval: Duration,
    timezone: Tz,
}

impl Default for TimeSeriesWindow {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl TimeSeriesWindow {
    /// Create an empty window whose labels are rendered in `timezone`.
    pub fn new(timezone: Tz) -> Self {
        Self {
            slots: std::iter::repeat_with(ChartSlot::empty)
                .take(CHART_CAPACITY)
                .collect(),
            last_append: None,
            interval: Duration::milliseconds(APPEND_INTERVAL_MS),
            timezone,
        }
    }

    /// Append a sample unless the previous one is less than a second old.
    ///
    /// Returns whether the sample was taken.
    pub fn append(&mut self, is_good_posture: bool, timestamp: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_append {
            if timestamp - last < self.interval {
                return false;
            }
        }

        self.slots.pop_front();
        self.slots.push_back(ChartSlot {
            label: self.label_for(timestamp),
            good: Some(u8::from(is_good_posture)),
            bad: Some(u8::from(!is_good_posture)),
        });
        self.last_append = Some(timestamp);
        true
    }

    /// Clear every slot and the throttle clock.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = ChartSlot::empty();
        }
        self.last_append = None;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots holding a sample.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.good.is_some()).count()
    }

    pub fn slots(&self) -> impl Iterator<Item = &ChartSlot> {
        self.slots.iter()
    }

    pub fn last_append(&self) -> Option<DateTime<Utc>> {
        self.last_append
    }

    pub fn snapshot(&self) -> ChartSnapshot {
        ChartSnapshot {
            labels: self.slots.iter().map(|s| s.label.clone()).collect(),
            good: self.slots.iter().map(|s| s.good).collect(),
            bad: self.slots.iter().map(|s| s.bad).collect(),
        }
    }

    fn label_for(&self, timestamp: DateTime<Utc>) -> String {
        timestamp
            .with_timezone(&self.timezone)
            .format("%H:%M:%S")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 22, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_starts_full_of_empty_slots() {
        let window = TimeSeriesWindow::default();
        assert_eq!(window.len(), CHART_CAPACITY);
        assert_eq!(window.filled(), 0);
        let snapshot = window.snapshot();
        assert!(snapshot.good.iter().all(|g| g.is_none()));
        assert!(snapshot.labels.iter().all(|l| l.is_empty()));
    }

    #[test]
    fn test_append_sets_exactly_one_flag() {
        let mut window = TimeSeriesWindow::default();
        assert!(window.append(true, t0()));
        assert!(window.append(false, t0() + Duration::seconds(1)));

        let slots: Vec<&ChartSlot> = window.slots().collect();
        let good = slots[CHART_CAPACITY - 2];
        let bad = slots[CHART_CAPACITY - 1];
        assert_eq!((good.good, good.bad), (Some(1), Some(0)));
        assert_eq!((bad.good, bad.bad), (Some(0), Some(1)));
        assert_eq!(good.label, "10:00:00");
        assert_eq!(bad.label, "10:00:01");
    }

    #[test]
    fn test_throttled_within_a_second() {
        let mut window = TimeSeriesWindow::default();
        assert!(window.append(true, t0()));
        assert!(!window.append(true, t0() + Duration::milliseconds(999)));
        assert!(window.append(true, t0() + Duration::milliseconds(1000)));
        assert_eq!(window.filled(), 2);
    }

    #[test]
    fn test_eviction_after_61_appends() {
        let mut window = TimeSeriesWindow::default();
        for i in 0..61 {
            assert!(window.append(i % 2 == 0, t0() + Duration::seconds(i)));
        }
        assert_eq!(window.len(), CHART_CAPACITY);
        assert_eq!(window.filled(), CHART_CAPACITY);

        let snapshot = window.snapshot();
        assert!(!snapshot.labels.contains(&"10:00:00".to_string()));
        assert_eq!(snapshot.labels.first().unwrap(), "10:00:01");
        assert_eq!(snapshot.labels.last().unwrap(), "10:01:00");
    }

    #[test]
    fn test_reset_clears_slots_and_throttle() {
        let mut window = TimeSeriesWindow::default();
        window.append(true, t0());
        window.reset();
        assert_eq!(window.filled(), 0);
        assert_eq!(window.len(), CHART_CAPACITY);
        assert!(window.last_append().is_none());
        // Throttle no longer blocks an immediate sample
        assert!(window.append(false, t0() + Duration::milliseconds(10)));
    }

    #[test]
    fn test_labels_use_timezone() {
        let mut window = TimeSeriesWindow::new(chrono_tz::Asia::Tokyo);
        window.append(true, t0());
        assert_eq!(window.snapshot().labels.last().unwrap(), "19:00:00");
    }
}
