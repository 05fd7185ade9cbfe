// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Rendering surface contract
//!
//! The pipeline hands reduced points to a [`RenderSurface`] and gives it a
//! short, bounded slot each iteration to refresh. Nothing in the pipeline
//! depends on what the surface does with either call, so everything runs
//! headless in tests.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Local};

/// Consumer of aggregated points
pub trait RenderSurface {
    /// Add one point to the series named `label`
    fn plot(&mut self, timestamp: DateTime<Local>, value: f64, label: &str);

    /// Let the surface redraw; must return within roughly `budget`
    fn refresh(&mut self, budget: Duration);
}

/// Surface that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn plot(&mut self, _timestamp: DateTime<Local>, _value: f64, _label: &str) {}

    fn refresh(&mut self, _budget: Duration) {}
}

/// Surface that records every call, for tests
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    /// Points in arrival order: (timestamp, value, label)
    pub points: Vec<(DateTime<Local>, f64, String)>,
    /// Number of refresh calls
    pub refreshes: usize,
}

impl MemorySurface {
    /// Create an empty surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Points plotted for `label`
    pub fn series(&self, label: &str) -> Vec<f64> {
        self.points
            .iter()
            .filter(|(_, _, l)| l == label)
            .map(|(_, v, _)| *v)
            .collect()
    }
}

impl RenderSurface for MemorySurface {
    fn plot(&mut self, timestamp: DateTime<Local>, value: f64, label: &str) {
        self.points.push((timestamp, value, label.to_string()));
    }

    fn refresh(&mut self, _budget: Duration) {
        self.refreshes += 1;
    }
}

/// Points of one series inside a sliding time range
///
/// After each append, leading points are dropped while the *second* point
/// is already older than `latest - range`. One point therefore always stays
/// just outside the window so the line runs off the left edge instead of
/// starting mid-screen.
#[derive(Debug, Clone)]
pub struct SeriesWindow {
    range: chrono::Duration,
    times: Vec<DateTime<Local>>,
    values: Vec<f64>,
}

impl SeriesWindow {
    /// Create a window covering `range`
    pub fn new(range: Duration) -> Self {
        Self {
            range: chrono::Duration::from_std(range)
                .unwrap_or_else(|_| chrono::Duration::days(36_500)),
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append a point and trim what scrolled off
    pub fn push(&mut self, timestamp: DateTime<Local>, value: f64) {
        self.times.push(timestamp);
        self.values.push(value);

        let cutoff = timestamp.checked_sub_signed(self.range);
        let Some(cutoff) = cutoff else {
            return;
        };
        let mut drop = 0;
        while self.times.len() - drop > 1 && self.times[drop + 1] < cutoff {
            drop += 1;
        }
        if drop > 0 {
            self.times.drain(..drop);
            self.values.drain(..drop);
        }
    }

    /// Number of retained points
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether no point is retained
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Most recent point
    pub fn latest(&self) -> Option<(DateTime<Local>, f64)> {
        self.times.last().copied().zip(self.values.last().copied())
    }

    /// Visible x-range ending at the latest point
    pub fn x_limits(&self) -> Option<(DateTime<Local>, DateTime<Local>)> {
        let end = *self.times.last()?;
        Some((end.checked_sub_signed(self.range)?, end))
    }

    /// Retained values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Retained timestamps
    pub fn times(&self) -> &[DateTime<Local>] {
        &self.times
    }
}

/// Windowed surface that logs a one-line summary per series on refresh
#[derive(Debug, Clone)]
pub struct WindowSurface {
    range: Duration,
    series: BTreeMap<String, SeriesWindow>,
    reference_lines: Vec<f64>,
    dirty: bool,
}

impl WindowSurface {
    /// Create a surface showing the last `range`
    pub fn new(range: Duration) -> Self {
        Self {
            range,
            series: BTreeMap::new(),
            reference_lines: Vec::new(),
            dirty: false,
        }
    }

    /// Draw horizontal reference lines (e.g. the good band)
    pub fn with_reference_lines(mut self, lines: impl IntoIterator<Item = f64>) -> Self {
        self.reference_lines = lines.into_iter().collect();
        self
    }

    /// Series by label
    pub fn series(&self, label: &str) -> Option<&SeriesWindow> {
        self.series.get(label)
    }

    /// Series labels in order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Summary of every series' latest value
    pub fn summary(&self) -> String {
        let (low, high) = match self.reference_lines.as_slice() {
            [low, .., high] => (Some(*low), Some(*high)),
            _ => (None, None),
        };
        self.series
            .iter()
            .filter_map(|(label, window)| {
                let (_, value) = window.latest()?;
                let outside = low.is_some_and(|l| value < l) || high.is_some_and(|h| value > h);
                let mark = if outside { " !" } else { "" };
                Some(format!("{}={:.3}{} ({} pts)", label, value, mark, window.len()))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl RenderSurface for WindowSurface {
    fn plot(&mut self, timestamp: DateTime<Local>, value: f64, label: &str) {
        let range = self.range;
        self.series
            .entry(label.to_string())
            .or_insert_with(|| SeriesWindow::new(range))
            .push(timestamp, value);
        self.dirty = true;
    }

    fn refresh(&mut self, _budget: Duration) {
        if self.dirty {
            log::info!("plot: {}", self.summary());
            self.dirty = false;
        }
    }
}
