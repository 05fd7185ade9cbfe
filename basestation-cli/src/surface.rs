// BaseStation CLI - Serial base station command-line tool
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Terminal rendering surface
//!
//! Wraps a [`WindowSurface`] and spends the refresh budget sleeping, which
//! is what paces the driver loop when the device is quiet.

use std::thread;
use std::time::Duration;

use basestation::{RenderSurface, WindowSurface};
use chrono::{DateTime, Local};

/// Rendering surface that yields for the whole refresh budget
#[derive(Debug, Clone)]
pub struct PacedSurface {
    window: WindowSurface,
}

impl PacedSurface {
    /// Pace around `window`
    pub fn new(window: WindowSurface) -> Self {
        Self { window }
    }

    /// Underlying window
    pub fn window(&self) -> &WindowSurface {
        &self.window
    }
}

impl RenderSurface for PacedSurface {
    fn plot(&mut self, timestamp: DateTime<Local>, value: f64, label: &str) {
        self.window.plot(timestamp, value, label);
    }

    fn refresh(&mut self, budget: Duration) {
        self.window.refresh(budget);
        if !budget.is_zero() {
            thread::sleep(budget);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_plot_reaches_window() {
        let mut surface = PacedSurface::new(WindowSurface::new(Duration::from_secs(3600)));
        surface.plot(Local::now(), 1.25, "sensor4");
        assert_eq!(surface.window().series("sensor4").map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_refresh_spends_budget() {
        let mut surface = PacedSurface::new(WindowSurface::new(Duration::from_secs(60)));
        let start = Instant::now();
        surface.refresh(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
