// BaseStation - Sensor array telemetry ingestion
// Copyright (c) 2025 BaseStation contributors
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.

//! Downsampling aggregator
//!
//! The [`Downsampler`] buffers plotted values per sensor between ticks and
//! reduces each buffer to its arithmetic mean on [`Downsampler::tick`]. One
//! point per sensor per tick bounds both memory and rendering cost no matter
//! how fast readings arrive; resolution inside a tick interval is dropped on
//! purpose.

use std::collections::BTreeMap;

use crate::protocol::SensorId;

/// One reduced point ready for the rendering surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint<T> {
    /// Time the tick happened
    pub timestamp: T,
    /// Sensor the point belongs to
    pub sensor_id: SensorId,
    /// Mean of the values buffered since the previous tick
    pub value: f64,
}

impl<T> PlotPoint<T> {
    /// Series label used by the rendering surface
    pub fn label(&self) -> String {
        series_label(self.sensor_id)
    }
}

/// Series label for a sensor: `sensor12`
pub fn series_label(sensor_id: SensorId) -> String {
    format!("sensor{}", sensor_id)
}

/// Per-sensor sample buffers reduced to their mean on every tick
#[derive(Debug, Clone, Default)]
pub struct Downsampler {
    buffers: BTreeMap<SensorId, Vec<f64>>,
    ticks: u64,
}

impl Downsampler {
    /// Create an empty downsampler
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one value for `sensor_id`
    pub fn add(&mut self, sensor_id: SensorId, value: f64) {
        self.buffers.entry(sensor_id).or_default().push(value);
    }

    /// Reduce every non-empty buffer to one point and clear it
    ///
    /// Sensors with nothing buffered emit nothing. Points come out in
    /// ascending sensor order.
    pub fn tick<T: Copy>(&mut self, timestamp: T) -> Vec<PlotPoint<T>> {
        self.ticks += 1;
        let mut points = Vec::new();

        for (&sensor_id, values) in self.buffers.iter_mut() {
            if values.is_empty() {
                continue;
            }
            let value = values.iter().sum::<f64>() / values.len() as f64;
            values.clear();
            points.push(PlotPoint {
                timestamp,
                sensor_id,
                value,
            });
        }

        points
    }

    /// Number of buffered values for `sensor_id`
    pub fn pending(&self, sensor_id: SensorId) -> usize {
        self.buffers.get(&sensor_id).map_or(0, Vec::len)
    }

    /// Total buffered values across sensors
    pub fn total_pending(&self) -> usize {
        self.buffers.values().map(Vec::len).sum()
    }

    /// Sensors seen so far
    pub fn sensors(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.buffers.keys().copied()
    }

    /// Number of ticks performed
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Drop all buffered values without emitting them
    pub fn clear(&mut self) {
        for values in self.buffers.values_mut() {
            values.clear();
        }
    }
}
