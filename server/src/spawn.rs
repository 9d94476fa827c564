//! Spawn points handed out by the authority

use rand::Rng;
use shared::sinks::SpawnProvider;
use shared::SpawnPoint;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cycles through a fixed set of spawn points
#[derive(Debug)]
pub struct SpawnRing {
    points: Vec<SpawnPoint>,
    next: AtomicUsize,
    yaw_jitter: f32,
}

impl SpawnRing {
    pub fn new(points: Vec<SpawnPoint>) -> Self {
        Self {
            points,
            next: AtomicUsize::new(0),
            yaw_jitter: 0.0,
        }
    }

    /// `count` points evenly spaced on a circle, each facing the centre
    pub fn arena(count: usize, radius: f32) -> Self {
        let points = (0..count)
            .map(|i| {
                let angle = std::f32::consts::TAU * i as f32 / count as f32;
                let yaw = (angle.to_degrees() + 180.0) % 360.0;
                SpawnPoint::new((radius * angle.cos(), 0.0, radius * angle.sin()), yaw)
            })
            .collect();

        Self::new(points)
    }

    /// Randomly turns each handed-out point by up to `degrees` either way
    pub fn with_yaw_jitter(mut self, degrees: f32) -> Self {
        self.yaw_jitter = degrees.abs();
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl SpawnProvider for SpawnRing {
    fn spawn_point(&self) -> SpawnPoint {
        if self.points.is_empty() {
            return SpawnPoint::default();
        }

        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.points.len();
        let mut point = self.points[index];

        if self.yaw_jitter > 0.0 {
            point.yaw += rand::thread_rng().gen_range(-self.yaw_jitter..=self.yaw_jitter);
        }

        point
    }
}
