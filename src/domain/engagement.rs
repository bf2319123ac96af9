//! Relative observation of one posed entity by another.
//!
//! Features are normalised into `[-1, 1]`. Visibility is carried by `Option` and the `-1`
//! sentinel only appears when converting to a flat feature vector.

use std::f64::consts::PI;

use nalgebra::{Rotation2, Vector2};

use super::{euclidean_distance, normalize_angle, remap, wrapped_difference, EntityState};

/// Sentinel written into feature vectors for a target that is not visible.
pub const NOT_VISIBLE: f64 = -1.0;

/// Bearing and distance from an observer to a target.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Engagement {
    /// Ego-frame angle to the target divided by `π`: `0` straight ahead, positive to the left.
    pub bearing: f64,
    /// Distance divided by the normalisation factor, clamped to `[0, 1]`.
    pub distance: f64,
}

impl Engagement {
    /// `None` when the target is strictly farther than `observation_limit`. A target exactly at
    /// the limit is visible.
    pub fn between(
        observer: &EntityState,
        target: &EntityState,
        observation_limit: f64,
        dist_norm_factor: f64,
    ) -> Option<Self> {
        let distance = euclidean_distance(observer.position, target.position);
        if distance > observation_limit {
            return None;
        }

        let bearing = if distance > 0.0 {
            let offset = target.position - observer.position;
            let ego = Rotation2::new(-observer.heading.radians())
                * Vector2::new(offset.x(), offset.y());
            normalize_angle(ego.y.atan2(ego.x)) / PI
        } else {
            0.0
        };

        Some(Self {
            bearing,
            distance: remap(distance, 0.0, dist_norm_factor, 0.0, 1.0),
        })
    }

    pub fn features(engagement: Option<Self>) -> [f64; 2] {
        match engagement {
            Some(e) => [e.bearing, e.distance],
            None => [NOT_VISIBLE, NOT_VISIBLE],
        }
    }
}

/// Change of an [`Engagement`] between two consecutive steps.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EngagementRate {
    pub bearing_rate: f64,
    pub range_rate: f64,
}

impl EngagementRate {
    /// Requires the target to be visible in both steps.
    ///
    /// `max_rate` is the largest normalised distance change possible in one step; the range rate
    /// is rescaled from `[-max_rate, max_rate]` into `[-1, 1]`.
    pub fn between(
        current: Option<Engagement>,
        previous: Option<Engagement>,
        max_rate: f64,
    ) -> Option<Self> {
        let (current, previous) = (current?, previous?);
        Some(Self {
            bearing_rate: wrapped_difference(current.bearing, previous.bearing),
            range_rate: remap(
                current.distance - previous.distance,
                -max_rate,
                max_rate,
                -1.0,
                1.0,
            ),
        })
    }

    pub fn features(rate: Option<Self>) -> [f64; 2] {
        match rate {
            Some(r) => [r.bearing_rate, r.range_rate],
            None => [NOT_VISIBLE, NOT_VISIBLE],
        }
    }
}
