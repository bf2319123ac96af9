//! Circular ray-cast sensor.
//!
//! A [`RaySensor`] casts `n_sensors` rays evenly spaced over a full turn from an observer pose
//! and reports, per ray, the distance to the nearest hit up to `max_range`. A ray that hits
//! nothing reports exactly `max_range`.
//!
//! The sensor does not know about target classes. Scenarios cast once per class (obstacles,
//! other agents of each kind) and merge the passes with [`nearest_by_class`].

use std::f64::consts::TAU;

use nalgebra::{Rotation2, Vector2};

use super::{BoundaryPolicy, Circle, Position, World, WorldError};

/// Observer pose: position and heading in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub position: Position,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            position: Position::new(x, y),
            heading,
        }
    }
}

impl From<super::EntityState> for Pose {
    fn from(value: super::EntityState) -> Self {
        Self {
            position: value.position,
            heading: value.heading.radians(),
        }
    }
}

/// What besides the explicit targets a cast may hit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CastOptions {
    /// Static obstacles and static entities of the world.
    pub include_static_obstacles: bool,
    /// The arena wall.
    pub include_boundary: bool,
}

impl CastOptions {
    pub const TARGETS_ONLY: Self = Self {
        include_static_obstacles: false,
        include_boundary: false,
    };

    pub const ENVIRONMENT: Self = Self {
        include_static_obstacles: true,
        include_boundary: true,
    };
}

#[derive(Clone, Debug, PartialEq)]
pub struct RaySensor {
    max_range: f64,
    relative_to_heading: bool,
    directions: Vec<Vector2<f64>>,
}

impl RaySensor {
    /// Ray `k` points at `k * 2π / n_sensors`, measured from the observer heading when
    /// `relative_to_heading` is set and from the +x axis otherwise.
    pub fn new(
        n_sensors: usize,
        max_range: f64,
        relative_to_heading: bool,
    ) -> Result<Self, WorldError> {
        if !(max_range.is_finite() && max_range >= 0.0) {
            return Err(WorldError::InvalidConfig(format!(
                "sensor range must be non-negative and finite, got {max_range}"
            )));
        }
        let increment = TAU / n_sensors.max(1) as f64;
        let directions = (0..n_sensors)
            .map(|k| {
                let (sin, cos) = (increment * k as f64).sin_cos();
                Vector2::new(cos, sin)
            })
            .collect();
        Ok(Self {
            max_range,
            relative_to_heading,
            directions,
        })
    }

    pub fn n_sensors(&self) -> usize {
        self.directions.len()
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    /// World-frame unit direction of every ray for an observer with the given heading.
    pub fn ray_directions(&self, heading: f64) -> Vec<Position> {
        let rotation = Rotation2::new(if self.relative_to_heading {
            heading
        } else {
            0.0
        });
        self.directions
            .iter()
            .map(|d| {
                let r = rotation * *d;
                Position::new(r.x, r.y)
            })
            .collect()
    }

    /// Distance to the nearest hit along each ray.
    ///
    /// Candidates are tested in order (`targets`, then static obstacles, then the boundary) and
    /// only a strictly nearer hit replaces the current one, so equal distances resolve to the
    /// earliest candidate.
    pub fn cast<B: BoundaryPolicy + Clone>(
        &self,
        world: &World<B>,
        pose: Pose,
        targets: &[Circle],
        options: CastOptions,
    ) -> Vec<f64> {
        let blocks = if options.include_static_obstacles {
            world.static_circles()
        } else {
            vec![]
        };

        self.ray_directions(pose.heading)
            .into_iter()
            .map(|direction| {
                let mut nearest = self.max_range;
                for circle in targets.iter().chain(&blocks) {
                    if let Some(t) =
                        circle.intersect_with_ray(pose.position, direction, self.max_range)
                    {
                        if t < nearest {
                            nearest = t;
                        }
                    }
                }
                if options.include_boundary {
                    if let Some(t) = world.boundary().intersect_with_ray(
                        pose.position,
                        direction,
                        self.max_range,
                    ) {
                        nearest = nearest.min(t);
                    }
                }
                nearest
            })
            .collect()
    }
}

/// Merges per-class passes of the same sensor into one class-tagged vector.
///
/// The result has `passes.len()` blocks of `n_sensors` slots each. For every ray only the slot
/// of the class with the nearest reading holds that reading; every other slot holds
/// `max_range`. Equal readings go to the earlier class.
pub fn nearest_by_class(passes: &[Vec<f64>], max_range: f64) -> Vec<f64> {
    let n_sensors = passes.first().map_or(0, Vec::len);
    let mut merged = vec![max_range; passes.len() * n_sensors];
    for k in 0..n_sensors {
        let nearest = passes
            .iter()
            .enumerate()
            .filter_map(|(class, pass)| pass.get(k).map(|&d| (class, d)))
            .fold(None, |best: Option<(usize, f64)>, (class, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((class, d)),
            });
        if let Some((class, d)) = nearest {
            merged[class * n_sensors + k] = d;
        }
    }
    merged
}
