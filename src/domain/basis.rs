//! Basic building blocks: points, angles, velocities and the normalisation helpers used when
//! building observation vectors.

use std::{
    f64::consts::{PI, TAU},
    ops::{Add, Mul, Neg, Sub},
};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Position {
    x: f64,
    y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn distance(&self, position: Self) -> f64 {
        euclidean_distance(*self, position)
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(&self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn rotate_vector(&self, angle: Angle) -> Position {
        let (sin, cos) = angle.0.sin_cos();
        Position::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Position> for (f64, f64) {
    fn from(value: Position) -> Self {
        (value.x, value.y)
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f64> for Position {
    type Output = Position;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// Angle in radians. The stored value is not wrapped; use [`Angle::normalized`] to bring it into
/// `(-π, π]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub const fn new(radians: f64) -> Self {
        Self(radians)
    }

    pub fn radians(self) -> f64 {
        self.0
    }

    pub fn normalized(self) -> Self {
        Self(normalize_angle(self.0))
    }

    /// Unit vector pointing along the angle.
    pub fn direction(self) -> Position {
        let (sin, cos) = self.0.sin_cos();
        Position::new(cos, sin)
    }
}

impl Neg for Angle {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Angle(-self.0)
    }
}

impl Add for Angle {
    type Output = Angle;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl From<Angle> for f64 {
    fn from(value: Angle) -> Self {
        value.0
    }
}

/// Linear velocity in world units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Velocity {
    x: f64,
    y: f64,
}

impl Velocity {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn from_heading(speed: f64, heading: Angle) -> Self {
        let (x, y) = velocity_from_heading(speed, heading.0);
        Self { x, y }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn speed(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Displacement covered over `dt` seconds.
    pub fn displacement(&self, dt: f64) -> Position {
        Position::new(self.x * dt, self.y * dt)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Velocity {
    type Output = Velocity;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl From<Velocity> for (f64, f64) {
    fn from(value: Velocity) -> Self {
        (value.x, value.y)
    }
}

/// Wraps an angle into `(-π, π]`.
///
/// Values already inside the interval are returned unchanged, and large multiples of `2π` are
/// reduced with a single floating point remainder rather than a loop. Non-finite input yields
/// NaN.
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle % TAU;
    if wrapped > PI {
        wrapped - TAU
    } else if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Difference `current - previous` of two angles expressed in units of `π` (i.e. values in
/// `[-1, 1]`), wrapped so that crossing `±π` does not produce a jump of `2`.
pub fn wrapped_difference(current: f64, previous: f64) -> f64 {
    normalize_angle((current - previous) * PI) / PI
}

/// Affine rescale of `value` from `[src_lo, src_hi]` to `[dst_lo, dst_hi]`.
///
/// Values outside the source interval are clamped to it first, so the result always lies in
/// the destination interval. A degenerate source interval maps everything to `dst_lo`.
pub fn remap(value: f64, src_lo: f64, src_hi: f64, dst_lo: f64, dst_hi: f64) -> f64 {
    let span = src_hi - src_lo;
    if span.abs() <= f64::EPSILON {
        return dst_lo;
    }
    let clamped = value.clamp(src_lo.min(src_hi), src_lo.max(src_hi));
    dst_lo + (clamped - src_lo) / span * (dst_hi - dst_lo)
}

/// Standard 2-norm distance. Coincident points give exactly `0.0`; callers dividing by the
/// result must guard against that themselves.
pub fn euclidean_distance(p: Position, q: Position) -> f64 {
    ((p.x - q.x).powi(2) + (p.y - q.y).powi(2)).sqrt()
}

pub fn velocity_from_heading(speed: f64, heading: f64) -> (f64, f64) {
    (speed * heading.cos(), speed * heading.sin())
}
