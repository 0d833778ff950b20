//! Map geometry: integer grid points, distances and bounding areas.
//!
//! All positions live on the integer map grid the layout is authored in.
//! Distances are computed in `f64` and movement results are truncated back to
//! the grid.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// A position on the map grid.
pub type Point = Point2<i32>;

/// Shorthand constructor used heavily by layout tables.
pub fn pt(x: i32, y: i32) -> Point {
    Point::new(x, y)
}

/// Euclidean distance between two grid points.
pub fn distance(a: &Point, b: &Point) -> f64 {
    (a.cast::<f64>() - b.cast::<f64>()).norm()
}

/// True when `b` lies within `threshold` of `a` (inclusive).
pub fn within(a: &Point, b: &Point, threshold: f64) -> bool {
    distance(a, b) <= threshold
}

/// Moves `from` towards `to` by `step` units, truncating each axis toward
/// zero.
pub fn step_towards(from: &Point, to: &Point, step: f64) -> Point {
    let delta: Vector2<f64> = to.cast::<f64>() - from.cast::<f64>();
    let length = delta.norm();
    if length == 0.0 {
        return *from;
    }
    let moved = delta * (step / length);
    Point::new(from.x + moved.x as i32, from.y + moved.y as i32)
}

/// Facing of a wayside object on the map (screen coordinates, y grows down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Up,
    Down,
    #[default]
    Left,
    Right,
}

impl Facing {
    /// Offsets `origin` by `distance` units in this facing.
    pub fn offset(self, origin: &Point, distance: i32) -> Point {
        match self {
            Facing::Up => Point::new(origin.x, origin.y - distance),
            Facing::Down => Point::new(origin.x, origin.y + distance),
            Facing::Left => Point::new(origin.x - distance, origin.y),
            Facing::Right => Point::new(origin.x + distance, origin.y),
        }
    }
}

/// Axis-aligned box in map coordinates. `up <= down`, `left <= right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub up: i32,
    pub down: i32,
    pub left: i32,
    pub right: i32,
}

impl Area {
    /// Box covering two corner points, padded by `margin` on every side.
    pub fn spanning(a: &Point, b: &Point, margin: i32) -> Self {
        Self {
            up: a.y.min(b.y) - margin,
            down: a.y.max(b.y) + margin,
            left: a.x.min(b.x) - margin,
            right: a.x.max(b.x) + margin,
        }
    }

    /// Returns the box grown by `by` units on every side.
    pub fn expanded(&self, by: i32) -> Self {
        Self {
            up: self.up - by,
            down: self.down + by,
            left: self.left - by,
            right: self.right + by,
        }
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: &Point) -> bool {
        self.left <= p.x && p.x <= self.right && self.up <= p.y && p.y <= self.down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance() {
        assert_relative_eq!(distance(&pt(0, 0), &pt(3, 4)), 5.0);
        assert!(within(&pt(0, 0), &pt(3, 4), 5.0));
        assert!(!within(&pt(0, 0), &pt(3, 4), 4.9));
    }

    #[test]
    fn test_step_towards_truncates() {
        // 10 units along a 3-4-5 diagonal: (6, 8) exactly
        assert_eq!(step_towards(&pt(0, 0), &pt(30, 40), 10.0), pt(6, 8));
        // Truncation toward zero on negative axes
        assert_eq!(step_towards(&pt(0, 0), &pt(-30, -40), 7.0), pt(-4, -5));
        assert_eq!(step_towards(&pt(5, 5), &pt(5, 5), 10.0), pt(5, 5));
    }

    #[test]
    fn test_area_contains() {
        let area = Area::spanning(&pt(100, 50), &pt(60, 50), 5);
        assert_eq!(area, Area { up: 45, down: 55, left: 55, right: 105 });
        assert!(area.contains(&pt(55, 45)));
        assert!(!area.contains(&pt(54, 50)));
        assert!(area.expanded(15).contains(&pt(40, 70)));
    }

    #[test]
    fn test_facing_offset() {
        let origin = pt(100, 100);
        assert_eq!(Facing::Up.offset(&origin, 40), pt(100, 60));
        assert_eq!(Facing::Down.offset(&origin, 40), pt(100, 140));
        assert_eq!(Facing::Left.offset(&origin, 40), pt(60, 100));
        assert_eq!(Facing::Right.offset(&origin, 40), pt(140, 100));
    }
}
