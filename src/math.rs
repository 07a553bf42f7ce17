//! Small 2D vector plus torus helpers shared by the simulation modules.
//!
//! The blob domain is the unit square with wraparound on both axes, so
//! every distance here is the minimum-image one.

#[derive(Clone, Copy, Debug, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
    pub fn add(self, o: Vec2) -> Self {
        Self::new(self.x + o.x, self.y + o.y)
    }
    pub fn sub(self, o: Vec2) -> Self {
        Self::new(self.x - o.x, self.y - o.y)
    }
    pub fn mul(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k)
    }
    pub fn len2(self) -> f32 {
        self.x * self.x + self.y * self.y
    }
    pub fn len(self) -> f32 {
        self.len2().sqrt()
    }
    /// Counter-clockwise perpendicular.
    pub fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }
}

/// Wrap a coordinate into [0, 1).
pub fn wrap01(v: f32) -> f32 {
    let r = v.rem_euclid(1.0);
    if r >= 1.0 {
        0.0
    } else {
        r
    }
}

/// Shortest vector from `a` to `b` on the unit torus.
pub fn torus_delta(a: Vec2, b: Vec2) -> Vec2 {
    let mut d = b.sub(a);
    if d.x > 0.5 {
        d.x -= 1.0;
    } else if d.x < -0.5 {
        d.x += 1.0;
    }
    if d.y > 0.5 {
        d.y -= 1.0;
    } else if d.y < -0.5 {
        d.y += 1.0;
    }
    d
}

/// Minimum-image distance between `a` and `b` on the unit torus.
pub fn torus_dist(a: Vec2, b: Vec2) -> f32 {
    torus_delta(a, b).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_keeps_unit_range() {
        assert!(wrap01(1.25) - 0.25 < 1e-6);
        assert!(wrap01(-0.25) - 0.75 < 1e-6);
        assert_eq!(wrap01(0.0), 0.0);
        let w = wrap01(1.0);
        assert!((0.0..1.0).contains(&w));
    }

    #[test]
    fn torus_takes_short_way_round() {
        let a = Vec2::new(0.95, 0.5);
        let b = Vec2::new(0.05, 0.5);
        let d = torus_delta(a, b);
        assert!((d.x - 0.1).abs() < 1e-6);
        assert!(torus_dist(a, b) < 0.11);
    }
}
