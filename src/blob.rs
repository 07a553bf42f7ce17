//! The simulated soft entity: position, velocity, vertex ring, lifecycle
//! and color state. Everything here is plain data; the motion, shape and
//! color modules drive it and `system` owns the collection.

use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::SimConfig;
use crate::math::Vec2;

/// Opaque handle into the system's slot arena. The generation counter makes
/// stale handles (a blob removed earlier in the same tick) detectable in
/// O(1) without any collision risk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlobId {
    pub(crate) slot: usize,
    pub(crate) gen: u32,
}

/// One radius sample of the outline. `angle` never changes after creation;
/// `dist` chases `target` at most `rate` units per second.
#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub angle: f32,
    pub dist: f32,
    pub target: f32,
    pub rate: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifeStage {
    FadingIn,
    Active,
    FadingOut,
}

#[derive(Clone, Debug)]
pub struct Blob {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Base size; bounded by the config at every mutation site.
    pub size: f32,
    /// Base size scaled by the breathing pulsation.
    pub current_size: f32,
    pub ring: Vec<Vertex>,
    pub age: f32,
    pub lifespan: f32,

    pub hue: f32,
    pub sat: f32,
    pub light: f32,
    pub target_sat: f32,
    pub target_light: f32,
    pub hue_shift: f32,

    pub pulse_phase: f32,
    pub pulse_rate: f32,
    pub morph_rate: f32,
    /// Per-blob phase offset keyed into every sinusoid, so no two blobs
    /// ride the same wave.
    pub seed: f32,
}

impl Blob {
    pub fn spawn(rng: &mut StdRng, cfg: &SimConfig) -> Self {
        let size = rng.gen_range(cfg.min_size..cfg.max_size * 0.8);
        Self {
            pos: Vec2::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)),
            vel: Vec2::new(rng.gen_range(-0.02..0.02), rng.gen_range(-0.02..0.02)),
            size,
            current_size: size,
            ring: make_ring(rng, size, cfg.verts),
            age: 0.0,
            lifespan: rng.gen_range(cfg.lifespan_min..cfg.lifespan_max),
            hue: rng.gen_range(0.0..360.0),
            sat: 70.0,
            light: 55.0,
            target_sat: 70.0,
            target_light: 55.0,
            hue_shift: rng.gen_range(-14.0..14.0),
            pulse_phase: rng.gen_range(0.0..TAU),
            pulse_rate: rng.gen_range(0.8..2.2),
            morph_rate: rng.gen_range(0.4..1.4),
            seed: rng.gen_range(0.0..TAU * 4.0),
        }
    }

    /// Age normalized by lifespan, in [0, 1].
    pub fn life(&self) -> f32 {
        if self.lifespan <= 0.0 {
            1.0
        } else {
            (self.age / self.lifespan).clamp(0.0, 1.0)
        }
    }

    pub fn stage(&self) -> LifeStage {
        let life = self.life();
        if life < 0.1 {
            LifeStage::FadingIn
        } else if life > 0.9 {
            LifeStage::FadingOut
        } else {
            LifeStage::Active
        }
    }

    /// Fade in over the first tenth of life, out over the last.
    pub fn opacity(&self) -> f32 {
        let life = self.life();
        let o = if life < 0.1 {
            life / 0.1
        } else if life > 0.9 {
            (1.0 - life) / 0.1
        } else {
            1.0
        };
        o.clamp(0.0, 1.0)
    }

    /// Behavior-intensity curve: peaks mid-lifespan, zero at both ends.
    pub fn activity(&self) -> f32 {
        let u = 2.0 * self.life() - 1.0;
        (1.0 - u * u).max(0.0)
    }

    pub fn mid_life(&self) -> bool {
        let life = self.life();
        (0.25..=0.75).contains(&life)
    }

    /// Outline radius toward `angle`, by linear interpolation between the
    /// two ring vertices bounding that direction. Scaled by the current
    /// pulsation so the rendered surface breathes with the blob.
    pub fn radius_toward(&self, angle: f32) -> f32 {
        let n = self.ring.len();
        if n == 0 {
            return self.current_size;
        }
        let sector = angle.rem_euclid(TAU) / (TAU / n as f32);
        let i = (sector.floor() as usize) % n;
        let frac = sector - sector.floor();
        let a = self.ring[i].dist;
        let b = self.ring[(i + 1) % n].dist;
        let base = a + (b - a) * frac;
        base * (self.current_size / self.size.max(1e-5))
    }

    /// Conservative bound on the outline, used for render bounding boxes.
    pub fn max_radius(&self) -> f32 {
        let ring_max = self
            .ring
            .iter()
            .map(|v| v.dist.max(v.target))
            .fold(self.current_size, f32::max);
        ring_max * 1.2
    }

    /// Re-aim every vertex at the (possibly changed) base size.
    pub fn reset_targets(&mut self, rng: &mut StdRng) {
        for v in &mut self.ring {
            v.target = self.size * rng.gen_range(0.85..1.15);
            v.rate = self.size * rng.gen_range(0.4..1.0);
        }
    }
}

pub fn make_ring(rng: &mut StdRng, size: f32, n: usize) -> Vec<Vertex> {
    (0..n)
        .map(|i| {
            let dist = size * rng.gen_range(0.85..1.15);
            Vertex {
                angle: i as f32 * TAU / n as f32,
                dist,
                target: size * rng.gen_range(0.85..1.15),
                rate: size * rng.gen_range(0.4..1.0),
            }
        })
        .collect()
}

/// A child's ring: same angles and length as the parent's, distances
/// rescaled to the child size with a little variation.
pub fn inherit_ring(parent: &[Vertex], old_size: f32, new_size: f32, rng: &mut StdRng) -> Vec<Vertex> {
    let scale = new_size / old_size.max(1e-5);
    parent
        .iter()
        .map(|v| Vertex {
            angle: v.angle,
            dist: v.dist * scale * rng.gen_range(0.9..1.1),
            target: v.target * scale * rng.gen_range(0.9..1.1),
            rate: new_size * rng.gen_range(0.4..1.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn opacity_ramps_with_life() {
        let mut rng = StdRng::seed_from_u64(3);
        let cfg = SimConfig::default();
        let mut b = Blob::spawn(&mut rng, &cfg);
        b.lifespan = 10.0;

        b.age = 0.0;
        assert_eq!(b.opacity(), 0.0);
        assert_eq!(b.stage(), LifeStage::FadingIn);

        b.age = 0.5;
        assert!((b.opacity() - 0.5).abs() < 1e-6);

        b.age = 5.0;
        assert_eq!(b.opacity(), 1.0);
        assert_eq!(b.stage(), LifeStage::Active);

        b.age = 9.5;
        assert!((b.opacity() - 0.5).abs() < 1e-6);
        assert_eq!(b.stage(), LifeStage::FadingOut);

        b.age = 10.0;
        assert_eq!(b.opacity(), 0.0);
    }

    #[test]
    fn ring_radius_interpolates_between_vertices() {
        let mut rng = StdRng::seed_from_u64(4);
        let cfg = SimConfig::default();
        let mut b = Blob::spawn(&mut rng, &cfg);
        for v in &mut b.ring {
            v.dist = b.size;
        }
        b.current_size = b.size;
        // Uniform ring: every direction reads the same radius.
        for k in 0..16 {
            let a = k as f32 * TAU / 16.0;
            assert!((b.radius_toward(a) - b.size).abs() < 1e-5);
        }
    }

    #[test]
    fn inherited_ring_keeps_length_and_scales() {
        let mut rng = StdRng::seed_from_u64(5);
        let cfg = SimConfig::default();
        let b = Blob::spawn(&mut rng, &cfg);
        let child = inherit_ring(&b.ring, b.size, b.size * 0.6, &mut rng);
        assert_eq!(child.len(), b.ring.len());
        for (p, c) in b.ring.iter().zip(&child) {
            assert_eq!(p.angle, c.angle);
            assert!(c.dist < p.dist);
        }
    }
}
