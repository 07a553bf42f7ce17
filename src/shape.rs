//! Vertex-ring morphing and pulsation: the outline breathes and deforms
//! with a traveling wave so blobs never read as plain circles.

use rand::rngs::StdRng;
use rand::Rng;

use crate::blob::Blob;

/// Distances closer than this fraction of size to their target count as
/// arrived and get a fresh target.
const ARRIVE_EPS: f32 = 0.04;

pub fn morph(b: &mut Blob, t: f32, dt: f32, rng: &mut StdRng) {
    let dt = dt.clamp(0.0, 0.1);
    let size = b.size;
    let seed = b.seed;
    let reroll_p = b.morph_rate * b.activity() * dt;

    for v in &mut b.ring {
        let arrived = (v.dist - v.target).abs() < size * ARRIVE_EPS;
        if arrived || rng.gen::<f32>() < reroll_p {
            // Traveling deformation wave over the ring, plus per-target
            // variance, always resampled relative to the current size so
            // distances stay a bounded multiple of it.
            let wave = 1.0 + 0.25 * (v.angle * 3.0 + t * 1.3 + seed).sin();
            let target = size * wave * rng.gen_range(0.75..1.25);
            v.target = target.clamp(size * 0.55, size * 1.5);
        }
        let step = v.rate * dt;
        v.dist += (v.target - v.dist).clamp(-step, step);
    }

    // Breathing: three phase-shifted sinusoids summed, small amplitude.
    b.pulse_phase += b.pulse_rate * dt;
    let p = 0.06 * b.pulse_phase.sin()
        + 0.04 * (b.pulse_phase * 1.9 + 1.0).sin()
        + 0.05 * (b.pulse_phase * 0.7 + 2.0).sin();
    b.current_size = b.size * (1.0 + p);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use rand::SeedableRng;

    #[test]
    fn distances_stay_bounded_multiple_of_size() {
        let cfg = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(21);
        let mut b = Blob::spawn(&mut rng, &cfg);
        b.age = b.lifespan * 0.5;

        for i in 0..2000 {
            morph(&mut b, i as f32 * 0.016, 0.016, &mut rng);
            for v in &b.ring {
                assert!(v.dist > b.size * 0.3 && v.dist < b.size * 1.8);
                assert!(v.target >= b.size * 0.55 - 1e-6);
                assert!(v.target <= b.size * 1.5 + 1e-6);
            }
        }
    }

    #[test]
    fn pulsation_breathes_around_base_size() {
        let cfg = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(22);
        let mut b = Blob::spawn(&mut rng, &cfg);
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for i in 0..1000 {
            morph(&mut b, i as f32 * 0.016, 0.016, &mut rng);
            lo = lo.min(b.current_size);
            hi = hi.max(b.current_size);
        }
        assert!(lo < b.size && hi > b.size, "breathing should cross the base size");
        assert!(hi < b.size * 1.2 && lo > b.size * 0.8);
    }
}
