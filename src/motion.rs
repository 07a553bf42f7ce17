//! Per-blob force integration: layered flow fields, orbiting vortices,
//! turbulence, buoyancy, gravity, friction. All forces are additive and
//! every path is total; positions wrap on the unit torus.

use rand::rngs::StdRng;
use rand::Rng;

use crate::blob::Blob;
use crate::config::SimConfig;
use crate::math::{torus_delta, wrap01, Vec2};

/// Advance one blob by `dt` seconds. `dt` is clamped so a stalled frame
/// cannot blow up the integration.
pub fn integrate(b: &mut Blob, t: f32, dt: f32, cfg: &SimConfig, rng: &mut StdRng) {
    let dt = dt.clamp(0.0, 0.1);
    let s = b.seed;
    let mut acc = Vec2::default();

    // Three layered flow fields, frequency and phase keyed by position,
    // time and the blob's own seed.
    acc.x += (b.pos.y * 7.3 + t * 0.40 + s).sin() * cfg.flow_strength;
    acc.y += (b.pos.x * 5.1 - t * 0.31 + s * 1.7).sin() * cfg.flow_strength * 0.7;
    acc.x += ((b.pos.x + b.pos.y) * 11.0 + t * 0.23 + s * 2.3).sin() * cfg.flow_strength * 0.5;

    // Three vortex centers drifting around the middle of the tank, spin
    // alternating so the flow stays chaotic rather than one big gyre.
    for k in 0..3 {
        let kf = k as f32;
        let center = Vec2::new(
            0.5 + 0.32 * (t * (0.11 + 0.05 * kf) + kf * 2.1).sin(),
            0.5 + 0.32 * (t * (0.09 + 0.04 * kf) + kf * 1.3).cos(),
        );
        let d = torus_delta(b.pos, center);
        let r = d.len();
        if r > 1e-5 && r < cfg.vortex_radius {
            let spin = if k % 2 == 0 { 1.0 } else { -1.0 };
            let f = (cfg.vortex_radius - r) * cfg.vortex_strength * spin;
            acc = acc.add(d.mul(1.0 / r).perp().mul(f));
        }
    }

    // Turbulence, stronger for small blobs.
    let jitter = cfg.turbulence / b.size.max(1e-3);
    acc.x += rng.gen_range(-1.0..1.0) * jitter;
    acc.y += rng.gen_range(-1.0..1.0) * jitter;

    // Buoyancy: three summed sinusoids of unrelated frequency give an
    // aperiodic bob; mid-life blobs push hardest, big blobs barely lift.
    let bob = (t * 0.9 + s).sin() + 0.6 * (t * 1.7 + s * 2.0).sin() + 0.8 * (t * 0.53 + s * 3.0).sin();
    let lift =
        cfg.buoyancy * (1.0 + 0.5 * bob) * (0.6 + 0.8 * b.activity()) / (1.0 + b.size * 6.0);
    acc.y -= lift;

    // Gravity drags big blobs down.
    acc.y += cfg.gravity * b.size;

    b.vel = b.vel.add(acc.mul(dt));
    b.vel = b.vel.mul((1.0 - cfg.friction * dt).clamp(0.0, 1.0));

    // Speed clamp for stability.
    let sp2 = b.vel.len2();
    if sp2 > cfg.max_speed * cfg.max_speed {
        b.vel = b.vel.mul(cfg.max_speed / sp2.sqrt());
    }

    b.pos.x = wrap01(b.pos.x + b.vel.x * dt);
    b.pos.y = wrap01(b.pos.y + b.vel.y * dt);
}
