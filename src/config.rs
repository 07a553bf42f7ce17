//! Simulation tunables, threaded explicitly into `tick` and `render` so the
//! core runs headless in tests without any terminal or input surface.

#[derive(Clone, Debug)]
pub struct SimConfig {
    // Population
    pub pop_floor: usize,
    pub pop_cap: usize,
    pub min_size: f32,
    pub max_size: f32,
    pub verts: usize,
    pub lifespan_min: f32,
    pub lifespan_max: f32,

    // Structural event timers (seconds between firings, each jittered)
    pub spawn_interval: f32,
    pub split_interval: f32,
    pub merge_interval: f32,
    pub resize_interval: f32,
    pub interval_jitter: f32,

    /// Minimum base size for a blob to be split-eligible.
    pub split_size: f32,

    // Forces
    pub flow_strength: f32,
    pub vortex_strength: f32,
    pub vortex_radius: f32,
    pub turbulence: f32,
    pub buoyancy: f32,
    pub gravity: f32,
    pub friction: f32,
    pub max_speed: f32,

    // Pairwise interaction
    pub interaction_scale: f32,
    pub attract: f32,
    pub repel: f32,

    // Renderer
    pub glow: f32,
    /// Field value below which a cell stays background.
    pub visibility: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pop_floor: 6,
            pop_cap: 14,
            min_size: 0.035,
            max_size: 0.14,
            verts: 8,
            lifespan_min: 18.0,
            lifespan_max: 40.0,

            spawn_interval: 2.5,
            split_interval: 7.0,
            merge_interval: 9.0,
            resize_interval: 5.0,
            interval_jitter: 0.35,

            split_size: 0.085,

            flow_strength: 0.05,
            vortex_strength: 0.9,
            vortex_radius: 0.35,
            turbulence: 0.0045,
            buoyancy: 0.035,
            gravity: 0.18,
            friction: 1.2,
            max_speed: 0.25,

            interaction_scale: 1.6,
            attract: 0.05,
            repel: 0.22,

            glow: 0.055,
            visibility: 0.08,
        }
    }
}

impl SimConfig {
    /// A config with every force zeroed, used by tests that need pure
    /// kinematics.
    #[cfg(test)]
    pub fn coasting() -> Self {
        Self {
            flow_strength: 0.0,
            vortex_strength: 0.0,
            turbulence: 0.0,
            buoyancy: 0.0,
            gravity: 0.0,
            friction: 0.0,
            ..Self::default()
        }
    }
}
