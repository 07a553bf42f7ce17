//! Metaball field renderer: sums every blob's anisotropic falloff into a
//! per-cell scalar with the screen blend operator, smooths it, then maps
//! the result to a density-ordered glyph ramp and policy colors.
//!
//! This is the hot path, O(cells x blobs) per frame, so each blob only
//! touches the cells inside its bounding box and all scratch lives in flat
//! reusable buffers.

use crate::blob::Blob;
use crate::color::{normalize_hue, ColorPolicy};
use crate::config::SimConfig;
use crate::math::{torus_delta, Vec2};
use crate::system::BlobSystem;

/// One output cell. Hue is degrees, saturation/lightness percentages; the
/// front-end decides how that becomes terminal color.
#[derive(Clone, Copy, Debug)]
pub struct GridCell {
    pub glyph: char,
    pub hue: f32,
    pub sat: f32,
    pub light: f32,
}

impl GridCell {
    pub const BLANK: GridCell = GridCell {
        glyph: ' ',
        hue: 0.0,
        sat: 0.0,
        light: 0.0,
    };
}

pub struct Grid {
    w: usize,
    h: usize,
    cells: Vec<GridCell>,
}

impl Grid {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            cells: vec![GridCell::BLANK; w * h],
        }
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    /// Out-of-range coordinates read as blank, matching `set` dropping them.
    pub fn get(&self, x: usize, y: usize) -> &GridCell {
        if x < self.w && y < self.h {
            &self.cells[y * self.w + x]
        } else {
            &GridCell::BLANK
        }
    }

    pub fn set(&mut self, x: usize, y: usize, cell: GridCell) {
        if x < self.w && y < self.h {
            self.cells[y * self.w + x] = cell;
        }
    }
}

/// Screen blend: bounded in [0, 1] for any number of contributors, with 0
/// as the neutral element.
pub fn screen_blend(a: f32, b: f32) -> f32 {
    a + b - a * b
}

/// Metaball kernel: `(1 - d²)³` inside the unit radius, zero outside.
pub fn falloff(d: f32) -> f32 {
    if d < 1.0 {
        let u = 1.0 - d * d;
        u * u * u
    } else {
        0.0
    }
}

/// One blob's field sample at a point: the distance normalized against the
/// vertex-interpolated outline radius, and the kernel value scaled by
/// opacity.
pub fn sample(b: &Blob, at: Vec2) -> (f32, f32) {
    let d = torus_delta(b.pos, at);
    let dist = d.len();
    if dist <= 1e-6 {
        return (0.0, b.opacity());
    }
    let radius = b.radius_toward(d.y.atan2(d.x)).max(1e-4);
    let dn = dist / radius;
    (dn, falloff(dn) * b.opacity())
}

/// Density-ordered glyph ramp; brighter field values index further right.
const RAMP: [char; 10] = ['·', ':', ';', 'o', 'x', '%', '&', '#', '@', '█'];
/// Faint glyph for cells just below the visibility threshold.
const HAZE: char = '·';

/// Flat per-cell scratch reused across frames.
pub struct FieldPainter {
    value: Vec<f32>,
    depth: Vec<f32>,
    blur: Vec<f32>,
}

impl FieldPainter {
    pub fn new() -> Self {
        Self {
            value: Vec::new(),
            depth: Vec::new(),
            blur: Vec::new(),
        }
    }

    /// Paint `grid` from the current population. Mutates only `grid` and
    /// the painter's own scratch.
    pub fn render(
        &mut self,
        grid: &mut Grid,
        sys: &BlobSystem,
        policy: &dyn ColorPolicy,
        cfg: &SimConfig,
        time: f32,
    ) {
        let (w, h) = (grid.width(), grid.height());
        if w == 0 || h == 0 {
            return;
        }
        let n = w * h;
        self.value.clear();
        self.value.resize(n, 0.0);
        self.depth.clear();
        self.depth.resize(n, 1.0);
        self.blur.clear();
        self.blur.resize(n, 0.0);

        // Accumulate each blob over its bounding box only, wrapping cell
        // indices so influence crosses the torus seams.
        for (_, b) in sys.iter() {
            let r = b.max_radius();
            let cx = b.pos.x * w as f32;
            let cy = b.pos.y * h as f32;
            let rx = (r * w as f32).ceil() as i32 + 1;
            let ry = (r * h as f32).ceil() as i32 + 1;
            let x0 = cx.floor() as i32 - rx;
            let y0 = cy.floor() as i32 - ry;

            for gy in y0..=(cy.floor() as i32 + ry) {
                let iy = gy.rem_euclid(h as i32) as usize;
                let py = (gy as f32 + 0.5) / h as f32;
                for gx in x0..=(cx.floor() as i32 + rx) {
                    let ix = gx.rem_euclid(w as i32) as usize;
                    let px = (gx as f32 + 0.5) / w as f32;

                    let (dn, v) = sample(b, Vec2::new(px, py));
                    if v > 0.0 {
                        let idx = iy * w + ix;
                        self.value[idx] = screen_blend(self.value[idx], v);
                        if dn < self.depth[idx] {
                            self.depth[idx] = dn;
                        }
                    }
                }
            }
        }

        // Low-amplitude ambient glow, screened in like any other source.
        if cfg.glow > 0.0 {
            for iy in 0..h {
                let py = (iy as f32 + 0.5) / h as f32;
                for ix in 0..w {
                    let px = (ix as f32 + 0.5) / w as f32;
                    let g = cfg.glow
                        * (0.5 + 0.5 * (px * 4.1 + time * 0.4).sin() * (py * 3.3 - time * 0.27).sin());
                    let idx = iy * w + ix;
                    self.value[idx] = screen_blend(self.value[idx], g);
                }
            }
        }

        // One 3x3 weighted-neighbor pass, wrapped at the seams.
        for iy in 0..h {
            for ix in 0..w {
                let mut acc = 0.0;
                for (dy, row) in [(-1i32, [1.0f32, 2.0, 1.0]), (0, [2.0, 4.0, 2.0]), (1, [1.0, 2.0, 1.0])]
                {
                    let ny = (iy as i32 + dy).rem_euclid(h as i32) as usize;
                    for (k, wgt) in row.iter().enumerate() {
                        let nx = (ix as i32 + k as i32 - 1).rem_euclid(w as i32) as usize;
                        acc += self.value[ny * w + nx] * wgt;
                    }
                }
                self.blur[iy * w + ix] = acc / 16.0;
            }
        }

        // Glyph and color mapping.
        for iy in 0..h {
            let py = (iy as f32 + 0.5) / h as f32;
            for ix in 0..w {
                let px = (ix as f32 + 0.5) / w as f32;
                let idx = iy * w + ix;
                let v = self.blur[idx].clamp(0.0, 1.0);
                let depth = self.depth[idx];

                if v < cfg.visibility {
                    // Sparse haze just under the threshold, blank below.
                    if v > cfg.visibility * 0.45 {
                        let hue = policy.hue(px, py, depth, v, time);
                        grid.set(
                            ix,
                            iy,
                            GridCell {
                                glyph: HAZE,
                                hue: normalize_hue(hue),
                                sat: (policy.saturation() * 0.5).clamp(0.0, 100.0),
                                light: (policy.lightness() * 0.4).clamp(0.0, 100.0),
                            },
                        );
                    } else {
                        grid.set(ix, iy, GridCell::BLANK);
                    }
                    continue;
                }

                let t = ((v - cfg.visibility) / (1.0 - cfg.visibility)).clamp(0.0, 1.0);
                let gi = ((t * RAMP.len() as f32) as usize).min(RAMP.len() - 1);
                let hue = policy.hue(px, py, depth, v, time);
                // Cells deep inside a blob read brighter.
                let boost = (1.0 - depth.clamp(0.0, 1.0)) * 12.0;
                grid.set(
                    ix,
                    iy,
                    GridCell {
                        glyph: RAMP[gi],
                        hue: normalize_hue(hue),
                        sat: policy.saturation().clamp(0.0, 100.0),
                        light: (policy.lightness() * (0.6 + 0.4 * v) + boost).clamp(0.0, 100.0),
                    },
                );
            }
        }
    }
}

impl Default for FieldPainter {
    fn default() -> Self {
        Self::new()
    }
}
