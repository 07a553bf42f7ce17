use std::io::{self, Write};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, DisableLineWrap, EnableLineWrap, EndSynchronizedUpdate,
        EnterAlternateScreen, LeaveAlternateScreen,
    },
};

mod blob;
mod color;
mod config;
mod field;
mod math;
mod motion;
mod shape;
mod system;

use blob::LifeStage;
use color::{normalize_hue, ColorPolicy};
use config::SimConfig;
use field::{FieldPainter, Grid};
use system::BlobSystem;

#[derive(Parser, Debug)]
struct Args {
    /// RNG seed (defaults to the clock)
    #[arg(long)]
    seed: Option<u64>,

    /// frame rate cap
    #[arg(long, default_value_t = 30)]
    fps: u64,

    /// maximum blob population
    #[arg(long, default_value_t = 14)]
    cap: usize,

    /// starting palette index (0..=3)
    #[arg(long, default_value_t = 0)]
    palette: usize,

    /// start with the HUD hidden
    #[arg(long)]
    no_hud: bool,
}

/// A named color scheme. The simulation only ever sees the trait.
struct Palette {
    name: &'static str,
    base_hue: f32,
    span: f32,
    sat: f32,
    light: f32,
}

impl ColorPolicy for Palette {
    fn hue(&self, x: f32, y: f32, dist: f32, value: f32, time: f32) -> f32 {
        let wave = (x * 3.1 + time * 0.21).sin() + (y * 2.7 - time * 0.17).cos();
        normalize_hue(self.base_hue + self.span * (0.5 * wave + value - 0.5) - dist * 10.0)
    }
    fn saturation(&self) -> f32 {
        self.sat
    }
    fn lightness(&self) -> f32 {
        self.light
    }
}

static PALETTES: [Palette; 4] = [
    Palette { name: "wax", base_hue: 18.0, span: 40.0, sat: 85.0, light: 55.0 },
    Palette { name: "ocean", base_hue: 200.0, span: 50.0, sat: 75.0, light: 52.0 },
    Palette { name: "ember", base_hue: 350.0, span: 35.0, sat: 80.0, light: 50.0 },
    Palette { name: "ultraviolet", base_hue: 275.0, span: 45.0, sat: 70.0, light: 58.0 },
];

/// h in degrees, s and l in percent.
fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (u8, u8, u8) {
    let s = (s / 100.0).clamp(0.0, 1.0);
    let l = (l / 100.0).clamp(0.0, 1.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let q = |v: f32| -> u8 { ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8 };
    (q(r), q(g), q(b))
}

#[derive(Clone, Copy, PartialEq)]
struct TermCell {
    ch: char,
    fg: (u8, u8, u8),
}

const BLANK_CELL: TermCell = TermCell {
    ch: ' ',
    fg: (0, 0, 0),
};

/// Diffed double buffer: only cells that changed since the last frame are
/// written out.
struct Screen {
    w: u16,
    h: u16,
    prev: Vec<TermCell>,
    next: Vec<TermCell>,
}

impl Screen {
    fn new(w: u16, h: u16) -> Self {
        let n = w as usize * h as usize;
        Self {
            w,
            h,
            prev: vec![
                TermCell {
                    ch: '\u{0}',
                    fg: (0, 0, 0),
                };
                n
            ],
            next: vec![BLANK_CELL; n],
        }
    }

    fn resize(&mut self, w: u16, h: u16) {
        if self.w != w || self.h != h {
            *self = Self::new(w, h);
        }
    }

    fn set(&mut self, x: u16, y: u16, cell: TermCell) {
        if x < self.w && y < self.h {
            self.next[y as usize * self.w as usize + x as usize] = cell;
        }
    }

    fn flush<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let mut last_fg: Option<(u8, u8, u8)> = None;
        for y in 0..self.h {
            for x in 0..self.w {
                let i = y as usize * self.w as usize + x as usize;
                if self.prev[i] == self.next[i] {
                    continue;
                }
                queue!(out, cursor::MoveTo(x, y))?;
                let cell = self.next[i];
                if last_fg != Some(cell.fg) {
                    queue!(
                        out,
                        SetForegroundColor(Color::Rgb {
                            r: cell.fg.0,
                            g: cell.fg.1,
                            b: cell.fg.2,
                        })
                    )?;
                    last_fg = Some(cell.fg);
                }
                queue!(out, Print(cell.ch))?;
            }
        }
        std::mem::swap(&mut self.prev, &mut self.next);
        for c in &mut self.next {
            *c = BLANK_CELL;
        }
        Ok(())
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed)
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let mut seed = args.seed.unwrap_or_else(clock_seed);
    let mut palette_idx = args.palette % PALETTES.len();
    let mut show_hud = !args.no_hud;
    let mut paused = false;

    let mut cfg = SimConfig {
        pop_cap: args.cap.max(2),
        ..SimConfig::default()
    };
    cfg.pop_floor = cfg.pop_floor.min(cfg.pop_cap);

    let mut sys = BlobSystem::new(seed);
    let mut painter = FieldPainter::new();

    let mut out = io::stdout();
    execute!(out, EnterAlternateScreen, DisableLineWrap, cursor::Hide)?;
    terminal::enable_raw_mode()?;

    let mut size = terminal::size()?;
    let mut screen = Screen::new(size.0, size.1);
    let mut grid = Grid::new(size.0 as usize, size.1 as usize);

    let start = Instant::now();
    let mut last = Instant::now();
    let frame_budget = Duration::from_micros(1_000_000 / args.fps.max(1));
    let mut quit = false;

    while !quit {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind == KeyEventKind::Press => match k.code {
                    KeyCode::Char('q') | KeyCode::Esc => quit = true,
                    KeyCode::Char(' ') => paused = !paused,
                    KeyCode::Char('h') => show_hud = !show_hud,
                    KeyCode::Char('c') => palette_idx = (palette_idx + 1) % PALETTES.len(),
                    KeyCode::Char('r') => {
                        seed = seed.wrapping_add(1);
                        sys = BlobSystem::new(seed);
                    }
                    KeyCode::Char('[') => {
                        cfg.pop_cap = cfg.pop_cap.saturating_sub(1).max(2);
                        cfg.pop_floor = cfg.pop_floor.min(cfg.pop_cap);
                    }
                    KeyCode::Char(']') => {
                        cfg.pop_cap = (cfg.pop_cap + 1).min(40);
                    }
                    _ => {}
                },
                Event::Resize(w, h) => {
                    size = (w, h);
                    screen.resize(w, h);
                    grid = Grid::new(w as usize, h as usize);
                }
                _ => {}
            }
        }

        let now = Instant::now();
        let dt = (now - last).as_secs_f32().min(0.1);
        last = now;
        let time = start.elapsed().as_secs_f32();

        let palette = &PALETTES[palette_idx];
        if !paused {
            sys.tick(&cfg, palette, time, dt);
        }
        painter.render(&mut grid, &sys, palette, &cfg, time);

        for y in 0..size.1 {
            for x in 0..size.0 {
                let cell = grid.get(x as usize, y as usize);
                screen.set(
                    x,
                    y,
                    TermCell {
                        ch: cell.glyph,
                        fg: hsl_to_rgb(cell.hue, cell.sat, cell.light),
                    },
                );
            }
        }

        if show_hud && size.1 >= 2 {
            let active = sys
                .iter()
                .filter(|(_, b)| b.stage() == LifeStage::Active)
                .count();
            let line1 = format!(
                "lavaflow  blobs:{:>2}/{:<2} ({} active)  palette:{}  seed:{}{}",
                sys.len(),
                cfg.pop_cap,
                active,
                palette.name,
                seed,
                if paused { "  [PAUSED]" } else { "" }
            );
            let line2 = "Keys: C palette  [ / ] cap  R reseed  Space pause  H hud  Q quit";
            for (i, ch) in line1.chars().take(size.0 as usize).enumerate() {
                screen.set(i as u16, 0, TermCell { ch, fg: (210, 220, 245) });
            }
            for (i, ch) in line2.chars().take(size.0 as usize).enumerate() {
                screen.set(i as u16, 1, TermCell { ch, fg: (150, 160, 185) });
            }
        }

        queue!(out, BeginSynchronizedUpdate)?;
        screen.flush(&mut out)?;
        queue!(out, ResetColor, EndSynchronizedUpdate)?;
        out.flush()?;

        let spent = Instant::now() - now;
        if spent < frame_budget {
            std::thread::sleep(frame_budget - spent);
        }
    }

    terminal::disable_raw_mode()?;
    execute!(
        out,
        ResetColor,
        cursor::Show,
        EnableLineWrap,
        LeaveAlternateScreen
    )?;
    Ok(())
}
