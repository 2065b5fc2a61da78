//! Where the watermark sits at clip time `t`.
//!
//! Every policy exists twice: as a Rust function used by tests and logging,
//! and as an ffmpeg expression evaluated per frame by the overlay filter. The
//! two are written from the same formula so they agree on every interval.

use super::bounds::Dimensions;
use crate::config::{PipelineConfig, PlacementStrategy};

const HASH_X: f64 = 12.9898;
const HASH_Y: f64 = 78.233;
const HASH_SCALE: f64 = 43758.5453;
const SEED_MODULUS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Pseudo-random position per interval, derived from the interval index and a per-job seed.
    Random { seed: u32 },
    /// Rotates top-left, top-right, bottom-right, bottom-left.
    Anchors { margin: u32 },
}

impl Placement {
    /// Placement for one job. The random seed comes from the cache key so that
    /// reprocessing the same source produces the same motion.
    pub fn for_job(config: &PipelineConfig, cache_key: &str) -> Self {
        match config.placement {
            PlacementStrategy::Random => Placement::Random {
                seed: seed_from_key(cache_key),
            },
            PlacementStrategy::Anchors => Placement::Anchors {
                margin: config.anchor_margin,
            },
        }
    }

    /// Top-left offset of the mark at time `t`.
    pub fn position_at(&self, frame: Dimensions, mark: Dimensions, interval: f64, t: f64) -> (u32, u32) {
        let free_w = frame.width.saturating_sub(mark.width);
        let free_h = frame.height.saturating_sub(mark.height);
        let slot = (t.max(0.0) / interval).floor();

        match *self {
            Placement::Random { seed } => {
                let k = slot + seed as f64;
                let x = (free_w as f64 * hash_fraction(k, HASH_X)).floor() as u32;
                let y = (free_h as f64 * hash_fraction(k, HASH_Y)).floor() as u32;
                (x.min(free_w), y.min(free_h))
            }
            Placement::Anchors { margin } => {
                let corner = (slot as u64 % 4) as u8;
                let left = margin.min(free_w);
                let right = free_w.saturating_sub(margin);
                let top = margin.min(free_h);
                let bottom = free_h.saturating_sub(margin);
                match corner {
                    0 => (left, top),
                    1 => (right, top),
                    2 => (right, bottom),
                    _ => (left, bottom),
                }
            }
        }
    }

    /// ffmpeg overlay `x` expression.
    pub fn x_expr(&self, interval: f64) -> String {
        match *self {
            Placement::Random { seed } => random_expr("W-w", seed, HASH_X, interval),
            Placement::Anchors { margin } => format!(
                "if(eq({k},0)+eq({k},3),min({m},max(W-w,0)),max(W-w-{m},0))",
                k = anchor_index(interval),
                m = margin
            ),
        }
    }

    /// ffmpeg overlay `y` expression.
    pub fn y_expr(&self, interval: f64) -> String {
        match *self {
            Placement::Random { seed } => random_expr("H-h", seed, HASH_Y, interval),
            Placement::Anchors { margin } => format!(
                "if(lt({k},2),min({m},max(H-h,0)),max(H-h-{m},0))",
                k = anchor_index(interval),
                m = margin
            ),
        }
    }
}

fn seed_from_key(cache_key: &str) -> u32 {
    let prefix: String = cache_key.chars().take(8).collect();
    u32::from_str_radix(&prefix, 16).unwrap_or(0) % SEED_MODULUS
}

fn hash_fraction(k: f64, factor: f64) -> f64 {
    let s = (k * factor).sin().abs() * HASH_SCALE;
    s - s.floor()
}

fn anchor_index(interval: f64) -> String {
    format!("mod(floor(t/{}),4)", interval)
}

fn random_expr(free: &str, seed: u32, factor: f64, interval: f64) -> String {
    let s = format!(
        "abs(sin((floor(t/{})+{})*{}))*{}",
        interval, seed, factor, HASH_SCALE
    );
    format!("floor(max({free},0)*(({s})-floor({s})))", free = free, s = s)
}
