use crate::config::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Ceiling/band policy for the working resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionBounds {
    pub max_height: u32,
    pub min_width: u32,
    pub max_width: u32,
}

/// Result of bounding: the working resolution and the factor applied to the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounded {
    pub size: Dimensions,
    pub scale: f64,
}

impl ResolutionBounds {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_height: config.max_height,
            min_width: config.min_width,
            max_width: config.max_width,
        }
    }

    /// Bound `source` so its height does not exceed the ceiling.
    ///
    /// Output width and height are always even (4:2:0 chroma). Applying the
    /// function to its own output returns the output unchanged.
    pub fn apply(&self, source: Dimensions) -> Bounded {
        if source.height <= self.max_height {
            return Bounded {
                size: Dimensions::new(even_up(source.width), even_down(source.height)),
                scale: 1.0,
            };
        }

        let scale = self.max_height as f64 / source.height as f64;
        let width = (source.width as f64 * scale).round() as u32;
        let mut width = even_up(width.clamp(self.min_width, self.max_width));
        if width > self.max_width {
            width = even_down(self.max_width);
        }

        Bounded {
            size: Dimensions::new(width, even_down(self.max_height)),
            scale,
        }
    }
}

fn even_up(v: u32) -> u32 {
    (v + (v & 1)).max(2)
}

fn even_down(v: u32) -> u32 {
    (v & !1).max(2)
}
