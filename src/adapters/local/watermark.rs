use crate::config::PipelineConfig;
use crate::domain::errors::PipelineError;
use crate::ports::watermark::{RasterSize, WatermarkRenderer};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

const HORIZONTAL_PADDING: u32 = 16;
const BAND_MARGIN: u32 = 8;
const STROKE_RADIUS: i32 = 2;
const MIN_FONT_PX: f32 = 14.0;
const FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);
const OUTLINE: Rgba<u8> = Rgba([0, 0, 0, 255]);
const EMBEDDED_FONT: &[u8] = include_bytes!("../../../fonts/DejaVuSans-Bold.ttf");

/// Where the base mark and the caption land on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionLayout {
    pub canvas: (u32, u32),
    pub base_origin: (u32, u32),
    pub text_origin: (u32, u32),
}

/// Caption goes in a band under the base mark, both centered horizontally.
pub fn layout(base: (u32, u32), text: (u32, u32)) -> CaptionLayout {
    let (base_w, base_h) = base;
    let (text_w, text_h) = text;
    let band = text_h + 2 * BAND_MARGIN;

    let canvas_w = base_w.max(text_w + 2 * HORIZONTAL_PADDING);
    let canvas_h = base_h + band;

    CaptionLayout {
        canvas: (canvas_w, canvas_h),
        base_origin: ((canvas_w - base_w) / 2, 0),
        text_origin: ((canvas_w - text_w) / 2, base_h + (band - text_h) / 2),
    }
}

/// Base watermark PNG with an outlined `@identity` caption underneath.
pub struct CaptionedWatermark {
    base_path: PathBuf,
    fonts: Vec<PathBuf>,
}

impl CaptionedWatermark {
    pub fn new(base_path: PathBuf, fonts: Vec<PathBuf>) -> Self {
        Self { base_path, fonts }
    }

    /// Configured font first, then the fallback list.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let fonts = config
            .font_path
            .iter()
            .cloned()
            .chain(config.fallback_fonts.iter().cloned())
            .collect();
        Self::new(config.watermark_path.clone(), fonts)
    }

    /// Configured fonts in order, then the font compiled into the binary.
    fn load_font(&self) -> Font<'static> {
        for path in &self.fonts {
            match std::fs::read(path) {
                Ok(bytes) => match Font::try_from_vec(bytes) {
                    Some(font) => {
                        debug!(font = %path.display(), "loaded caption font");
                        return font;
                    }
                    None => warn!(font = %path.display(), "font file is not a usable TrueType font"),
                },
                Err(e) => debug!(font = %path.display(), "font unavailable: {}", e),
            }
        }
        if !self.fonts.is_empty() {
            warn!(
                candidates = self.fonts.len(),
                "no configured font could be loaded, using the embedded font"
            );
        }
        embedded_font()
    }
}

fn embedded_font() -> Font<'static> {
    static FONT: OnceLock<Font<'static>> = OnceLock::new();
    FONT.get_or_init(|| {
        Font::try_from_bytes(EMBEDDED_FONT).expect("embedded font is a valid TrueType font")
    })
    .clone()
}

impl WatermarkRenderer for CaptionedWatermark {
    fn render(&self, identity: &str, output: &Path) -> Result<RasterSize, PipelineError> {
        let base = image::open(&self.base_path)
            .map_err(|e| {
                PipelineError::Asset(format!(
                    "cannot load watermark {}: {}",
                    self.base_path.display(),
                    e
                ))
            })?
            .to_rgba8();
        let font = self.load_font();

        let caption = format!("@{}", identity);
        let scale = Scale::uniform((base.height() as f32 * 0.35).max(MIN_FONT_PX));
        let (text_w, text_h) = text_size(scale, &font, &caption);
        let text = (text_w.max(0) as u32, text_h.max(0) as u32);

        let placed = layout(base.dimensions(), text);
        let mut canvas = RgbaImage::new(placed.canvas.0, placed.canvas.1);
        imageops::overlay(
            &mut canvas,
            &base,
            placed.base_origin.0 as i64,
            placed.base_origin.1 as i64,
        );

        let (x, y) = (placed.text_origin.0 as i32, placed.text_origin.1 as i32);
        for dx in -STROKE_RADIUS..=STROKE_RADIUS {
            for dy in -STROKE_RADIUS..=STROKE_RADIUS {
                if dx != 0 || dy != 0 {
                    draw_text_mut(&mut canvas, OUTLINE, x + dx, y + dy, scale, &font, &caption);
                }
            }
        }
        draw_text_mut(&mut canvas, FILL, x, y, scale, &font, &caption);

        canvas.save(output).map_err(|e| {
            PipelineError::Asset(format!("cannot write {}: {}", output.display(), e))
        })?;

        Ok(RasterSize {
            width: canvas.width(),
            height: canvas.height(),
        })
    }
}
