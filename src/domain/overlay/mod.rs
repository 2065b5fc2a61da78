//! Overlay composition: bounded resolution, animated watermark, one encode pass.

pub mod bounds;
pub mod filter;
pub mod placement;

use crate::config::PipelineConfig;
use crate::domain::av::MediaDescriptor;
use crate::domain::encoding::{args, container_args, parse_bitrate};
use crate::domain::errors::PipelineError;
use crate::ports::command::CommandRunner;
use crate::ports::watermark::RasterSize;
use bounds::{Dimensions, ResolutionBounds};
use placement::Placement;
use std::path::Path;
use tracing::{error, info};

/// Everything the filter graph needs, derived from the probed source.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpec {
    /// Working resolution after bounding
    pub frame: Dimensions,
    pub mark: Dimensions,
    pub opacity: f32,
    pub interval_secs: f64,
    pub placement: Placement,
}

impl OverlaySpec {
    pub fn derive(
        source: &MediaDescriptor,
        raster: RasterSize,
        placement: Placement,
        config: &PipelineConfig,
    ) -> Self {
        let bounded = ResolutionBounds::from_config(config)
            .apply(Dimensions::new(source.video.width, source.video.height));

        let mark_height = (source.video.height as f64 * config.watermark_size_percent as f64
            / 100.0
            * bounded.scale)
            .round()
            .max(2.0) as u32;
        let aspect = if raster.height > 0 {
            raster.width as f64 / raster.height as f64
        } else {
            1.0
        };
        let mark_width = (mark_height as f64 * aspect).round().max(1.0) as u32;
        let mark = fit_within(Dimensions::new(mark_width, mark_height), bounded.size);

        OverlaySpec {
            frame: bounded.size,
            mark,
            opacity: config.watermark_opacity,
            interval_secs: config.position_interval_secs,
            placement,
        }
    }
}

/// Shrink `mark` uniformly until it fits inside `frame`.
fn fit_within(mark: Dimensions, frame: Dimensions) -> Dimensions {
    if mark.width <= frame.width && mark.height <= frame.height {
        return mark;
    }
    let scale = (frame.width as f64 / mark.width as f64)
        .min(frame.height as f64 / mark.height as f64);
    Dimensions::new(
        ((mark.width as f64 * scale).floor() as u32).clamp(1, frame.width),
        ((mark.height as f64 * scale).floor() as u32).clamp(1, frame.height),
    )
}

pub fn encode_args(
    spec: &OverlaySpec,
    input: &Path,
    watermark: &Path,
    output: &Path,
    has_audio: bool,
    config: &PipelineConfig,
) -> Vec<String> {
    let maxrate = parse_bitrate(&config.video_bitrate).unwrap_or(2_500_000);

    let mut cmd = args(["-y", "-i"]);
    cmd.push(input.display().to_string());
    cmd.push("-i".to_string());
    cmd.push(watermark.display().to_string());
    cmd.push("-filter_complex".to_string());
    cmd.push(filter::filter_graph(spec));
    cmd.extend(args(["-map", filter::VIDEO_OUT]));
    if has_audio {
        cmd.extend(args(["-map", "0:a:0", "-c:a", "aac", "-b:a"]));
        cmd.push(config.audio_bitrate.clone());
    } else {
        cmd.push("-an".to_string());
    }
    cmd.extend(args(["-c:v", "libx264", "-preset"]));
    cmd.push(config.encoder_preset.clone());
    cmd.push("-crf".to_string());
    cmd.push(config.crf.to_string());
    cmd.push("-maxrate".to_string());
    cmd.push(maxrate.to_string());
    cmd.push("-bufsize".to_string());
    cmd.push((maxrate * 2).to_string());
    cmd.extend(args(["-pix_fmt", "yuv420p"]));
    cmd.extend(container_args(output));
    cmd.push(output.display().to_string());
    cmd
}

/// Scale the source and burn the watermark in with a single ffmpeg run.
pub async fn compose(
    runner: &impl CommandRunner,
    source: &MediaDescriptor,
    spec: &OverlaySpec,
    input: &Path,
    watermark: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<(), PipelineError> {
    info!(
        width = spec.frame.width,
        height = spec.frame.height,
        mark_height = spec.mark.height,
        "composing overlay"
    );
    let cmd = encode_args(
        spec,
        input,
        watermark,
        output,
        source.audio.is_some(),
        config,
    );
    let result = runner
        .invoke("ffmpeg", &cmd)
        .await
        .map_err(|e| PipelineError::Encode(format!("failed to run ffmpeg: {}", e)))?;

    if !result.success() {
        let diagnostic = result.diagnostic();
        error!("overlay encode failed: {}", diagnostic);
        return Err(PipelineError::Encode(diagnostic));
    }
    Ok(())
}
