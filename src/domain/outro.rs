//! Closing clip whose streams mirror the clip it will be appended to.

use crate::config::PipelineConfig;
use crate::domain::av::{self, MediaDescriptor, Rational};
use crate::domain::encoding::{
    args, audio_encoder_for, container_args, is_mp4_family, video_encoder_for,
};
use crate::domain::errors::PipelineError;
use crate::domain::overlay::bounds::Dimensions;
use crate::ports::command::CommandRunner;
use std::path::Path;
use tracing::{error, info, warn};

const DEFAULT_FRAME_RATE: Rational = Rational { num: 30, den: 1 };
const DEFAULT_PIX_FMT: &str = "yuv420p";
const DEFAULT_AUDIO_BITRATE: &str = "128k";
const DEFAULT_SAMPLE_RATE: u32 = 44_100;
const DEFAULT_CHANNEL_LAYOUT: &str = "stereo";
const BRANDING_FILL: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct OutroAudio {
    /// ffprobe codec identifier
    pub codec: String,
    pub encoder: String,
    pub bitrate: String,
    pub sample_rate: u32,
    pub channel_layout: String,
}

/// Encoding parameters of the outro, taken from a reference clip.
#[derive(Debug, Clone, PartialEq)]
pub struct OutroSpec {
    pub frame: Dimensions,
    pub duration_secs: f64,
    /// ffprobe codec identifier
    pub codec: String,
    pub encoder: String,
    pub pix_fmt: String,
    pub frame_rate: Rational,
    pub bitrate: String,
    /// Track timescale for MP4/MOV, from the reference time base
    pub timescale: Option<u32>,
    pub audio: Option<OutroAudio>,
}

impl OutroSpec {
    pub fn from_reference(reference: &MediaDescriptor, config: &PipelineConfig) -> Self {
        let video = &reference.video;
        let encoder = video_encoder_for(&video.codec).unwrap_or_else(|| {
            warn!(codec = %video.codec, "no encoder for reference codec, using libx264");
            "libx264"
        });

        let audio = reference.audio.as_ref().map(|a| OutroAudio {
            codec: a.codec.clone(),
            encoder: audio_encoder_for(&a.codec).unwrap_or("aac").to_string(),
            bitrate: a
                .bit_rate
                .map(|b| b.to_string())
                .unwrap_or_else(|| DEFAULT_AUDIO_BITRATE.to_string()),
            sample_rate: a.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            channel_layout: a.channel_layout.clone().unwrap_or_else(|| {
                match a.channels {
                    Some(1) => "mono".to_string(),
                    _ => DEFAULT_CHANNEL_LAYOUT.to_string(),
                }
            }),
        });

        OutroSpec {
            frame: Dimensions::new(video.width, video.height),
            duration_secs: config.outro_duration_secs,
            codec: video.codec.clone(),
            encoder: encoder.to_string(),
            pix_fmt: video
                .pix_fmt
                .clone()
                .unwrap_or_else(|| DEFAULT_PIX_FMT.to_string()),
            frame_rate: video.frame_rate.unwrap_or(DEFAULT_FRAME_RATE),
            bitrate: video
                .bit_rate
                .map(|b| b.to_string())
                .unwrap_or_else(|| config.video_bitrate.clone()),
            timescale: video.time_base.map(|tb| tb.den),
            audio,
        }
    }

    /// Branding size: fit inside 80% of the frame, aspect kept, even dimensions.
    pub fn branding_size(&self, branding: Dimensions) -> Dimensions {
        let scale = (BRANDING_FILL * self.frame.width as f64 / branding.width as f64)
            .min(BRANDING_FILL * self.frame.height as f64 / branding.height as f64);
        let even = |v: f64| ((v.floor() as u32) & !1).max(2);
        Dimensions::new(
            even(branding.width as f64 * scale),
            even(branding.height as f64 * scale),
        )
    }

    pub fn build_args(&self, branding: &Path, brand: Dimensions, output: &Path) -> Vec<String> {
        let duration = self.duration_secs.to_string();

        let mut cmd = args(["-y", "-f", "lavfi", "-i"]);
        cmd.push(format!(
            "color=c=black:s={}x{}:r={}:d={}",
            self.frame.width, self.frame.height, self.frame_rate, duration
        ));
        if let Some(audio) = &self.audio {
            cmd.extend(args(["-f", "lavfi", "-i"]));
            cmd.push(format!(
                "anullsrc=channel_layout={}:sample_rate={}",
                audio.channel_layout, audio.sample_rate
            ));
        }
        let brand_input = if self.audio.is_some() { 2 } else { 1 };
        cmd.push("-i".to_string());
        cmd.push(branding.display().to_string());

        cmd.push("-filter_complex".to_string());
        cmd.push(format!(
            "[{n}:v]scale={bw}:{bh},setsar=1[brand];\
             [0:v][brand]overlay=(W-w)/2:(H-h)/2,format={pix}[outv]",
            n = brand_input,
            bw = brand.width,
            bh = brand.height,
            pix = self.pix_fmt,
        ));
        cmd.extend(args(["-map", "[outv]"]));
        if self.audio.is_some() {
            cmd.extend(args(["-map", "1:a"]));
        }

        cmd.push("-t".to_string());
        cmd.push(duration);
        cmd.push("-c:v".to_string());
        cmd.push(self.encoder.clone());
        cmd.push("-pix_fmt".to_string());
        cmd.push(self.pix_fmt.clone());
        cmd.push("-b:v".to_string());
        cmd.push(self.bitrate.clone());
        cmd.push("-r".to_string());
        cmd.push(self.frame_rate.to_string());

        if let Some(audio) = &self.audio {
            cmd.push("-c:a".to_string());
            cmd.push(audio.encoder.clone());
            cmd.push("-b:a".to_string());
            cmd.push(audio.bitrate.clone());
            cmd.push("-ar".to_string());
            cmd.push(audio.sample_rate.to_string());
        }

        if let (Some(timescale), true) = (self.timescale, is_mp4_family(output)) {
            cmd.push("-video_track_timescale".to_string());
            cmd.push(timescale.to_string());
        }
        cmd.extend(container_args(output));
        cmd.push(output.display().to_string());
        cmd
    }
}

/// Render the outro for `reference` into `output`.
pub async fn synthesize(
    runner: &impl CommandRunner,
    reference: &MediaDescriptor,
    branding: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<OutroSpec, PipelineError> {
    if !branding.exists() {
        return Err(PipelineError::OutroBuild(format!(
            "branding clip not found: {}",
            branding.display()
        )));
    }
    let brand = av::probe(runner, branding)
        .await
        .map_err(|e| PipelineError::OutroBuild(format!("cannot probe branding clip: {}", e)))?;

    let spec = OutroSpec::from_reference(reference, config);
    let brand_size = spec.branding_size(Dimensions::new(brand.video.width, brand.video.height));
    info!(
        codec = %spec.codec,
        fps = %spec.frame_rate,
        width = spec.frame.width,
        height = spec.frame.height,
        "synthesizing outro"
    );

    let cmd = spec.build_args(branding, brand_size, output);
    let result = runner
        .invoke("ffmpeg", &cmd)
        .await
        .map_err(|e| PipelineError::OutroBuild(format!("failed to run ffmpeg: {}", e)))?;
    if !result.success() {
        let diagnostic = result.diagnostic();
        error!("outro encode failed: {}", diagnostic);
        return Err(PipelineError::OutroBuild(diagnostic));
    }
    Ok(spec)
}
