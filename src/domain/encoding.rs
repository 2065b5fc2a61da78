//! Encoder names and argument helpers shared by the encode stages.

use std::path::Path;

/// Encoder that produces streams with the given ffprobe codec identifier.
pub fn video_encoder_for(codec: &str) -> Option<&'static str> {
    match codec {
        "h264" => Some("libx264"),
        "hevc" | "h265" => Some("libx265"),
        "mpeg4" => Some("mpeg4"),
        "vp9" => Some("libvpx-vp9"),
        "vp8" => Some("libvpx"),
        "av1" => Some("libaom-av1"),
        "mjpeg" => Some("mjpeg"),
        "prores" => Some("prores_ks"),
        _ => None,
    }
}

pub fn audio_encoder_for(codec: &str) -> Option<&'static str> {
    match codec {
        "aac" => Some("aac"),
        "mp3" => Some("libmp3lame"),
        "opus" => Some("libopus"),
        "vorbis" => Some("libvorbis"),
        "ac3" => Some("ac3"),
        "alac" => Some("alac"),
        "pcm_s16le" => Some("pcm_s16le"),
        "pcm_s24le" => Some("pcm_s24le"),
        "pcm_f32le" => Some("pcm_f32le"),
        _ => None,
    }
}

/// Parse an ffmpeg bitrate such as `2500k`, `2.5M` or `128000` into bits per second.
pub fn parse_bitrate(value: &str) -> Option<u64> {
    let value = value.trim();
    let (digits, multiplier) = match value.chars().last()? {
        'k' | 'K' => (&value[..value.len() - 1], 1_000.0),
        'm' | 'M' => (&value[..value.len() - 1], 1_000_000.0),
        _ => (value, 1.0),
    };
    let number = digits.trim().parse::<f64>().ok()?;
    if number <= 0.0 || !number.is_finite() {
        return None;
    }
    Some((number * multiplier).round() as u64)
}

/// Muxer flags for containers that benefit from a front-loaded index.
pub fn container_args(output: &Path) -> Vec<String> {
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") | Some("mov") | Some("m4v") => {
            vec!["-movflags".to_string(), "+faststart".to_string()]
        }
        _ => Vec::new(),
    }
}

pub fn is_mp4_family(output: &Path) -> bool {
    !container_args(output).is_empty()
}

pub(crate) fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_codecs_to_encoders() {
        assert_eq!(video_encoder_for("h264"), Some("libx264"));
        assert_eq!(video_encoder_for("hevc"), Some("libx265"));
        assert_eq!(video_encoder_for("rawvideo"), None);
        assert_eq!(audio_encoder_for("aac"), Some("aac"));
        assert_eq!(audio_encoder_for("mp3"), Some("libmp3lame"));
        assert_eq!(audio_encoder_for("pcm_s24le"), Some("pcm_s24le"));
        assert_eq!(audio_encoder_for("dts"), None);
    }

    #[test]
    fn parses_bitrates() {
        assert_eq!(parse_bitrate("2500k"), Some(2_500_000));
        assert_eq!(parse_bitrate("2.5M"), Some(2_500_000));
        assert_eq!(parse_bitrate("128000"), Some(128_000));
        assert_eq!(parse_bitrate("fast"), None);
        assert_eq!(parse_bitrate(""), None);
        assert_eq!(parse_bitrate("-5k"), None);
    }

    #[test]
    fn faststart_only_for_mp4_family() {
        assert_eq!(
            container_args(Path::new("/tmp/out.MP4")),
            vec!["-movflags", "+faststart"]
        );
        assert!(container_args(Path::new("/tmp/out.avi")).is_empty());
    }
}
