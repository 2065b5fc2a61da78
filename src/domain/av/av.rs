use super::audio_stream::AudioStream;
use super::stream::{float_field, string_field, FromStream};
use super::video_stream::VideoStream;
use crate::domain::errors::PipelineError;
use crate::ports::command::CommandRunner;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, error};

/// What the encoder decisions need to know about a media file.
///
/// Only the first stream of each kind is kept. A file without a usable video
/// stream never produces a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDescriptor {
    pub format_name: String,
    pub duration: Option<f64>,
    pub video: VideoStream,
    pub audio: Option<AudioStream>,
}

impl MediaDescriptor {
    pub fn from_probe_json(json: &str) -> Result<Self, PipelineError> {
        let v: Value = serde_json::from_str(json)
            .map_err(|e| PipelineError::Probe(format!("unparseable ffprobe output: {}", e)))?;

        let streams = v
            .get("streams")
            .and_then(|s| s.as_array())
            .ok_or_else(|| PipelineError::Probe("ffprobe output has no streams".to_string()))?;

        let video = streams
            .iter()
            .filter_map(|stream| VideoStream::from_stream(stream))
            .map(|stream| *stream)
            .next()
            .ok_or_else(|| PipelineError::Probe("no video stream found".to_string()))?;

        let audio = streams
            .iter()
            .filter_map(|stream| AudioStream::from_stream(stream))
            .map(|stream| *stream)
            .next();

        let format = v.get("format");
        Ok(MediaDescriptor {
            format_name: format
                .and_then(|f| string_field(f, "format_name"))
                .unwrap_or_default(),
            duration: format.and_then(|f| float_field(f, "duration")),
            video,
            audio,
        })
    }
}

pub fn ffprobe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        path.display().to_string(),
    ]
}

/// Probe a local media file with ffprobe.
pub async fn probe(
    runner: &impl CommandRunner,
    path: &Path,
) -> Result<MediaDescriptor, PipelineError> {
    debug!(path = %path.display(), "probing media");
    let output = runner
        .invoke("ffprobe", &ffprobe_args(path))
        .await
        .map_err(|e| PipelineError::Probe(format!("failed to run ffprobe: {}", e)))?;

    if !output.success() {
        let msg = format!(
            "Failed to get video info for {}: {}",
            path.display(),
            output.diagnostic()
        );
        error!("{}", msg);
        return Err(PipelineError::Probe(msg));
    }

    MediaDescriptor::from_probe_json(&output.stdout)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::av::rational::Rational;
    use crate::ports::command::{CommandOutput, MockCommandRunner};

    pub(crate) const PROBE_1080P: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "pix_fmt": "yuv420p",
                "r_frame_rate": "30/1",
                "avg_frame_rate": "30/1",
                "time_base": "1/15360",
                "bit_rate": "4500000"
            },
            {
                "index": 1,
                "codec_name": "aac",
                "codec_type": "audio",
                "sample_rate": "48000",
                "channels": 2,
                "channel_layout": "stereo",
                "bit_rate": "128000"
            },
            {
                "index": 2,
                "codec_name": "aac",
                "codec_type": "audio",
                "sample_rate": "22050",
                "channels": 1,
                "channel_layout": "mono"
            }
        ],
        "format": {
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "10.000000"
        }
    }"#;

    fn output(stdout: &str, stderr: &str, code: i32) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code: Some(code),
        }
    }

    #[test]
    fn parses_first_stream_of_each_kind() {
        let media = MediaDescriptor::from_probe_json(PROBE_1080P).unwrap();
        assert_eq!(media.video.width, 1920);
        assert_eq!(media.video.height, 1080);
        assert_eq!(media.video.frame_rate, Some(Rational { num: 30, den: 1 }));
        let audio = media.audio.unwrap();
        assert_eq!(audio.sample_rate, Some(48000));
        assert_eq!(audio.channel_layout.as_deref(), Some("stereo"));
        assert_eq!(media.duration, Some(10.0));
        assert!(media.format_name.contains("mp4"));
    }

    #[test]
    fn audio_only_file_is_a_probe_error() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"mp3"}],"format":{}}"#;
        let err = MediaDescriptor::from_probe_json(json).unwrap_err();
        assert_eq!(err, PipelineError::Probe("no video stream found".to_string()));
    }

    #[test]
    fn garbage_is_a_probe_error() {
        let err = MediaDescriptor::from_probe_json("not json").unwrap_err();
        assert!(matches!(err, PipelineError::Probe(_)));
    }

    #[tokio::test]
    async fn probe_runs_ffprobe_with_json_output() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_invoke()
            .withf(|program, args| {
                program == "ffprobe"
                    && args.iter().any(|a| a == "-show_streams")
                    && args.last().map(String::as_str) == Some("/tmp/in.mp4")
            })
            .times(1)
            .returning(|_, _| Ok(output(PROBE_1080P, "", 0)));

        let media = probe(&runner, Path::new("/tmp/in.mp4")).await.unwrap();
        assert_eq!(media.video.codec, "h264");
    }

    #[tokio::test]
    async fn probe_failure_carries_stderr() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_invoke()
            .times(1)
            .returning(|_, _| Ok(output("", "moov atom not found", 1)));

        let err = probe(&runner, Path::new("/tmp/broken.mp4")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Probe(ref msg) if msg.contains("moov atom not found")));
    }

    #[tokio::test]
    async fn probe_spawn_failure_is_a_probe_error() {
        let mut runner = MockCommandRunner::new();
        runner.expect_invoke().times(1).returning(|_, _| {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "ffprobe not found",
            ))
        });

        let err = probe(&runner, Path::new("/tmp/in.mp4")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Probe(ref msg) if msg.contains("ffprobe not found")));
    }
}
