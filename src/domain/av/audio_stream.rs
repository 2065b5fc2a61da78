use super::stream::{is_codec_type, number_field, string_field, FromStream};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
    pub codec: String,
    pub bit_rate: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channel_layout: Option<String>,
    pub channels: Option<u32>,
}

impl FromStream for AudioStream {
    fn from_stream(stream_data: &Value) -> Option<Box<AudioStream>> {
        if !is_codec_type(stream_data, "audio") {
            return None;
        }
        Some(Box::new(AudioStream {
            codec: string_field(stream_data, "codec_name")?,
            bit_rate: number_field(stream_data, "bit_rate"),
            sample_rate: number_field(stream_data, "sample_rate").map(|r| r as u32),
            channel_layout: string_field(stream_data, "channel_layout"),
            channels: number_field(stream_data, "channels").map(|c| c as u32),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::AudioStream;
    use super::FromStream;
    use serde_json::json;

    #[test]
    fn test_from_stream_valid_audio() {
        let stream_data = json!({
            "codec_type": "audio",
            "codec_name": "aac",
            "profile": "LC",
            "sample_rate": "48000",
            "channels": 2,
            "channel_layout": "stereo",
            "bit_rate": "192000"
        });
        let stream = AudioStream::from_stream(&stream_data).unwrap();
        assert_eq!(stream.codec, "aac");
        assert_eq!(stream.sample_rate, Some(48000));
        assert_eq!(stream.channels, Some(2));
        assert_eq!(stream.channel_layout.as_deref(), Some("stereo"));
        assert_eq!(stream.bit_rate, Some(192000));
    }

    #[test]
    fn test_from_stream_non_audio_codec_type() {
        let stream_data = json!({
            "codec_type": "video",
            "codec_name": "h264"
        });
        assert!(AudioStream::from_stream(&stream_data).is_none());
    }

    #[test]
    fn test_from_stream_missing_codec_type() {
        let stream_data = json!({
            "codec_name": "aac"
        });
        assert!(AudioStream::from_stream(&stream_data).is_none());
    }

    #[test]
    fn test_from_stream_missing_codec_name() {
        let stream_data = json!({
            "codec_type": "audio",
            "sample_rate": "44100"
        });
        assert!(AudioStream::from_stream(&stream_data).is_none());
    }
}
