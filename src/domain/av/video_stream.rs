use super::rational::Rational;
use super::stream::{is_codec_type, number_field, string_field, FromStream};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoStream {
    pub codec: String,
    pub pix_fmt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub bit_rate: Option<u64>,
    pub frame_rate: Option<Rational>,
    pub time_base: Option<Rational>,
}

impl FromStream for VideoStream {
    fn from_stream(stream_data: &Value) -> Option<Box<Self>> {
        if !is_codec_type(stream_data, "video") {
            return None;
        }
        // Cover art shows up as a one-frame video stream.
        let attached_pic = stream_data
            .get("disposition")
            .and_then(|d| d.get("attached_pic"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        if attached_pic == 1 {
            return None;
        }

        let width = number_field(stream_data, "width")? as u32;
        let height = number_field(stream_data, "height")? as u32;
        if width == 0 || height == 0 {
            return None;
        }

        let frame_rate = string_field(stream_data, "r_frame_rate")
            .and_then(|r| r.parse::<Rational>().ok())
            .or_else(|| {
                string_field(stream_data, "avg_frame_rate").and_then(|r| r.parse().ok())
            });

        Some(Box::new(VideoStream {
            codec: string_field(stream_data, "codec_name")?,
            pix_fmt: string_field(stream_data, "pix_fmt"),
            width,
            height,
            bit_rate: number_field(stream_data, "bit_rate"),
            frame_rate,
            time_base: string_field(stream_data, "time_base").and_then(|r| r.parse().ok()),
        }))
    }
}
