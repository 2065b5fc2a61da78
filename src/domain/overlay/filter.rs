use super::OverlaySpec;

pub const VIDEO_OUT: &str = "[outv]";

/// Render an [`OverlaySpec`] into an ffmpeg `-filter_complex` graph.
///
/// Input 0 is the source video, input 1 the watermark raster.
pub fn filter_graph(spec: &OverlaySpec) -> String {
    let alpha = if spec.opacity < 1.0 {
        format!(",colorchannelmixer=aa={:.2}", spec.opacity)
    } else {
        String::new()
    };

    format!(
        "[0:v]scale={fw}:{fh},setsar=1[base];\
         [1:v]scale={mw}:{mh},format=rgba{alpha}[wm];\
         [base][wm]overlay=x='{x}':y='{y}':format=auto,format=yuv420p{out}",
        fw = spec.frame.width,
        fh = spec.frame.height,
        mw = spec.mark.width,
        mh = spec.mark.height,
        alpha = alpha,
        x = spec.placement.x_expr(spec.interval_secs),
        y = spec.placement.y_expr(spec.interval_secs),
        out = VIDEO_OUT,
    )
}
