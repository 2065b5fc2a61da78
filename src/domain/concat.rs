//! Joining the watermarked clip and its outro.

use crate::domain::encoding::{args, container_args};
use crate::domain::errors::PipelineError;
use crate::ports::command::CommandRunner;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// One line of an ffmpeg concat demuxer list.
pub fn list_entry(path: &Path) -> String {
    format!("file '{}'", path.display().to_string().replace('\'', r"'\''"))
}

fn absolute(path: &Path) -> Result<PathBuf, PipelineError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| PipelineError::Concat(format!("cannot resolve {}: {}", path.display(), e)))
}

pub fn copy_args(list: &Path, output: &Path) -> Vec<String> {
    let mut cmd = args(["-y", "-f", "concat", "-safe", "0", "-i"]);
    cmd.push(list.display().to_string());
    cmd.extend(args(["-c", "copy"]));
    cmd.extend(container_args(output));
    cmd.push(output.display().to_string());
    cmd
}

pub fn reencode_args(parts: &[&Path], output: &Path, has_audio: bool) -> Vec<String> {
    let mut cmd = args(["-y"]);
    let mut graph = String::new();
    for (i, part) in parts.iter().enumerate() {
        cmd.push("-i".to_string());
        cmd.push(part.display().to_string());
        graph.push_str(&format!("[{}:v]", i));
        if has_audio {
            graph.push_str(&format!("[{}:a]", i));
        }
    }
    let audio_out = if has_audio { "[outa]" } else { "" };
    graph.push_str(&format!(
        "concat=n={}:v=1:a={}[outv]{}",
        parts.len(),
        has_audio as u8,
        audio_out
    ));

    cmd.push("-filter_complex".to_string());
    cmd.push(graph);
    cmd.extend(args(["-map", "[outv]"]));
    if has_audio {
        cmd.extend(args(["-map", "[outa]", "-c:a", "aac"]));
    }
    cmd.extend(args(["-c:v", "libx264", "-pix_fmt", "yuv420p"]));
    cmd.extend(container_args(output));
    cmd.push(output.display().to_string());
    cmd
}

/// Stream-copy `main` followed by `outro` into `output`.
///
/// The list file is created inside `work_dir` and removed when this returns.
/// With `reencode_fallback` set, a failed copy is retried once through the
/// concat filter.
pub async fn concatenate(
    runner: &impl CommandRunner,
    main: &Path,
    outro: &Path,
    output: &Path,
    work_dir: &Path,
    has_audio: bool,
    reencode_fallback: bool,
) -> Result<(), PipelineError> {
    let main = absolute(main)?;
    let outro = absolute(outro)?;

    let mut list = tempfile::Builder::new()
        .prefix("concat-")
        .suffix(".txt")
        .tempfile_in(work_dir)
        .map_err(|e| PipelineError::Concat(format!("cannot create concat list: {}", e)))?;
    let entries = format!("{}\n{}\n", list_entry(&main), list_entry(&outro));
    list.write_all(entries.as_bytes())
        .and_then(|_| list.flush())
        .map_err(|e| PipelineError::Concat(format!("cannot write concat list: {}", e)))?;

    info!(output = %output.display(), "concatenating with stream copy");
    let copy = runner
        .invoke("ffmpeg", &copy_args(list.path(), output))
        .await
        .map_err(|e| PipelineError::Concat(format!("failed to run ffmpeg: {}", e)))?;
    if copy.success() {
        return Ok(());
    }

    let copy_diagnostic = copy.diagnostic();
    if !reencode_fallback {
        error!("stream copy concat failed: {}", copy_diagnostic);
        return Err(PipelineError::Concat(copy_diagnostic));
    }

    warn!("stream copy concat failed, re-encoding: {}", copy_diagnostic);
    let reencode = runner
        .invoke(
            "ffmpeg",
            &reencode_args(&[main.as_path(), outro.as_path()], output, has_audio),
        )
        .await
        .map_err(|e| PipelineError::Concat(format!("failed to run ffmpeg: {}", e)))?;
    if reencode.success() {
        return Ok(());
    }

    let msg = format!(
        "copy: {}; re-encode: {}",
        copy_diagnostic,
        reencode.diagnostic()
    );
    error!("concat failed: {}", msg);
    Err(PipelineError::Concat(msg))
}
