use crate::config::PipelineConfig;
use crate::domain::av;
use crate::domain::concat;
use crate::domain::errors::PipelineError;
use crate::domain::jobs::{JobContext, JobState};
use crate::domain::outro;
use crate::domain::overlay::{self, placement::Placement, OverlaySpec};
use crate::domain::request::{SourceVideo, WatermarkRequest};
use crate::ports::command::CommandRunner;
use crate::ports::storage::StoragePort;
use crate::ports::watermark::{RasterSize, WatermarkRenderer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

const PROCESSED: &str = "Video processed successfully with outro";
const ALREADY_PROCESSED: &str = "Video was already processed";

/// JSON body returned to the caller for every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processing_time: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub status: u16,
    pub body: JobResponse,
    pub history: Vec<JobState>,
}

impl JobReport {
    fn failure(err: &PipelineError, ctx: &JobContext) -> Self {
        JobReport {
            status: err.status_code(),
            body: JobResponse {
                message: err.message(),
                url: None,
                cached: None,
                error: Some(err.to_string()),
                processing_time: ctx.processing_time(),
            },
            history: ctx.history().to_vec(),
        }
    }

    fn success(message: &str, url: String, cached: bool, ctx: &JobContext) -> Self {
        JobReport {
            status: 200,
            body: JobResponse {
                message: message.to_string(),
                url: Some(url),
                cached: Some(cached),
                error: None,
                processing_time: ctx.processing_time(),
            },
            history: ctx.history().to_vec(),
        }
    }
}

/// Runs watermarking jobs end to end: cache check, download, overlay, outro,
/// concat, publish.
pub struct PipelineService<S, C, W> {
    storage: S,
    runner: C,
    renderer: Arc<W>,
    config: Arc<PipelineConfig>,
}

impl<S, C, W> PipelineService<S, C, W>
where
    S: StoragePort,
    C: CommandRunner,
    W: WatermarkRenderer + 'static,
{
    pub fn new(storage: S, runner: C, renderer: W, config: Arc<PipelineConfig>) -> Self {
        Self {
            storage,
            runner,
            renderer: Arc::new(renderer),
            config,
        }
    }

    pub async fn handle(&self, request: &WatermarkRequest) -> JobReport {
        let mut ctx = JobContext::new("");
        let source = match SourceVideo::resolve(request, &self.config) {
            Ok(source) => source,
            Err(e) => {
                warn!("rejected request: {}", e);
                ctx.advance(JobState::Failed);
                return JobReport::failure(&e, &ctx);
            }
        };
        ctx.cache_key = source.cache_key.clone();
        info!(cache_key = %source.cache_key, bucket = %source.bucket, key = %source.key, "processing video");

        ctx.advance(JobState::CacheCheck);
        if let Some(url) = self.lookup_cache(&source).await {
            info!(cache_key = %source.cache_key, %url, "found existing processed video");
            ctx.advance(JobState::Done);
            return JobReport::success(ALREADY_PROCESSED, url, true, &ctx);
        }

        match self.run(&source, &mut ctx).await {
            Ok(url) => {
                ctx.advance(JobState::Done);
                if self.config.cleanup_temp_files {
                    ctx.cleanup().await;
                }
                let report = JobReport::success(PROCESSED, url, false, &ctx);
                info!(
                    cache_key = %source.cache_key,
                    total = report.body.processing_time.get("total").copied().unwrap_or_default(),
                    "job finished"
                );
                report
            }
            Err(e) => {
                error!(cache_key = %source.cache_key, state = ?ctx.state(), "processing failed: {}", e);
                ctx.advance(JobState::Failed);
                ctx.cleanup().await;
                JobReport::failure(&e, &ctx)
            }
        }
    }

    async fn lookup_cache(&self, source: &SourceVideo) -> Option<String> {
        if !self.config.cache_enabled || self.config.cache_bust {
            return None;
        }
        let prefix = format!("{}/{}_", self.config.output_prefix, source.cache_key);
        match self
            .storage
            .find_by_prefix(&self.config.output_bucket, &prefix)
            .await
        {
            Ok(found) => found.map(|key| self.storage.object_url(&self.config.output_bucket, &key)),
            Err(e) => {
                warn!(%prefix, "cache lookup failed, treating as miss: {}", e);
                None
            }
        }
    }

    pub fn output_key(&self, source: &SourceVideo) -> String {
        if self.config.cache_bust {
            format!(
                "{}/{}_with_outro_{}{}",
                self.config.output_prefix,
                source.cache_key,
                uuid::Uuid::new_v4().simple(),
                source.extension
            )
        } else {
            format!(
                "{}/{}_with_outro{}",
                self.config.output_prefix, source.cache_key, source.extension
            )
        }
    }

    async fn run(&self, source: &SourceVideo, ctx: &mut JobContext) -> Result<String, PipelineError> {
        let config = self.config.as_ref();
        let ext = &source.extension;
        let work_dir = ctx.create_work_dir(&config.temp_dir).await?;
        let input = ctx.artifact(&format!("input{}", ext))?;
        let watermark_png = ctx.artifact("watermark.png")?;
        let watermarked = ctx.artifact(&format!("watermarked{}", ext))?;
        let outro_clip = ctx.artifact(&format!("outro{}", ext))?;
        let final_clip = ctx.artifact(&format!("with_outro{}", ext))?;

        ctx.timed("download", async {
            self.storage
                .download(&source.bucket, &source.key, &input)
                .await
                .map_err(PipelineError::storage)
        })
        .await?;
        ctx.advance(JobState::Downloaded);

        let media = ctx.timed("watermark", av::probe(&self.runner, &input)).await?;
        ctx.advance(JobState::Probed);

        let renderer = Arc::clone(&self.renderer);
        let identity = source.identity.clone();
        let png = watermark_png.clone();
        let raster: RasterSize = ctx
            .timed("watermark", async move {
                match tokio::task::spawn_blocking(move || renderer.render(&identity, &png)).await {
                    Ok(rendered) => rendered,
                    Err(e) => Err(PipelineError::Asset(format!("watermark rendering aborted: {}", e))),
                }
            })
            .await?;
        ctx.advance(JobState::WatermarkBuilt);

        let placement = Placement::for_job(config, &source.cache_key);
        let spec = OverlaySpec::derive(&media, raster, placement, config);
        ctx.timed(
            "watermark",
            overlay::compose(&self.runner, &media, &spec, &input, &watermark_png, &watermarked, config),
        )
        .await?;
        ctx.advance(JobState::Overlaid);

        let reference = ctx
            .timed("outro", async {
                let reference = av::probe(&self.runner, &watermarked).await?;
                outro::synthesize(
                    &self.runner,
                    &reference,
                    &config.branding_clip_path,
                    &outro_clip,
                    config,
                )
                .await?;
                Ok::<_, PipelineError>(reference)
            })
            .await?;
        ctx.advance(JobState::OutroBuilt);

        ctx.timed(
            "concat",
            concat::concatenate(
                &self.runner,
                &watermarked,
                &outro_clip,
                &final_clip,
                &work_dir,
                reference.audio.is_some(),
                config.concat_reencode_fallback,
            ),
        )
        .await?;
        ctx.advance(JobState::Concatenated);

        let output_key = self.output_key(source);
        ctx.timed("upload", async {
            self.storage
                .upload(&final_clip, &config.output_bucket, &output_key)
                .await
                .map_err(PipelineError::storage)
        })
        .await?;
        ctx.advance(JobState::Published);

        Ok(self.storage.object_url(&config.output_bucket, &output_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::av::av::tests::PROBE_1080P;
    use crate::domain::jobs::STAGES;
    use crate::ports::command::{CommandOutput, MockCommandRunner};
    use crate::ports::storage::MockStoragePort;
    use crate::ports::watermark::MockWatermarkRenderer;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    const PROBE_WATERMARKED: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720,
             "pix_fmt": "yuv420p", "r_frame_rate": "30/1", "time_base": "1/15360",
             "bit_rate": "2400000"},
            {"codec_type": "audio", "codec_name": "aac", "sample_rate": "48000",
             "channels": 2, "channel_layout": "stereo", "bit_rate": "128000"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "10.0"}
    }"#;

    const PROBE_BRANDING: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
             "pix_fmt": "yuv420p", "r_frame_rate": "30/1"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "2.0"}
    }"#;

    const SOURCE_URL: &str = "https://flow-app-media.s3.us-west-1.amazonaws.com/uploads/clip.mp4";

    struct Fixture {
        temp: TempDir,
        config: Arc<PipelineConfig>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempdir().unwrap();
            let branding = temp.path().join("branding.mp4");
            std::fs::write(&branding, b"branding").unwrap();
            let config = PipelineConfig {
                temp_dir: temp.path().join("work"),
                branding_clip_path: branding,
                ..PipelineConfig::default()
            };
            Fixture {
                temp,
                config: Arc::new(config),
            }
        }

        fn work_entries(&self) -> usize {
            std::fs::read_dir(self.temp.path().join("work"))
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code: Some(1),
        }
    }

    /// Plays ffprobe and ffmpeg for a healthy 1080p upload.
    fn healthy_tools(runner: &mut MockCommandRunner, overlay_result: CommandOutput) {
        let overlay_result = Mutex::new(Some(overlay_result));
        runner.expect_invoke().returning(move |program, args| {
            let target = args.last().cloned().unwrap_or_default();
            if program == "ffprobe" {
                let json = if target.ends_with("branding.mp4") {
                    PROBE_BRANDING
                } else if target.contains("watermarked") {
                    PROBE_WATERMARKED
                } else {
                    PROBE_1080P
                };
                return Ok(ok(json));
            }
            if args.iter().any(|a| a.contains("overlay=x=")) {
                if let Some(result) = overlay_result.lock().unwrap().take() {
                    return Ok(result);
                }
            }
            Ok(ok(""))
        });
    }

    fn renderer() -> MockWatermarkRenderer {
        let mut renderer = MockWatermarkRenderer::new();
        renderer
            .expect_render()
            .withf(|identity, _| identity == "alice")
            .returning(|_, _| {
                Ok(RasterSize {
                    width: 400,
                    height: 160,
                })
            });
        renderer
    }

    fn request(url: Option<&str>) -> WatermarkRequest {
        WatermarkRequest {
            video_url: url.map(str::to_string),
            username: Some("alice".to_string()),
        }
    }

    fn object_url(bucket: &str, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", bucket, key)
    }

    #[tokio::test]
    async fn processes_and_publishes_a_new_video() {
        let fixture = Fixture::new();
        let mut storage = MockStoragePort::new();
        storage
            .expect_find_by_prefix()
            .withf(|bucket, prefix| bucket == "flow-app-media" && prefix.starts_with("processed/"))
            .times(1)
            .returning(|_, _| Ok(None));
        storage
            .expect_download()
            .withf(|bucket, key, path: &Path| {
                bucket == "flow-app-media" && key == "uploads/clip.mp4" && path.ends_with("input.mp4")
            })
            .times(1)
            .returning(|_, _, path| {
                std::fs::write(path, b"video")?;
                Ok(())
            });
        storage
            .expect_upload()
            .withf(|path: &Path, bucket, key| {
                path.ends_with("with_outro.mp4")
                    && bucket == "flow-app-media"
                    && key.starts_with("processed/")
                    && key.ends_with("_with_outro.mp4")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        storage.expect_object_url().returning(object_url);

        let mut runner = MockCommandRunner::new();
        healthy_tools(&mut runner, ok(""));

        let service = PipelineService::new(storage, runner, renderer(), fixture.config.clone());
        let report = service.handle(&request(Some(SOURCE_URL))).await;

        assert_eq!(report.status, 200, "{:?}", report.body);
        assert_eq!(report.body.message, PROCESSED);
        assert_eq!(report.body.cached, Some(false));
        let url = report.body.url.unwrap();
        assert!(url.starts_with("https://flow-app-media.s3.amazonaws.com/processed/"));
        assert!(url.ends_with("_with_outro.mp4"));
        for stage in STAGES.iter().chain(["total"].iter()) {
            assert!(report.body.processing_time.contains_key(*stage), "missing {}", stage);
        }
        assert_eq!(
            report.history,
            vec![
                JobState::Received,
                JobState::CacheCheck,
                JobState::Downloaded,
                JobState::Probed,
                JobState::WatermarkBuilt,
                JobState::Overlaid,
                JobState::OutroBuilt,
                JobState::Concatenated,
                JobState::Published,
                JobState::Done,
            ]
        );
        assert_eq!(fixture.work_entries(), 0);
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache_without_encoding() {
        let fixture = Fixture::new();
        let published: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let mut storage = MockStoragePort::new();
        let lookup = published.clone();
        storage
            .expect_find_by_prefix()
            .times(2)
            .returning(move |_, prefix| {
                Ok(lookup
                    .lock()
                    .unwrap()
                    .clone()
                    .filter(|key| key.starts_with(prefix)))
            });
        storage.expect_download().times(1).returning(|_, _, _| Ok(()));
        let store = published.clone();
        storage.expect_upload().times(1).returning(move |_, _, key| {
            *store.lock().unwrap() = Some(key.to_string());
            Ok(())
        });
        storage.expect_object_url().returning(object_url);

        let calls = Arc::new(Mutex::new(0usize));
        let mut runner = MockCommandRunner::new();
        let counter = calls.clone();
        runner.expect_invoke().returning(move |program, args| {
            *counter.lock().unwrap() += 1;
            let target = args.last().cloned().unwrap_or_default();
            Ok(match program {
                "ffprobe" if target.ends_with("branding.mp4") => ok(PROBE_BRANDING),
                "ffprobe" if target.contains("watermarked") => ok(PROBE_WATERMARKED),
                "ffprobe" => ok(PROBE_1080P),
                _ => ok(""),
            })
        });

        let service = PipelineService::new(storage, runner, renderer(), fixture.config.clone());
        let first = service.handle(&request(Some(SOURCE_URL))).await;
        let invocations = *calls.lock().unwrap();
        let second = service.handle(&request(Some(SOURCE_URL))).await;

        assert_eq!(first.body.cached, Some(false));
        assert_eq!(second.status, 200);
        assert_eq!(second.body.cached, Some(true));
        assert_eq!(second.body.message, ALREADY_PROCESSED);
        assert_eq!(second.body.url, first.body.url);
        assert_eq!(*calls.lock().unwrap(), invocations);
        assert_eq!(
            second.body.processing_time.keys().collect::<Vec<_>>(),
            vec!["total"]
        );
        assert_eq!(second.history.last(), Some(&JobState::Done));
    }

    #[tokio::test]
    async fn unsupported_extension_touches_nothing() {
        let fixture = Fixture::new();
        let storage = MockStoragePort::new();
        let runner = MockCommandRunner::new();
        let renderer = MockWatermarkRenderer::new();

        let service = PipelineService::new(storage, runner, renderer, fixture.config.clone());
        let report = service
            .handle(&request(Some("https://media.s3.amazonaws.com/clip.webm")))
            .await;

        assert_eq!(report.status, 400);
        assert_eq!(report.body.message, "Unsupported file format: .webm");
        assert!(!fixture.temp.path().join("work").exists());
    }

    #[tokio::test]
    async fn missing_url_is_rejected() {
        let fixture = Fixture::new();
        let service = PipelineService::new(
            MockStoragePort::new(),
            MockCommandRunner::new(),
            MockWatermarkRenderer::new(),
            fixture.config.clone(),
        );
        let report = service.handle(&request(None)).await;

        assert_eq!(report.status, 400);
        assert_eq!(report.body.message, "Missing 'videoUrl' in request body");
        assert!(report.body.processing_time.contains_key("total"));
        let body = serde_json::to_value(&report.body).unwrap();
        assert!(body.get("url").is_none());
        assert!(body.get("processingTime").is_some());
    }

    #[tokio::test]
    async fn encoder_failure_cleans_up_and_reports_stderr() {
        let fixture = Fixture::new();
        let mut storage = MockStoragePort::new();
        storage.expect_find_by_prefix().returning(|_, _| Ok(None));
        storage.expect_download().returning(|_, _, path| {
            std::fs::write(path, b"video")?;
            Ok(())
        });
        storage.expect_upload().never();

        let mut runner = MockCommandRunner::new();
        healthy_tools(&mut runner, failed("Error while filtering: Invalid argument"));

        let service = PipelineService::new(storage, runner, renderer(), fixture.config.clone());
        let report = service.handle(&request(Some(SOURCE_URL))).await;

        assert_eq!(report.status, 500);
        assert_eq!(report.body.message, "Processing failed");
        assert!(report
            .body
            .error
            .as_deref()
            .unwrap()
            .contains("Error while filtering: Invalid argument"));
        assert!(report.body.processing_time.contains_key("download"));
        assert!(report.body.processing_time.contains_key("total"));
        assert_eq!(report.history.last(), Some(&JobState::Failed));
        assert!(report.history.contains(&JobState::WatermarkBuilt));
        assert!(!report.history.contains(&JobState::Overlaid));
        assert_eq!(fixture.work_entries(), 0);
    }

    #[tokio::test]
    async fn failed_cache_lookup_is_a_miss() {
        let fixture = Fixture::new();
        let mut storage = MockStoragePort::new();
        storage
            .expect_find_by_prefix()
            .returning(|_, _| Err("AccessDenied".into()));
        storage
            .expect_download()
            .times(1)
            .returning(|_, _, _| Err("NoSuchKey".into()));

        let service = PipelineService::new(
            storage,
            MockCommandRunner::new(),
            MockWatermarkRenderer::new(),
            fixture.config.clone(),
        );
        let report = service.handle(&request(Some(SOURCE_URL))).await;

        assert_eq!(report.status, 500);
        assert_eq!(
            report.body.error.as_deref(),
            Some("Storage error: NoSuchKey")
        );
        assert_eq!(fixture.work_entries(), 0);
    }

    #[test]
    fn cache_bust_keys_are_unique_but_share_the_prefix() {
        let config = PipelineConfig {
            cache_bust: true,
            ..PipelineConfig::default()
        };
        let service = PipelineService::new(
            MockStoragePort::new(),
            MockCommandRunner::new(),
            MockWatermarkRenderer::new(),
            Arc::new(config.clone()),
        );
        let source = SourceVideo::resolve(&request(Some(SOURCE_URL)), &config).unwrap();
        let a = service.output_key(&source);
        let b = service.output_key(&source);
        assert_ne!(a, b);
        let prefix = format!("processed/{}_with_outro_", source.cache_key);
        assert!(a.starts_with(&prefix) && a.ends_with(".mp4"));
    }
}
