use crate::domain::errors::PipelineError;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stage names reported in `processingTime`.
pub const STAGES: [&str; 5] = ["download", "watermark", "outro", "concat", "upload"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobState {
    Received,
    CacheCheck,
    Downloaded,
    Probed,
    WatermarkBuilt,
    Overlaid,
    OutroBuilt,
    Concatenated,
    Published,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// One watermarking run: its temp files, its stage timings and where it got to.
#[derive(Debug)]
pub struct JobContext {
    pub cache_key: String,
    work_dir: Option<PathBuf>,
    artifacts: Vec<PathBuf>,
    timings: BTreeMap<&'static str, f64>,
    history: Vec<JobState>,
    started: Instant,
}

impl JobContext {
    pub fn new(cache_key: impl Into<String>) -> Self {
        Self {
            cache_key: cache_key.into(),
            work_dir: None,
            artifacts: Vec::new(),
            timings: BTreeMap::new(),
            history: vec![JobState::Received],
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> JobState {
        *self.history.last().unwrap_or(&JobState::Received)
    }

    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    /// Move forward. States only ever advance; terminal states are final.
    pub fn advance(&mut self, next: JobState) {
        let current = self.state();
        if current.is_terminal() || (next != JobState::Failed && next <= current) {
            warn!(?current, ?next, "ignoring out of order state transition");
            return;
        }
        debug!(cache_key = %self.cache_key, ?next, "job state");
        self.history.push(next);
    }

    /// Create this job's private directory under `temp_root`.
    ///
    /// The name combines the cache key and a per-run nonce, so two runs for
    /// the same source never share paths.
    pub async fn create_work_dir(&mut self, temp_root: &Path) -> Result<PathBuf, PipelineError> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let dir = temp_root.join(format!("{}-{}", self.cache_key, &nonce[..8]));
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            PipelineError::Storage(format!("cannot create {}: {}", dir.display(), e))
        })?;
        self.artifacts.push(dir.clone());
        self.work_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Reserve a file name inside the work directory and take ownership of it.
    pub fn artifact(&mut self, file_name: &str) -> Result<PathBuf, PipelineError> {
        let dir = self.work_dir.as_ref().ok_or_else(|| {
            PipelineError::Storage("work directory has not been created".to_string())
        })?;
        let path = dir.join(file_name);
        self.artifacts.push(path.clone());
        Ok(path)
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Run `fut` and add its wall time to `stage`.
    pub async fn timed<F, T>(&mut self, stage: &'static str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let out = fut.await;
        let elapsed = start.elapsed().as_secs_f64();
        *self.timings.entry(stage).or_insert(0.0) += elapsed;
        info!(cache_key = %self.cache_key, stage, elapsed = round2(elapsed), "stage finished");
        out
    }

    /// Stage durations so far plus `total`, in seconds with two decimals.
    pub fn processing_time(&self) -> BTreeMap<String, f64> {
        let mut out: BTreeMap<String, f64> = self
            .timings
            .iter()
            .map(|(stage, secs)| (stage.to_string(), round2(*secs)))
            .collect();
        out.insert(
            "total".to_string(),
            round2(self.started.elapsed().as_secs_f64()),
        );
        out
    }

    /// Remove every artifact, newest first. Failures are logged and skipped.
    pub async fn cleanup(&mut self) -> usize {
        let mut failures = 0;
        while let Some(path) = self.artifacts.pop() {
            let result = match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&path).await,
                Ok(_) => tokio::fs::remove_file(&path).await,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                failures += 1;
                warn!(path = %path.display(), "failed to remove temp artifact: {}", e);
            }
        }
        self.work_dir = None;
        failures
    }
}

fn round2(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}
