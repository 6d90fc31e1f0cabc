//! # Transcoder Service
//!
//! Owns the shared transcoding engine and serialises every conversion
//! through it.
//!
//! ## Architecture
//!
//! ```text
//! callers ──convert──> bounded queue ──> worker task ──> TranscodingEngine
//!    ↑                                        │
//!    └────────────── oneshot reply ───────────┘
//! ```
//!
//! - The engine is loaded once, on the first conversion or an explicit
//!   [`TranscoderService::init`]. Concurrent first callers share one load.
//! - A single worker drains the queue, so two conversions never touch the
//!   engine at the same time.
//! - Compatible files are returned as-is without loading the engine.
//!
//! ## Usage
//!
//! ```ignore
//! let service = TranscoderService::new(Arc::new(FfmpegEngine::new(&settings)?), settings);
//! let mp3 = service.convert_to_universal_format(upload, None).await?;
//! service.shutdown().await?;
//! ```

use crate::error::{ConversionStage, Result, TranscodeError};
use crate::format::{converted_file_name, AudioFile, TARGET_MIME_TYPE};
use crate::job::{ConversionJob, ConversionMilestone, ConversionProgress};
use bridge_traits::transcode::{ProgressCallback, TranscodingEngine};
use core_async::sync::{mpsc, oneshot, CancellationToken, Mutex, OnceCell};
use core_async::task::JoinHandle;
use core_runtime::config::TranscoderSettings;
use core_runtime::events::{ConversionEvent, CoreEvent, EventBus};
use core_runtime::logging::strip_path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Receives progress reports of one conversion.
pub type ProgressSink = Arc<dyn Fn(ConversionProgress) + Send + Sync>;

struct ConversionRequest {
    job: ConversionJob,
    progress: Option<ProgressSink>,
    reply: oneshot::Sender<ConversionJob>,
}

/// Process-wide conversion service. Cheap to clone; clones share the engine
/// and the queue.
#[derive(Clone)]
pub struct TranscoderService {
    inner: Arc<Inner>,
}

struct Inner {
    engine: Arc<dyn TranscodingEngine>,
    settings: TranscoderSettings,
    events: Option<EventBus>,
    ready: OnceCell<()>,
    requests: Mutex<Option<mpsc::Sender<ConversionRequest>>>,
    pending: Mutex<Option<mpsc::Receiver<ConversionRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl TranscoderService {
    pub fn new(engine: Arc<dyn TranscodingEngine>, settings: TranscoderSettings) -> Self {
        Self::build(engine, settings, None)
    }

    /// Publishes [`ConversionEvent`]s on `bus`.
    pub fn with_event_bus(
        engine: Arc<dyn TranscodingEngine>,
        settings: TranscoderSettings,
        bus: EventBus,
    ) -> Self {
        Self::build(engine, settings, Some(bus))
    }

    fn build(
        engine: Arc<dyn TranscodingEngine>,
        settings: TranscoderSettings,
        events: Option<EventBus>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(settings.queue_depth.max(1));
        Self {
            inner: Arc::new(Inner {
                engine,
                settings,
                events,
                ready: OnceCell::new(),
                requests: Mutex::new(Some(tx)),
                pending: Mutex::new(Some(rx)),
                worker: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.initialized()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Loads the engine and starts the worker. Idempotent.
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(TranscodeError::ServiceShutDown);
        }

        let inner = &self.inner;
        inner
            .ready
            .get_or_try_init(|| async {
                info!("Loading transcoding engine");
                inner
                    .engine
                    .load()
                    .await
                    .map_err(TranscodeError::at(ConversionStage::Load))?;

                let receiver = inner
                    .pending
                    .lock()
                    .await
                    .take()
                    .ok_or(TranscodeError::ServiceShutDown)?;
                let worker = Worker {
                    engine: inner.engine.clone(),
                    settings: inner.settings.clone(),
                    events: inner.events.clone(),
                };
                let handle = core_async::spawn(
                    worker
                        .run(receiver, inner.shutdown.clone())
                        .instrument(tracing::info_span!("transcoder_worker")),
                );
                *inner.worker.lock().await = Some(handle);
                info!("Transcoding engine ready");
                Ok::<(), TranscodeError>(())
            })
            .await?;
        Ok(())
    }

    /// Converts `file` to MP3 if its format requires it.
    ///
    /// Compatible files are returned unchanged, sharing the same buffer.
    /// A failed conversion yields an error and no output; callers must not
    /// fall back to the original file.
    pub async fn convert_to_universal_format(
        &self,
        file: AudioFile,
        progress: Option<ProgressSink>,
    ) -> Result<AudioFile> {
        let job = self.convert(file, progress).await?;
        let job_id = job.id;
        let stage = job.failed_stage.unwrap_or(ConversionStage::Exec);
        let message = job.error_message.clone();

        job.into_output()
            .ok_or_else(|| TranscodeError::ConversionFailed {
                stage,
                message: message.unwrap_or_else(|| format!("job {job_id} produced no output")),
            })
    }

    /// Runs `file` through the queue and returns the finished job.
    ///
    /// Engine failures are recorded in the returned job; `Err` is reserved
    /// for service-level failures (shutdown, engine load).
    #[instrument(skip(self, file, progress), fields(file = %strip_path(&file.name)))]
    pub async fn convert(
        &self,
        file: AudioFile,
        progress: Option<ProgressSink>,
    ) -> Result<ConversionJob> {
        let job = ConversionJob::new(file);
        if job.status.is_terminal() {
            debug!("Format is compatible, no conversion needed");
            return Ok(job);
        }

        self.init().await?;

        let sender = self
            .inner
            .requests
            .lock()
            .await
            .clone()
            .ok_or(TranscodeError::ServiceShutDown)?;

        info!(job_id = %job.id, "Queueing conversion");
        self.emit(ConversionEvent::Queued {
            job_id: job.id.to_string(),
            file_name: job.source.name.clone(),
        });

        let (reply, response) = oneshot::channel();
        sender
            .send(ConversionRequest {
                job,
                progress,
                reply,
            })
            .await
            .map_err(|_| TranscodeError::ServiceShutDown)?;

        response.await.map_err(|_| TranscodeError::ServiceShutDown)
    }

    /// Stops accepting work, lets the running conversion finish and
    /// releases the engine. Queued requests fail with
    /// [`TranscodeError::ServiceShutDown`].
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        if self.inner.shutdown.is_cancelled() {
            return Ok(());
        }
        self.inner.shutdown.cancel();
        self.inner.requests.lock().await.take();

        let worker = self.inner.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                warn!(error = %err, "Transcoder worker ended abnormally");
            }
        }

        if self.inner.engine.is_loaded() {
            self.inner.engine.terminate().await?;
        }
        info!("Transcoder service shut down");
        Ok(())
    }

    fn emit(&self, event: ConversionEvent) {
        emit(&self.inner.events, event);
    }
}

fn emit(events: &Option<EventBus>, event: ConversionEvent) {
    if let Some(bus) = events {
        bus.emit(CoreEvent::Conversion(event)).ok();
    }
}

// ============================================================================
// Worker
// ============================================================================

struct Worker {
    engine: Arc<dyn TranscodingEngine>,
    settings: TranscoderSettings,
    events: Option<EventBus>,
}

impl Worker {
    async fn run(self, mut requests: mpsc::Receiver<ConversionRequest>, shutdown: CancellationToken) {
        loop {
            core_async::select! {
                biased;

                _ = shutdown.cancelled() => break,

                request = requests.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
            }
        }
        debug!("Transcoder worker stopped");
    }

    async fn handle(&self, request: ConversionRequest) {
        let ConversionRequest {
            mut job,
            progress,
            reply,
        } = request;
        let report = |update: ConversionProgress| {
            if let Some(sink) = &progress {
                sink(update);
            }
        };

        if let Err(err) = job.start() {
            error!(job_id = %job.id, error = %err, "Conversion job in unexpected state");
            reply.send(job).ok();
            return;
        }
        report(ConversionProgress::new(ConversionMilestone::Preparing, 0));

        let reached = Arc::new(AtomicU8::new(0));
        let outcome = self.transcode(&job, progress.clone(), reached.clone()).await;
        job.update_progress(reached.load(Ordering::Relaxed));
        let job_id = job.id.to_string();
        let recorded = match outcome {
            Ok(output) => {
                report(ConversionProgress::new(ConversionMilestone::Finalizing, 100));
                info!(job_id = %job_id, output = %output.name, bytes = output.len(), "Conversion completed");
                emit(
                    &self.events,
                    ConversionEvent::Completed {
                        job_id,
                        output_name: output.name.clone(),
                        output_bytes: output.len() as u64,
                    },
                );
                job.complete(output)
            }
            Err(err) => {
                error!(job_id = %job_id, error = %err, "Conversion failed");
                emit(
                    &self.events,
                    ConversionEvent::Failed {
                        job_id,
                        message: err.to_string(),
                    },
                );
                match err {
                    TranscodeError::ConversionFailed { stage, message } => job.fail(stage, message),
                    other => job.fail(ConversionStage::Exec, other.to_string()),
                }
            }
        };
        if let Err(err) = recorded {
            error!(error = %err, "Could not record conversion outcome");
        }

        if reply.send(job).is_err() {
            debug!("Conversion caller went away before the result");
        }
    }

    /// Runs one conversion on the engine. Virtual files are removed whether
    /// or not the conversion succeeds.
    async fn transcode(
        &self,
        job: &ConversionJob,
        progress: Option<ProgressSink>,
        reached: Arc<AtomicU8>,
    ) -> Result<AudioFile> {
        let id = job.id.simple();
        let input = match job.source.extension() {
            Some(ext) => format!("input-{id}.{ext}"),
            None => format!("input-{id}"),
        };
        let output = format!("output-{id}.mp3");

        let result = self.run_engine(job, &input, &output, progress, reached).await;

        for name in [&input, &output] {
            if let Err(err) = self.engine.delete_file(name).await {
                debug!(file = %name, error = %err, "Virtual file cleanup failed");
            }
        }

        let data = result?;
        if data.is_empty() {
            return Err(TranscodeError::ConversionFailed {
                stage: ConversionStage::Read,
                message: "engine produced an empty file".to_string(),
            });
        }
        Ok(AudioFile::new(
            converted_file_name(&job.source.name),
            TARGET_MIME_TYPE,
            data,
        ))
    }

    async fn run_engine(
        &self,
        job: &ConversionJob,
        input: &str,
        output: &str,
        progress: Option<ProgressSink>,
        reached: Arc<AtomicU8>,
    ) -> Result<bytes::Bytes> {
        self.engine
            .write_file(input, job.source.data.clone())
            .await
            .map_err(TranscodeError::at(ConversionStage::Write))?;

        let callback = self.progress_callback(job, progress, reached);
        callback(0.0);
        let args = encode_args(&self.settings, input, output);
        debug!(?args, "Running transcoding engine");
        self.engine
            .exec(&args, callback)
            .await
            .map_err(TranscodeError::at(ConversionStage::Exec))?;

        self.engine
            .read_file(output)
            .await
            .map_err(TranscodeError::at(ConversionStage::Read))
    }

    /// Bridges engine ratios to caller reports and bus events. Bus events
    /// are only sent when the whole percentage changes. `reached` keeps the
    /// highest percentage so the job can record it.
    fn progress_callback(
        &self,
        job: &ConversionJob,
        sink: Option<ProgressSink>,
        reached: Arc<AtomicU8>,
    ) -> ProgressCallback {
        let events = self.events.clone();
        let job_id = job.id.to_string();
        let last = AtomicU8::new(u8::MAX);

        Arc::new(move |ratio: f64| {
            let update = ConversionProgress::from_ratio(ratio);
            reached.fetch_max(update.percent, Ordering::Relaxed);
            if let Some(sink) = &sink {
                sink(update);
            }
            if last.swap(update.percent, Ordering::Relaxed) != update.percent {
                emit(
                    &events,
                    ConversionEvent::Progress {
                        job_id: job_id.clone(),
                        percent: update.percent,
                    },
                );
            }
        })
    }
}

/// Engine arguments re-encoding `input` to MP3 in `output`.
pub fn encode_args(settings: &TranscoderSettings, input: &str, output: &str) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.to_string(),
        "-vn".to_string(),
        "-ar".to_string(),
        settings.sample_rate_hz.to_string(),
        "-ac".to_string(),
        settings.channels.to_string(),
        "-b:a".to_string(),
        format!("{}k", settings.bitrate_kbps),
        output.to_string(),
    ]
}
