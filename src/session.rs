//! Capture session: the calibrate-once / capture-repeatedly state machine.
//!
//! ```text
//! Idle -> Calibrating -> Terminated
//! Idle -> Ready -> Capturing -> (Ready | Terminated)
//! ```
//!
//! Cycles run strictly one after another. Recognition is CPU-bound and runs on a blocking
//! worker; the only suspension between cycles is the interval sleep. An interrupt is honored at
//! any point of a cycle or a pause. Missing windows and failed
//! grabs back off and retry, dispatch failures are logged and skipped, everything else ends the
//! session.

use crate::calibrate::{self, PointSource};
use crate::capture::FrameSource;
use crate::config::{Calibration, CalibrationStore, Config};
use crate::engine::AnalysisClient;
use crate::error::BoardError;
use crate::fen;
use crate::ocr::{Orientation, Recognition, Recognizer};
use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for the retry delay after repeated capture failures.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Calibrating,
    Ready,
    Capturing,
    Terminated,
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Substring of the browser window title.
    pub title: String,
    pub orientation: Orientation,
    pub interval: Duration,
    /// Stop after the first successful cycle.
    pub once: bool,
    pub debug_dir: Option<PathBuf>,
    /// Analysis server base address.
    pub post: Option<String>,
    /// Consecutive capture failures tolerated before giving up; `None` retries forever.
    pub max_capture_failures: Option<u32>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            title: "Chess.com".to_string(),
            orientation: Orientation::Auto,
            interval: Duration::from_secs(5),
            once: false,
            debug_dir: None,
            post: None,
            max_capture_failures: None,
        }
    }
}

/// Delay before the next attempt after `failures` consecutive capture failures.
pub fn backoff(interval: Duration, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    interval
        .saturating_mul(1 << exponent)
        .min(MAX_BACKOFF)
        .max(interval)
}

pub struct Session<S: FrameSource> {
    config: Config,
    options: SessionOptions,
    source: S,
    state: State,
    last_fen: Option<String>,
}

impl<S: FrameSource> Session<S> {
    pub fn new(config: Config, options: SessionOptions, source: S) -> Self {
        Self {
            config,
            options,
            source,
            state: State::Idle,
            last_fen: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> State {
        self.state
    }

    /// FEN of the most recent successful cycle.
    #[cfg(test)]
    pub fn last_fen(&self) -> Option<&str> {
        self.last_fen.as_deref()
    }

    fn store(&self) -> CalibrationStore {
        CalibrationStore::new(&self.config.calibration_path)
    }

    /// Grabs one frame, asks the operator for the board corners and saves the result.
    pub fn calibrate(&mut self, points: &mut dyn PointSource) -> Result<Calibration> {
        self.state = State::Calibrating;
        let result = self.calibrate_inner(points);
        self.state = State::Terminated;
        result
    }

    fn calibrate_inner(&mut self, points: &mut dyn PointSource) -> Result<Calibration> {
        let frame = self
            .source
            .capture_window(&self.options.title)
            .context("Failed to capture window for calibration")?;
        let calibration = calibrate::acquire(&frame, points)?;
        let store = self.store();
        store
            .save(&calibration)
            .with_context(|| format!("Failed to save calibration to {}", store.path().display()))?;
        info!(
            "Saved calibration {:?} to {}",
            calibration,
            store.path().display()
        );
        Ok(calibration)
    }

    /// Capture loop. Returns after one cycle in single-shot mode, on Ctrl+C, or on a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(interrupt).await
    }

    /// Capture loop that stops cleanly as soon as `shutdown` completes, whether that happens
    /// during a cycle, a dispatch or a pause.
    pub async fn run_until<F: Future>(&mut self, shutdown: F) -> Result<()> {
        let result = self.run_inner(shutdown).await;
        self.state = State::Terminated;
        result
    }

    async fn run_inner<F: Future>(&mut self, shutdown: F) -> Result<()> {
        let calibration = self.store().load()?;
        self.state = State::Ready;
        info!(
            "Loaded calibration {}x{} at ({}, {}), {}px squares",
            calibration.width(),
            calibration.height(),
            calibration.left,
            calibration.top,
            calibration.square_size()
        );

        if let Some(dir) = &self.options.debug_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create debug directory {}", dir.display()))?;
        }
        let sink = match &self.options.post {
            Some(base) => {
                let sink = AnalysisClient::new(base, &self.config.dispatch)?;
                info!("Posting positions to {}", sink.url());
                Some(sink)
            }
            None => None,
        };
        let recognizer = Arc::new(Recognizer {
            calibration,
            templates_dir: self.config.templates_dir.clone(),
            params: self.config.recognition.clone(),
            orientation: self.options.orientation,
            debug_dir: self.options.debug_dir.clone(),
        });

        // Listening starts before the first grab so an interrupt is never missed.
        tokio::pin!(shutdown);
        let mut failures = 0u32;
        loop {
            self.state = State::Capturing;
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Interrupted, stopping capture loop");
                    return Ok(());
                }
                outcome = self.step(&recognizer, sink.as_ref()) => outcome?,
            };

            let delay = match outcome {
                Ok(()) => {
                    failures = 0;
                    if self.options.once {
                        return Ok(());
                    }
                    self.options.interval
                }
                Err(e) if e.is_recoverable() => {
                    failures += 1;
                    if self
                        .options
                        .max_capture_failures
                        .is_some_and(|max| failures >= max)
                    {
                        bail!(e);
                    }
                    let delay = backoff(self.options.interval, failures);
                    warn!("{} (attempt {}), retrying in {:?}", e, failures, delay);
                    delay
                }
                Err(e) => return Err(e.into()),
            };

            self.state = State::Ready;
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Interrupted, stopping capture loop");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One cycle: capture, recognize, report. The outer result carries worker failures, the
    /// inner one capture and recognition errors.
    async fn step(
        &mut self,
        recognizer: &Arc<Recognizer>,
        sink: Option<&AnalysisClient>,
    ) -> Result<std::result::Result<(), BoardError>> {
        let recognition = match self.cycle(recognizer).await? {
            Ok(recognition) => recognition,
            Err(e) => return Ok(Err(e)),
        };
        self.report(&recognition, sink).await;
        self.last_fen = Some(recognition.fen);
        Ok(Ok(()))
    }

    async fn cycle(
        &mut self,
        recognizer: &Arc<Recognizer>,
    ) -> Result<std::result::Result<Recognition, BoardError>> {
        let frame = match self.source.capture_window(&self.options.title) {
            Ok(frame) => frame,
            Err(e) => return Ok(Err(e)),
        };
        let recognizer = Arc::clone(recognizer);
        tokio::task::spawn_blocking(move || recognizer.recognize(&frame))
            .await
            .context("Recognition task failed")
    }

    async fn report(&self, recognition: &Recognition, sink: Option<&AnalysisClient>) {
        let fen = &recognition.fen;
        println!("Detected FEN: {}", fen);
        if recognition.flipped {
            debug!("Board was rotated to put white at the bottom");
        }
        if self.last_fen.as_deref() == Some(fen.as_str()) {
            debug!("Position unchanged since the last cycle");
        }
        if fen::is_empty_board(fen) {
            warn!("Board appears empty. Check templates, threshold and calibration.");
        } else if let Err(reason) = fen::check_position(fen) {
            warn!("Detected position is not legal ({}); some squares may be misread", reason);
        }

        if let Some(sink) = sink {
            match sink.dispatch(fen).await {
                Ok(body) => info!("Server response: {}", body),
                Err(e) => warn!("{}", e),
            }
        }
    }
}
