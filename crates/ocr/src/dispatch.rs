use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::recognizer::OcrBackend;
use crate::types::{ImageVariant, OutcomeKind, PassOutcome, PassReport, RecognitionConfig};

/// One (image variant, recognizer configuration) pairing to execute.
#[derive(Debug, Clone)]
pub struct RecognitionPass {
    pub index: usize,
    pub variant: Arc<ImageVariant>,
    pub config: RecognitionConfig,
}

/// Pass-level progress, emitted while `recognize_all` runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Started { index: usize },
    Settled { index: usize, kind: OutcomeKind },
}

/// Run the blocking recognizer for one pass, bounded by `timeout`.
///
/// Never returns an error: engine failures, panics and expiry all become a
/// [`PassOutcome`]. On expiry the blocking call is abandoned, not joined.
pub async fn recognize<R: OcrBackend + 'static>(
    backend: Arc<R>,
    variant: Arc<ImageVariant>,
    config: RecognitionConfig,
    timeout: Duration,
) -> PassOutcome {
    let handle = tokio::task::spawn_blocking(move || backend.recognize(&variant.bytes, &config));
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(text))) => PassOutcome::Recognized(text),
        Ok(Ok(Err(e))) => PassOutcome::Failed(e.to_string()),
        Ok(Err(join_err)) => PassOutcome::Failed(format!("recognizer task aborted: {join_err}")),
        Err(_) => PassOutcome::TimedOut,
    }
}

/// Issues recognition passes concurrently and waits for every one to settle.
pub struct Dispatcher<R: OcrBackend + 'static> {
    backend: Arc<R>,
    timeout: Duration,
    progress: Option<mpsc::UnboundedSender<DispatchEvent>>,
}

impl<R: OcrBackend + 'static> Dispatcher<R> {
    pub fn new(backend: R, timeout: Duration) -> Self {
        Self::from_arc(Arc::new(backend), timeout)
    }

    pub fn from_arc(backend: Arc<R>, timeout: Duration) -> Self {
        Self { backend, timeout, progress: None }
    }

    /// Report [`DispatchEvent`]s to `tx`. A dropped receiver is ignored.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<DispatchEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Join/barrier over all passes. Returns one report per pass, ordered by
    /// pass index regardless of completion order. Cancelling `cancel`
    /// settles outstanding passes as [`PassOutcome::Cancelled`].
    pub async fn recognize_all(
        &self,
        passes: Vec<RecognitionPass>,
        cancel: &CancellationToken,
    ) -> Vec<PassReport> {
        let mut handles = Vec::with_capacity(passes.len());
        for pass in passes {
            let meta = (pass.index, pass.variant.name(), pass.config.preset);
            let span = info_span!(
                "recognition_pass",
                index = pass.index,
                variant = pass.variant.name(),
                config = %pass.config.preset,
            );
            let backend = Arc::clone(&self.backend);
            let timeout = self.timeout;
            let progress = self.progress.clone();
            let cancel = cancel.clone();

            let handle = tokio::spawn(
                async move {
                    emit(&progress, DispatchEvent::Started { index: pass.index });
                    let started = Instant::now();
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => PassOutcome::Cancelled,
                        outcome = recognize(backend, pass.variant.clone(), pass.config.clone(), timeout) => outcome,
                    };
                    let elapsed = started.elapsed();
                    log_outcome(&outcome, elapsed, timeout);
                    emit(
                        &progress,
                        DispatchEvent::Settled { index: pass.index, kind: outcome.kind() },
                    );
                    PassReport {
                        index: pass.index,
                        variant: pass.variant.name(),
                        preset: pass.config.preset,
                        outcome,
                        elapsed,
                    }
                }
                .instrument(span),
            );
            handles.push((meta, handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for ((index, variant, preset), handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => PassReport {
                    index,
                    variant,
                    preset,
                    outcome: PassOutcome::Failed(format!("pass task failed: {e}")),
                    elapsed: Duration::ZERO,
                },
            };
            reports.push(report);
        }
        reports.sort_by_key(|r| r.index);
        reports
    }
}

fn emit(progress: &Option<mpsc::UnboundedSender<DispatchEvent>>, event: DispatchEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}

fn log_outcome(outcome: &PassOutcome, elapsed: Duration, timeout: Duration) {
    let ms = elapsed.as_millis();
    match outcome {
        PassOutcome::Recognized(text) => debug!(ms, chars = text.len(), "pass recognized"),
        PassOutcome::TimedOut => warn!(ms, limit_ms = timeout.as_millis(), "pass timed out"),
        PassOutcome::Failed(e) => warn!(ms, error = %e, "pass failed"),
        PassOutcome::Cancelled => debug!(ms, "pass cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::testing::{Script, ScriptedRecognizer};
    use crate::types::{RecognitionPreset, Technique};

    fn variant() -> Arc<ImageVariant> {
        Arc::new(ImageVariant {
            technique: Technique::Passthrough,
            bytes: vec![],
            width: 1,
            height: 1,
        })
    }

    fn passes(presets: &[RecognitionPreset]) -> Vec<RecognitionPass> {
        presets
            .iter()
            .enumerate()
            .map(|(index, p)| RecognitionPass { index, variant: variant(), config: p.config() })
            .collect()
    }

    #[tokio::test]
    async fn single_pass_recognizes() {
        let backend = Arc::new(ScriptedRecognizer::new().on(RecognitionPreset::Auto, Script::Text("Ward: 5")));
        let out = recognize(backend, variant(), RecognitionPreset::Auto.config(), Duration::from_secs(5)).await;
        assert_eq!(out, PassOutcome::Recognized("Ward: 5".into()));
    }

    #[tokio::test]
    async fn slow_pass_times_out_without_waiting() {
        let backend = Arc::new(ScriptedRecognizer::new().on(RecognitionPreset::Auto, Script::Sleep(600, "late")));
        let started = Instant::now();
        let out = recognize(backend, variant(), RecognitionPreset::Auto.config(), Duration::from_millis(50)).await;
        assert_eq!(out, PassOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn reports_are_ordered_by_index_not_completion() {
        let dispatcher = Dispatcher::new(
            ScriptedRecognizer::new()
                .on(RecognitionPreset::SingleBlock, Script::Sleep(150, "first"))
                .on(RecognitionPreset::Auto, Script::Text("second")),
            Duration::from_secs(5),
        );
        let reports = dispatcher
            .recognize_all(
                passes(&[RecognitionPreset::SingleBlock, RecognitionPreset::Auto]),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].index, 0);
        assert_eq!(reports[0].outcome.text(), Some("first"));
        assert_eq!(reports[1].outcome.text(), Some("second"));
        assert_eq!(reports[1].preset, RecognitionPreset::Auto);
    }

    #[tokio::test]
    async fn failures_do_not_abort_siblings() {
        let dispatcher = Dispatcher::new(
            ScriptedRecognizer::new()
                .on(RecognitionPreset::SingleBlock, Script::Fail("engine exploded"))
                .on(RecognitionPreset::Auto, Script::Sleep(500, "too slow"))
                .on(RecognitionPreset::AutoOsd, Script::Panic)
                .on(RecognitionPreset::SingleColumn, Script::Text("Surname: OKORO")),
            Duration::from_millis(100),
        );
        let reports = dispatcher
            .recognize_all(
                passes(&[
                    RecognitionPreset::SingleBlock,
                    RecognitionPreset::Auto,
                    RecognitionPreset::AutoOsd,
                    RecognitionPreset::SingleColumn,
                ]),
                &CancellationToken::new(),
            )
            .await;
        let kinds: Vec<OutcomeKind> = reports.iter().map(|r| r.outcome.kind()).collect();
        assert_eq!(
            kinds,
            vec![OutcomeKind::Failed, OutcomeKind::TimedOut, OutcomeKind::Failed, OutcomeKind::Recognized]
        );
        assert_eq!(reports[3].outcome.text(), Some("Surname: OKORO"));
    }

    #[tokio::test]
    async fn passes_run_concurrently() {
        let dispatcher = Dispatcher::new(
            ScriptedRecognizer::new()
                .on(RecognitionPreset::SingleBlock, Script::Sleep(200, "a"))
                .on(RecognitionPreset::Auto, Script::Sleep(200, "b"))
                .on(RecognitionPreset::AutoOsd, Script::Sleep(200, "c"))
                .on(RecognitionPreset::SingleColumn, Script::Sleep(200, "d")),
            Duration::from_secs(5),
        );
        let started = Instant::now();
        let reports = dispatcher
            .recognize_all(
                passes(&[
                    RecognitionPreset::SingleBlock,
                    RecognitionPreset::Auto,
                    RecognitionPreset::AutoOsd,
                    RecognitionPreset::SingleColumn,
                ]),
                &CancellationToken::new(),
            )
            .await;
        assert!(reports.iter().all(|r| r.outcome.kind() == OutcomeKind::Recognized));
        assert!(started.elapsed() < Duration::from_millis(700), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn cancellation_abandons_outstanding_passes() {
        let dispatcher = Dispatcher::new(
            ScriptedRecognizer::new()
                .on(RecognitionPreset::Auto, Script::Sleep(400, "never seen"))
                .on(RecognitionPreset::SingleBlock, Script::Text("fast")),
            Duration::from_secs(5),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let reports = dispatcher
            .recognize_all(passes(&[RecognitionPreset::SingleBlock, RecognitionPreset::Auto]), &cancel)
            .await;
        assert_eq!(reports[0].outcome.text(), Some("fast"));
        assert_eq!(reports[1].outcome, PassOutcome::Cancelled);
    }

    #[tokio::test]
    async fn progress_events_cover_every_pass() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(
            ScriptedRecognizer::new().on(RecognitionPreset::SingleBlock, Script::Fail("nope")),
            Duration::from_secs(5),
        )
        .with_progress(tx);
        dispatcher
            .recognize_all(
                passes(&[RecognitionPreset::SingleBlock, RecognitionPreset::Auto]),
                &CancellationToken::new(),
            )
            .await;
        drop(dispatcher);

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert_eq!(events.len(), 4);
        assert!(events.contains(&DispatchEvent::Started { index: 1 }));
        assert!(events.contains(&DispatchEvent::Settled { index: 0, kind: OutcomeKind::Failed }));
        assert!(events.contains(&DispatchEvent::Settled { index: 1, kind: OutcomeKind::Recognized }));
    }

    #[tokio::test]
    async fn empty_plan_returns_no_reports() {
        let dispatcher = Dispatcher::new(ScriptedRecognizer::new(), Duration::from_secs(1));
        let reports = dispatcher.recognize_all(vec![], &CancellationToken::new()).await;
        assert!(reports.is_empty());
    }
}
