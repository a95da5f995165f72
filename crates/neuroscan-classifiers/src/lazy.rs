//! Lazy, concurrency-safe construction of the served classifier
//!
//! The classifier is built at most once, on first use. Once built, callers
//! read it through a [`OnceLock`] without taking any lock. Before that,
//! callers serialize on an async mutex and re-check under it, so exactly one
//! construction runs at a time. The construction is a spawned task that owns
//! the lock until its outcome is recorded, so a cancelled caller cannot
//! orphan it. Callers that waited behind a failing attempt receive that
//! attempt's error; the next independent caller starts a fresh attempt, so
//! a failure never poisons the handle.

use crate::classifier::Classifier;
use async_trait::async_trait;
use neuroscan_core::{CompatibilityGate, Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Pluggable constructor for the served classifier.
///
/// Implemented by the ViT pipeline in production and by mocks in tests.
#[async_trait]
pub trait ClassifierFactory: Send + Sync {
    /// Build a ready-to-use classifier (may download and load weights)
    async fn build(&self) -> Result<Arc<dyn Classifier>>;

    /// Identifier of the model this factory builds
    fn model_id(&self) -> &str;
}

/// Lazily-initialized classifier handle shared by all request handlers
pub struct LazyClassifier {
    shared: Arc<Shared>,
}

struct Shared {
    factory: Arc<dyn ClassifierFactory>,
    gate: Arc<CompatibilityGate>,
    handle: OnceLock<Arc<dyn Classifier>>,
    construction: Arc<Mutex<Option<Arc<Error>>>>,
    started: AtomicU64,
    finished: AtomicU64,
}

impl LazyClassifier {
    /// Create an uninitialized handle
    pub fn new(factory: Arc<dyn ClassifierFactory>, gate: Arc<CompatibilityGate>) -> Self {
        Self {
            shared: Arc::new(Shared {
                factory,
                gate,
                handle: OnceLock::new(),
                construction: Arc::new(Mutex::new(None)),
                started: AtomicU64::new(0),
                finished: AtomicU64::new(0),
            }),
        }
    }

    /// Get the classifier, constructing it on first use.
    ///
    /// The construction runs on its own task, which holds the lock until it
    /// finishes. Dropping the calling future abandons only the wait, never
    /// the attempt.
    pub async fn get(&self) -> Result<Arc<dyn Classifier>> {
        let shared = &self.shared;
        if let Some(classifier) = shared.handle.get() {
            return Ok(Arc::clone(classifier));
        }

        let observed = shared.finished.load(Ordering::Acquire);
        let last_failure = Arc::clone(&shared.construction).lock_owned().await;

        if let Some(classifier) = shared.handle.get() {
            return Ok(Arc::clone(classifier));
        }

        // An attempt finished while we queued and left no handle: it failed
        if shared.finished.load(Ordering::Acquire) != observed {
            if let Some(failure) = last_failure.as_ref() {
                return Err(Error::initialization(self.model_id(), Arc::clone(failure)));
            }
        }

        if shared.gate.is_incompatible() {
            return Err(Error::compatibility(shared.gate.message()));
        }

        let attempt = tokio::spawn(Arc::clone(shared).construct(last_failure));
        match attempt.await {
            Ok(Ok(classifier)) => Ok(classifier),
            Ok(Err(failure)) => Err(Error::initialization(self.model_id(), failure)),
            Err(e) => Err(Error::initialization(
                self.model_id(),
                Arc::new(Error::internal(format!("Model construction task failed: {}", e))),
            )),
        }
    }

    /// Build eagerly; failures are logged and left for the lazy path to retry
    pub async fn preload(&self) -> bool {
        match self.get().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e.chain(), "Model preload failed, will retry on first request");
                false
            }
        }
    }

    /// True once the classifier has been constructed
    pub fn is_ready(&self) -> bool {
        self.shared.handle.get().is_some()
    }

    /// Number of construction attempts started so far
    pub fn attempts(&self) -> u64 {
        self.shared.started.load(Ordering::Relaxed)
    }

    /// Identifier of the served model
    pub fn model_id(&self) -> &str {
        self.shared.factory.model_id()
    }

    /// The compatibility gate this loader consults
    pub fn gate(&self) -> &CompatibilityGate {
        &self.shared.gate
    }
}

impl Shared {
    /// One construction attempt; the guard is released only after the
    /// outcome is recorded
    async fn construct(
        self: Arc<Self>,
        mut last_failure: OwnedMutexGuard<Option<Arc<Error>>>,
    ) -> std::result::Result<Arc<dyn Classifier>, Arc<Error>> {
        let model = self.factory.model_id();
        let attempt = self.started.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(%model, attempt, "Loading model");
        let start = Instant::now();

        let outcome = match self.factory.build().await {
            Ok(classifier) => {
                *last_failure = None;
                let classifier = Arc::clone(self.handle.get_or_init(|| classifier));
                tracing::info!(
                    %model,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Model loaded successfully"
                );
                metrics::counter!("neuroscan_model_loads_total", "outcome" => "success").increment(1);
                Ok(classifier)
            }
            Err(e) => {
                tracing::error!(%model, attempt, error = %e.chain(), "Model construction failed");
                metrics::counter!("neuroscan_model_loads_total", "outcome" => "failure").increment(1);
                let failure = Arc::new(e);
                *last_failure = Some(Arc::clone(&failure));
                Err(failure)
            }
        };

        self.finished.fetch_add(1, Ordering::Release);
        drop(last_failure);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use neuroscan_core::Prediction;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct StaticClassifier;

    #[async_trait]
    impl Classifier for StaticClassifier {
        async fn classify_batch(
            &self,
            images: Vec<RgbImage>,
            _top_k: usize,
        ) -> Result<Vec<Vec<Prediction>>> {
            Ok(images
                .iter()
                .map(|_| vec![Prediction::new("notumor", 1.0)])
                .collect())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    /// Factory that counts builds and fails the first `failures` of them.
    ///
    /// The load itself sleeps on the blocking pool, the way the ViT factory
    /// does its real work, so it outlives a cancelled caller.
    struct CountingFactory {
        builds: AtomicUsize,
        failures: usize,
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl CountingFactory {
        fn new(failures: usize) -> Self {
            Self::with_delay(failures, Duration::from_millis(50))
        }

        fn with_delay(failures: usize, delay: Duration) -> Self {
            Self {
                builds: AtomicUsize::new(0),
                failures,
                delay,
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn builds(&self) -> usize {
            self.builds.load(Ordering::SeqCst)
        }

        fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClassifierFactory for CountingFactory {
        async fn build(&self) -> Result<Arc<dyn Classifier>> {
            let n = self.builds.fetch_add(1, Ordering::SeqCst);

            let in_flight = Arc::clone(&self.in_flight);
            let max_in_flight = Arc::clone(&self.max_in_flight);
            let delay = self.delay;
            tokio::task::spawn_blocking(move || {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(delay);
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })
            .await
            .map_err(|e| Error::internal(e.to_string()))?;

            if n < self.failures {
                return Err(Error::model_load(format!("download failed (attempt {})", n + 1)));
            }
            Ok(Arc::new(StaticClassifier))
        }

        fn model_id(&self) -> &str {
            "test/model"
        }
    }

    fn lazy(factory: Arc<CountingFactory>, gate: CompatibilityGate) -> Arc<LazyClassifier> {
        Arc::new(LazyClassifier::new(factory, Arc::new(gate)))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_builds_once() {
        let factory = Arc::new(CountingFactory::new(0));
        let loader = lazy(Arc::clone(&factory), CompatibilityGate::compatible());

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let loader = Arc::clone(&loader);
                tokio::spawn(async move { loader.get().await })
            })
            .collect();

        let handles: Vec<Arc<dyn Classifier>> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().ok().unwrap())
            .collect();

        assert_eq!(factory.builds(), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert!(loader.is_ready());
        assert_eq!(loader.attempts(), 1);
    }

    #[tokio::test]
    async fn test_waiters_share_failed_attempt() {
        let factory = Arc::new(CountingFactory::new(1));
        let loader = lazy(Arc::clone(&factory), CompatibilityGate::compatible());

        let results = futures::future::join_all((0..8).map(|_| loader.get())).await;

        assert_eq!(factory.builds(), 1);
        for result in &results {
            let err = result.as_ref().err().unwrap();
            assert_eq!(err.kind(), "initialization");
            assert!(err.chain().contains("download failed (attempt 1)"));
        }
        assert!(!loader.is_ready());
    }

    #[tokio::test]
    async fn test_failure_does_not_poison() {
        let factory = Arc::new(CountingFactory::new(1));
        let loader = lazy(Arc::clone(&factory), CompatibilityGate::compatible());

        assert!(loader.get().await.is_err());
        assert!(!loader.is_ready());

        let classifier = loader.get().await.ok().unwrap();
        assert_eq!(classifier.name(), "static");
        assert_eq!(factory.builds(), 2);
        assert!(loader.is_ready());

        // Steady state: no further builds
        loader.get().await.ok().unwrap();
        assert_eq!(factory.builds(), 2);
    }

    #[tokio::test]
    async fn test_repeated_failures_retry_each_call() {
        let factory = Arc::new(CountingFactory::new(usize::MAX));
        let loader = lazy(Arc::clone(&factory), CompatibilityGate::compatible());

        for _ in 0..3 {
            assert!(loader.get().await.is_err());
        }
        assert_eq!(factory.builds(), 3);
    }

    #[tokio::test]
    async fn test_incompatible_gate_skips_construction() {
        let factory = Arc::new(CountingFactory::new(0));
        let gate = CompatibilityGate::evaluate("candle-core", "2.0.0");
        let loader = lazy(Arc::clone(&factory), gate);

        let err = loader.get().await.err().unwrap();
        assert_eq!(err.kind(), "compatibility");
        assert!(err.to_string().contains("2.0.0"));
        assert_eq!(factory.builds(), 0);
        assert_eq!(loader.attempts(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_caller_does_not_restart_construction() {
        let factory = Arc::new(CountingFactory::with_delay(0, Duration::from_millis(300)));
        let loader = lazy(Arc::clone(&factory), CompatibilityGate::compatible());

        let first = tokio::time::timeout(Duration::from_millis(50), loader.get()).await;
        assert!(first.is_err());
        assert!(!loader.is_ready());

        let classifier = loader.get().await.ok().unwrap();
        assert_eq!(classifier.name(), "static");
        assert_eq!(factory.builds(), 1);
        assert_eq!(factory.max_in_flight(), 1);
        assert_eq!(loader.attempts(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_failing_attempt_reaches_next_waiter() {
        let factory = Arc::new(CountingFactory::with_delay(1, Duration::from_millis(300)));
        let loader = lazy(Arc::clone(&factory), CompatibilityGate::compatible());

        let first = tokio::time::timeout(Duration::from_millis(50), loader.get()).await;
        assert!(first.is_err());

        // Queued behind the orphaned attempt, so it observes that failure
        let err = loader.get().await.err().unwrap();
        assert!(err.chain().contains("download failed (attempt 1)"));
        assert_eq!(factory.builds(), 1);

        loader.get().await.ok().unwrap();
        assert_eq!(factory.builds(), 2);
        assert_eq!(factory.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_preload() {
        let factory = Arc::new(CountingFactory::new(1));
        let loader = lazy(Arc::clone(&factory), CompatibilityGate::compatible());

        assert!(!loader.preload().await);
        assert!(loader.preload().await);
        assert!(loader.is_ready());
    }

    #[tokio::test]
    async fn test_classify_runs_single_image_batch() {
        let classifier = StaticClassifier;
        let predictions = classifier
            .classify(RgbImage::new(2, 2), 4)
            .await
            .unwrap();
        assert_eq!(predictions, vec![Prediction::new("notumor", 1.0)]);
    }
}
