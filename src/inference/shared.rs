//! Lazily initialized backend shared between pipelines.
//!
//! Loading a model is slow and may fail. [`SharedBackend`] runs the loader at
//! most once: callers that arrive while loading is in flight wait on the same
//! attempt, and every caller, early or late, observes the same outcome. A
//! failed load is not retried for the lifetime of the instance.

use super::{InferenceBackend, InferenceError, ModelInput, RawOutput};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Produces the real backend on first use.
#[async_trait]
pub trait BackendLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn InferenceBackend>, InferenceError>;
}

type InitResult = Result<Arc<dyn InferenceBackend>, InferenceError>;

/// Single-flight, lazily initialized backend handle.
pub struct SharedBackend {
    loader: Box<dyn BackendLoader>,
    timeout: Duration,
    cell: OnceCell<InitResult>,
    attempts: AtomicUsize,
}

impl SharedBackend {
    /// Wrap a loader; initialization is bounded by `timeout`.
    pub fn new(loader: impl BackendLoader + 'static, timeout: Duration) -> Self {
        Self {
            loader: Box::new(loader),
            timeout,
            cell: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// The initialized backend, loading it on first call.
    pub async fn get(&self) -> InitResult {
        self.cell
            .get_or_init(|| async {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                info!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Initializing inference backend"
                );

                match tokio::time::timeout(self.timeout, self.loader.load()).await {
                    Ok(Ok(backend)) => {
                        info!(backend = backend.name(), "Inference backend ready");
                        Ok(backend)
                    }
                    Ok(Err(e)) => {
                        warn!("Inference backend failed to initialize: {e}");
                        Err(InferenceError::InitFailed(e.to_string()))
                    }
                    Err(_) => {
                        let ms = self.timeout.as_millis() as u64;
                        warn!(timeout_ms = ms, "Inference backend initialization timed out");
                        Err(InferenceError::InitTimedOut(ms))
                    }
                }
            })
            .await
            .clone()
    }

    /// Whether initialization has completed, successfully or not.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of times the loader has been invoked.
    pub fn init_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for SharedBackend {
    fn name(&self) -> &str {
        "shared"
    }

    async fn infer(&self, input: &ModelInput) -> Result<RawOutput, InferenceError> {
        let backend = self
            .get()
            .await
            .map_err(|e| InferenceError::Unavailable(e.to_string()))?;
        backend.infer(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::FeatureVector;
    use std::sync::atomic::AtomicUsize;

    struct EchoBackend;

    #[async_trait]
    impl InferenceBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn infer(&self, _input: &ModelInput) -> Result<RawOutput, InferenceError> {
            Ok(RawOutput::Label {
                label: "WALK".to_string(),
            })
        }
    }

    struct SlowLoader {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl BackendLoader for SlowLoader {
        async fn load(&self) -> Result<Arc<dyn InferenceBackend>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(InferenceError::Backend("model file missing".to_string()))
            } else {
                Ok(Arc::new(EchoBackend))
            }
        }
    }

    fn input() -> ModelInput {
        ModelInput::Features(FeatureVector::default())
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_init() {
        let calls = Arc::new(AtomicUsize::new(0));
        let shared = Arc::new(SharedBackend::new(
            SlowLoader {
                calls: calls.clone(),
                delay: Duration::from_millis(50),
                fail: false,
            },
            Duration::from_secs(5),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move { shared.infer(&input()).await }));
        }
        for handle in handles {
            let output = handle.await.unwrap().unwrap();
            assert_eq!(
                output,
                RawOutput::Label {
                    label: "WALK".to_string()
                }
            );
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(shared.init_attempts(), 1);
        assert!(shared.is_initialized());
    }

    #[tokio::test]
    async fn test_failure_is_cached_for_every_caller() {
        let calls = Arc::new(AtomicUsize::new(0));
        let shared = Arc::new(SharedBackend::new(
            SlowLoader {
                calls: calls.clone(),
                delay: Duration::from_millis(10),
                fail: true,
            },
            Duration::from_secs(5),
        ));

        let (a, b) = tokio::join!(shared.get(), shared.get());
        let a = a.err().unwrap();
        let b = b.err().unwrap();
        assert_eq!(a, b);
        assert!(matches!(a, InferenceError::InitFailed(_)));

        let later = shared.infer(&input()).await.unwrap_err();
        assert!(matches!(later, InferenceError::Unavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_init_timeout() {
        let shared = SharedBackend::new(
            SlowLoader {
                calls: Arc::new(AtomicUsize::new(0)),
                delay: Duration::from_secs(10),
                fail: false,
            },
            Duration::from_millis(20),
        );

        let err = shared.get().await.err().unwrap();
        assert_eq!(err, InferenceError::InitTimedOut(20));
        assert!(shared.is_initialized());
    }
}
