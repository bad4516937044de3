//! Engine adapter contract and lazily initialized engine handles

use std::sync::OnceLock;

use parking_lot::Mutex;

use super::types::{EngineError, EngineResult};
use crate::preprocess::PreprocessedImage;

/// Uniform extraction contract over one recognition engine
///
/// `extract` never fails: engine problems are reported through
/// `EngineResult::error` with zero confidence.
pub trait EngineAdapter: Send + Sync {
    /// Stable engine identifier (used as the arbitration key)
    fn id(&self) -> &str;

    /// Whether the engine handle initialized successfully
    ///
    /// Triggers initialization on first use.
    fn is_available(&self) -> bool;

    /// Recognize text in a preprocessed image
    fn extract(&self, image: &PreprocessedImage) -> EngineResult;
}

type Factory<T> = Box<dyn Fn() -> Result<T, EngineError> + Send + Sync>;

/// Process-wide engine handle
///
/// The engine is created on first use, at most once. A failed creation is
/// remembered and the engine stays unavailable for the life of the handle.
/// Calls into the engine are serialized with a mutex, so backends do not
/// have to be reentrant.
pub struct EngineHandle<T> {
    name: String,
    factory: Option<Factory<T>>,
    engine: OnceLock<Result<Mutex<T>, EngineError>>,
}

impl<T: Send> EngineHandle<T> {
    /// Create a handle that builds its engine lazily
    pub fn lazy<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<T, EngineError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Some(Box::new(factory)),
            engine: OnceLock::new(),
        }
    }

    /// Create a handle around an already constructed engine
    pub fn ready(name: impl Into<String>, engine: T) -> Self {
        Self {
            name: name.into(),
            factory: None,
            engine: OnceLock::from(Ok(Mutex::new(engine))),
        }
    }

    fn engine(&self) -> Result<&Mutex<T>, &EngineError> {
        self.engine
            .get_or_init(|| {
                let created = match &self.factory {
                    Some(factory) => factory(),
                    None => Err(EngineError::NotAvailable(format!(
                        "{} has no engine factory",
                        self.name
                    ))),
                };
                match &created {
                    Ok(_) => tracing::info!("OCR engine {} initialized", self.name),
                    Err(e) => tracing::error!(
                        "OCR engine {} failed to initialize: {}; disabled for this process",
                        self.name,
                        e
                    ),
                }
                created.map(Mutex::new)
            })
            .as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.engine().is_ok()
    }

    /// Run an operation with exclusive access to the engine
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> Result<R, EngineError>) -> Result<R, EngineError> {
        let engine = self.engine().map_err(|e| e.clone())?;
        let mut guard = engine.lock();
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_lazy_handle_initializes_once() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let handle = EngineHandle::lazy("counting", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(41u32)
        });

        assert_eq!(created.load(Ordering::SeqCst), 0);
        for _ in 0..3 {
            let value = handle.with(|n| {
                *n += 1;
                Ok(*n)
            });
            assert!(value.is_ok());
        }
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(handle.with(|n| Ok(*n)).unwrap(), 44);
    }

    #[test]
    fn test_failed_initialization_is_permanent() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let handle: EngineHandle<u32> = EngineHandle::lazy("broken", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::NotAvailable("model failed to load".into()))
        });

        assert!(!handle.is_available());
        assert!(!handle.is_available());
        let err = handle.with(|n| Ok(*n)).unwrap_err();
        assert!(matches!(err, EngineError::NotAvailable(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ready_handle_is_available() {
        let handle = EngineHandle::ready("fixed", String::from("engine"));
        assert!(handle.is_available());
        assert_eq!(handle.with(|s| Ok(s.len())).unwrap(), 6);
    }

    #[test]
    fn test_handle_serializes_concurrent_calls() {
        let handle = Arc::new(EngineHandle::ready("shared", 0usize));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let handle = handle.clone();
                let in_flight = in_flight.clone();
                let overlaps = overlaps.clone();
                scope.spawn(move || {
                    for _ in 0..25 {
                        handle
                            .with(|count| {
                                if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                                    overlaps.fetch_add(1, Ordering::SeqCst);
                                }
                                *count += 1;
                                std::thread::yield_now();
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                Ok(())
                            })
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(handle.with(|count| Ok(*count)).unwrap(), 200);
    }
}
