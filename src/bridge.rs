//! Predictor lifecycle: register → forward → release
//!
//! The registry lock is held only to resolve a handle. Each predictor sits
//! behind its own mutex, so different handles run in parallel while calls on
//! the same handle are serialized.

use crate::engine::Predictor;
use crate::error::OcrError;
use crate::registry::{Handle, HandleRegistry};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Bridge<P: Predictor> {
    registry: Mutex<HandleRegistry<Arc<Mutex<P>>>>,
}

impl<P: Predictor> Default for Bridge<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Predictor> Bridge<P> {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HandleRegistry::new()),
        }
    }

    /// Take ownership of a ready predictor and hand out its handle
    pub fn register(&self, predictor: P) -> Result<Handle, OcrError> {
        let handle = self
            .registry
            .lock()
            .insert(Arc::new(Mutex::new(predictor)))?;
        tracing::info!("Created {} predictor {:#x}", P::kind(), handle.into_raw());
        Ok(handle)
    }

    /// Run one request; blocks until the predictor is free and the call completes
    pub fn forward(&self, handle: Handle, request: P::Request) -> Result<P::Response, OcrError> {
        self.forward_with(handle, || Ok(request))
    }

    /// Like [`Bridge::forward`], but the request is built only once `handle` resolves
    pub fn forward_with<F>(&self, handle: Handle, build: F) -> Result<P::Response, OcrError>
    where
        F: FnOnce() -> Result<P::Request, OcrError>,
    {
        let predictor = Arc::clone(self.registry.lock().get(handle)?);
        let request = build()?;
        let mut predictor = predictor.lock();
        predictor.forward(request)
    }

    /// Drop the predictor. Later use of `handle` fails with a stale-handle error.
    ///
    /// A call still running on the same handle finishes first; the predictor
    /// is freed when it returns.
    pub fn release(&self, handle: Handle) -> Result<(), OcrError> {
        let predictor = self.registry.lock().remove(handle)?;
        drop(predictor);
        tracing::info!("Released {} predictor {:#x}", P::kind(), handle.into_raw());
        Ok(())
    }

    /// Number of live predictors
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }
}
