//! Scripted provider client used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{BackendAdapter, ModelProviderClient};
use crate::error::CallError;
use crate::request::GenerateRequest;

/// What the mock does on one `chat_completion` call.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(String),
    Hang,
    Panic,
}

/// What the mock does on `health_check`.
#[derive(Debug, Clone, Copy)]
pub enum Probe {
    Healthy,
    Unhealthy,
    Error,
    Hang,
    Panic,
}

#[derive(Debug)]
struct Inner {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    probe: Mutex<Probe>,
    calls: AtomicUsize,
    probes: AtomicUsize,
    models: Mutex<Vec<String>>,
}

/// Cloneable handle; clones share call counters and script.
#[derive(Debug, Clone)]
pub struct MockProvider {
    inner: Arc<Inner>,
}

impl MockProvider {
    fn new(steps: Vec<Step>, fallback: Step, probe: Probe) -> Self {
        Self {
            inner: Arc::new(Inner {
                script: Mutex::new(steps.into()),
                fallback,
                probe: Mutex::new(probe),
                calls: AtomicUsize::new(0),
                probes: AtomicUsize::new(0),
                models: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn ok(text: &str) -> Self {
        Self::new(vec![], Step::Reply(text.into()), Probe::Healthy)
    }

    pub fn failing(message: &str) -> Self {
        Self::new(vec![], Step::Fail(message.into()), Probe::Error)
    }

    pub fn hanging() -> Self {
        Self::new(vec![], Step::Hang, Probe::Hang)
    }

    pub fn panicking() -> Self {
        Self::new(vec![], Step::Panic, Probe::Panic)
    }

    /// Play `steps` in order, then keep repeating the last one.
    pub fn scripted(steps: Vec<Step>) -> Self {
        let fallback = steps.last().cloned().unwrap_or(Step::Hang);
        Self::new(steps, fallback, Probe::Healthy)
    }

    pub fn with_probe(self, probe: Probe) -> Self {
        *self.inner.probe.lock() = probe;
        self
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.inner.probes.load(Ordering::SeqCst)
    }

    pub fn models_seen(&self) -> Vec<String> {
        self.inner.models.lock().clone()
    }

    /// Adapter named `name`, no retries, default model `mock-model`.
    pub fn adapter(&self, name: &str) -> BackendAdapter {
        BackendAdapter::builder(name, self.clone())
            .default_model("mock-model")
            .max_retries(0)
            .build()
    }
}

#[async_trait]
impl ModelProviderClient for MockProvider {
    async fn chat_completion(
        &self,
        _request: &GenerateRequest,
        model: &str,
    ) -> Result<String, CallError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.models.lock().push(model.to_string());

        let step = {
            let next = self.inner.script.lock().pop_front();
            next.unwrap_or_else(|| self.inner.fallback.clone())
        };
        match step {
            Step::Reply(text) => Ok(text),
            Step::Fail(message) => Err(CallError::new(message)),
            Step::Hang => std::future::pending().await,
            Step::Panic => panic!("mock provider exploded"),
        }
    }

    async fn health_check(&self) -> Result<bool, CallError> {
        self.inner.probes.fetch_add(1, Ordering::SeqCst);
        let probe = *self.inner.probe.lock();
        match probe {
            Probe::Healthy => Ok(true),
            Probe::Unhealthy => Ok(false),
            Probe::Error => Err(CallError::new("connection refused")),
            Probe::Hang => std::future::pending().await,
            Probe::Panic => panic!("mock probe exploded"),
        }
    }
}
