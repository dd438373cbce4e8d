//! Scripted provider for tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{GenerationParams, LlmProvider, LlmResponse};
use crate::types::Result;

type Responder = Box<dyn Fn(usize, &str) -> Result<String> + Send + Sync>;

/// Provider whose replies come from a closure of `(call_index, prompt)`
pub(crate) struct MockProvider {
    responder: Responder,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    params: Mutex<Vec<GenerationParams>>,
}

impl MockProvider {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(usize, &str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            params: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with the same text
    pub(crate) fn fixed(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_, _| Ok(reply.clone()))
    }

    /// Reply with `words` generated words per call
    pub(crate) fn words(words: usize) -> Self {
        Self::new(move |_, _| Ok(lorem(words)))
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn params(&self) -> Vec<GenerationParams> {
        self.params.lock().unwrap().clone()
    }
}

/// `n` words of filler text split into sentences of ten words
pub(crate) fn lorem(n: usize) -> String {
    (0..n)
        .map(|i| if i % 10 == 9 { "word." } else { "word" })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<LlmResponse> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.params.lock().unwrap().push(*params);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        (self.responder)(index, prompt).map(LlmResponse::content_only)
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
