//! Mock model implementation for testing.

use super::{FinishReason, GenerationParams, InlineImage, ProviderError, ProviderResponse, TextModel};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock text model that replays scripted responses and records how many
/// times it was called.
pub struct MockTextModel {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl MockTextModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A model whose next call fails with the given error.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of generate calls made against this mock.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextModel for MockTextModel {
    async fn generate(
        &self,
        prompt: &str,
        _image: Option<&InlineImage>,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let reply = self
            .replies
            .lock()
            .expect("mock replies lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::ApiError(
                    "mock model: no scripted reply left".to_string(),
                ))
            })?;

        Ok(ProviderResponse {
            text: Some(reply),
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: 10,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
