//! Ordered provider failover.

use crate::retry::RetryPolicy;
use async_trait::async_trait;
use review_core::llm::{ChatModel, ChatRequest, ChatResponse, ChatStream, ToolDefinition};
use review_core::{ReviewError, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Chat model that walks an ordered list of providers.
///
/// Each provider gets one retry with a jittered delay; if it still fails
/// the next provider is tried. When every provider is exhausted the call
/// fails with [`ReviewError::ProviderUnavailable`]. Streaming calls only
/// fail over while no bytes have been delivered; once a stream is handed
/// to the consumer, a failure surfaces as `StreamInterrupted`.
pub struct FailoverClient {
    providers: Vec<Arc<dyn ChatModel>>,
    retry: RetryPolicy,
}

impl FailoverClient {
    pub fn new(providers: Vec<Arc<dyn ChatModel>>) -> Self {
        Self {
            providers,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn try_each<'a, T, F, Fut>(&'a self, mut call: F) -> Result<T>
    where
        F: FnMut(&'a dyn ChatModel) -> Fut,
        Fut: std::future::Future<Output = Result<T>> + 'a,
    {
        let mut last_error: Option<ReviewError> = None;
        for provider in &self.providers {
            for attempt in 1..=self.retry.attempts_per_provider {
                match call(provider.as_ref()).await {
                    Ok(result) => {
                        if last_error.is_some() || attempt > 1 {
                            info!(
                                provider = provider.provider_name(),
                                attempt, "provider call succeeded after earlier failures"
                            );
                        }
                        return Ok(result);
                    }
                    Err(err) => {
                        warn!(
                            provider = provider.provider_name(),
                            attempt,
                            %err,
                            "provider call failed"
                        );
                        last_error = Some(err);
                        if attempt < self.retry.attempts_per_provider {
                            tokio::time::sleep(self.retry.delay(attempt)).await;
                        }
                    }
                }
            }
        }
        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no providers configured".to_string());
        Err(ReviewError::ProviderUnavailable(detail))
    }
}

#[async_trait]
impl ChatModel for FailoverClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let request = &request;
        self.try_each(move |provider| {
            let request = request.clone();
            async move { provider.chat(request).await }
        })
        .await
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream> {
        // Obtaining the stream is the pre-first-byte phase; from then on
        // the providers themselves report StreamInterrupted.
        let request = &request;
        self.try_each(move |provider| {
            let request = request.clone();
            async move { provider.chat_stream(request).await }
        })
        .await
    }

    async fn chat_with_tools(
        &self,
        request: ChatRequest,
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse> {
        let request = &request;
        self.try_each(move |provider| {
            let request = request.clone();
            let tools = tools.to_vec();
            async move { provider.chat_with_tools(request, &tools).await }
        })
        .await
    }

    fn provider_name(&self) -> &str {
        "failover"
    }
}
