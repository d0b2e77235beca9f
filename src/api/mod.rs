//! LLM API interaction with ordered provider failover.
//!
//! This module presents every configured LLM backend behind one
//! [`AiClient::call`] entry point.
//!
//! # Architecture
//!
//! - [`Provider`]: core trait; one implementation per backend in [`providers`]
//! - [`AiClient`]: owns an ordered list of providers plus their enabled flags
//! - [`decode`]: fence-tolerant JSON decoding of model responses
//!
//! # Failover Strategy
//!
//! - Providers are tried in priority order: Bailian, Gemini, OpenAI-compatible
//! - A provider that fails while a lower-priority one is still enabled is
//!   disabled for the rest of the client's lifetime and the call moves on
//! - The lowest-priority enabled provider is never disabled; its errors
//!   propagate to the caller
//! - The switch is logged once per client, however many calls fail

pub mod decode;
pub mod providers;

use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::error::{AiError, ProviderError};
use providers::{ChatCompletions, Gemini};

/// Trait for one concrete LLM backend.
///
/// Implementors send a single-turn user prompt and return the generated text.
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    /// Short display name, e.g. `"Gemini"`.
    fn name(&self) -> &str;

    /// Longer description for startup logs.
    fn describe(&self) -> String {
        self.name().to_string()
    }

    /// Send `prompt` and return the generated text.
    async fn ask(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Credentials and endpoints for the LLM backends.
///
/// Blank values count as absent.
#[derive(Debug, Clone, Default)]
pub struct AiConfig {
    pub bailian_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub openai_model: Option<String>,
    /// Upper bound on a single provider request.
    pub request_timeout: Duration,
}

impl AiConfig {
    /// Whether at least one provider credential is present.
    pub fn has_any_key(&self) -> bool {
        [&self.bailian_api_key, &self.gemini_api_key, &self.openai_api_key]
            .into_iter()
            .any(|k| non_blank(k).is_some())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug)]
struct ProviderSlot {
    provider: Box<dyn Provider>,
    enabled: AtomicBool,
}

impl ProviderSlot {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

/// A prioritized set of LLM providers with sticky failover.
///
/// All failover state lives in the client, so independent clients never
/// affect one another.
#[derive(Debug)]
pub struct AiClient {
    providers: Vec<ProviderSlot>,
    fallback_logged: AtomicBool,
}

impl AiClient {
    /// Build a client from already-constructed providers, highest priority first.
    pub fn with_providers(providers: Vec<Box<dyn Provider>>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|provider| ProviderSlot {
                    provider,
                    enabled: AtomicBool::new(true),
                })
                .collect(),
            fallback_logged: AtomicBool::new(false),
        }
    }

    /// Build the HTTP providers named by `config`.
    ///
    /// Having no credentials at all is not an error here; it surfaces as
    /// [`AiError::NotConfigured`] on the first [`AiClient::call`].
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(AiError::Client)?;

        let mut providers: Vec<Box<dyn Provider>> = Vec::new();
        if let Some(key) = non_blank(&config.bailian_api_key) {
            providers.push(Box::new(ChatCompletions::bailian(http.clone(), key)));
        }
        if let Some(key) = non_blank(&config.gemini_api_key) {
            providers.push(Box::new(Gemini::new(http.clone(), key)));
        }
        if let Some(key) = non_blank(&config.openai_api_key) {
            providers.push(Box::new(ChatCompletions::openai_compatible(
                http,
                key,
                config.openai_api_base.as_deref(),
                config.openai_model.as_deref(),
            )));
        }
        Ok(Self::with_providers(providers))
    }

    /// The primary provider and the fallback chain, for startup logs.
    pub fn describe(&self) -> String {
        let mut names = self.providers.iter().map(|s| s.provider.describe());
        match names.next() {
            None => "none".to_string(),
            Some(primary) => {
                let rest = names.collect::<Vec<_>>();
                if rest.is_empty() {
                    format!("{primary} (primary)")
                } else {
                    format!("{primary} (primary), fallback: {}", rest.join(" -> "))
                }
            }
        }
    }

    /// Whether a provider has been switched away from.
    pub fn fell_back(&self) -> bool {
        self.fallback_logged.load(Ordering::Acquire)
    }

    /// Send `prompt` to the highest-priority enabled provider, failing over
    /// down the list as needed.
    ///
    /// # Errors
    ///
    /// - [`AiError::NotConfigured`] immediately if no provider exists
    /// - [`AiError::Provider`] with the last-attempted provider's failure when
    ///   every enabled provider failed
    #[instrument(level = "debug", skip_all, fields(prompt_chars = prompt.len()))]
    pub async fn call(&self, prompt: &str) -> Result<String, AiError> {
        if self.providers.is_empty() {
            return Err(AiError::NotConfigured);
        }

        let t0 = Instant::now();
        let mut last_error = None;
        for (position, slot) in self.providers.iter().enumerate() {
            if !slot.is_enabled() {
                continue;
            }

            let err = match slot.provider.ask(prompt).await {
                Ok(text) => {
                    debug!(
                        provider = slot.provider.name(),
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        "call succeeded"
                    );
                    return Ok(text);
                }
                Err(err) => err,
            };

            let Some(next) = self.providers[position + 1..].iter().find(|s| s.is_enabled()) else {
                return Err(err.into());
            };

            slot.enabled.store(false, Ordering::Release);
            if self
                .fallback_logged
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                warn!(
                    failed = slot.provider.name(),
                    fallback = %next.provider.describe(),
                    reason = %err,
                    "Provider failed, switching to fallback"
                );
            } else {
                debug!(failed = slot.provider.name(), reason = %err, "Provider disabled");
            }
            last_error = Some(err);
        }

        Err(last_error.map(AiError::from).unwrap_or(AiError::NotConfigured))
    }
}
