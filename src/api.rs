//! LLM API interaction, with optional exponential backoff.
//!
//! The language model is treated as an oracle: given a fixed style guide
//! (the chat template's system prompt) and a brief, it returns text. Nothing
//! here inspects what comes back.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`LlmOracle`]: Owns an `awful_aj` config and template and calls the API
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! Post generation runs without retries; a failed run is re-invoked by the
//! operator. The research job wraps the oracle in [`RetryAsk`].

use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends, decorators (like retry
/// logic) and deterministic stand-ins in tests.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

impl<T: AskAsync> AskAsync for &T {
    type Response = T::Response;

    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        (**self).ask(text).await
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// # Backoff Strategy
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let retry_client = RetryAsk::new(&oracle, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// The hosted model, reached through `awful_aj`.
///
/// The template's system prompt is the house style guide; each call sends
/// one brief as the user message.
#[derive(Debug)]
pub struct LlmOracle {
    config: AwfulJadeConfig,
    template: ChatTemplate,
}

impl LlmOracle {
    /// Load the API config and the named chat template.
    ///
    /// Without `config_path`, the config is read from `awful_aj`'s config
    /// directory (`config.yaml`).
    #[instrument(level = "info", skip(config_path))]
    pub async fn load(config_path: Option<&Path>, template_name: &str) -> Result<Self, Box<dyn Error>> {
        let template = template::load_template(template_name).await?;
        info!(template_name, "Loaded template");

        let conf_file = match config_path {
            Some(p) => p.to_path_buf(),
            None => config_dir()?.join("config.yaml"),
        };
        let conf_str = conf_file
            .to_str()
            .ok_or("LLM config path is not valid UTF-8")?;
        let config = config::load_config(conf_str)?;
        info!(config_path = conf_str, "Loaded LLM configuration");

        Ok(Self { config, template })
    }
}

impl AskAsync for LlmOracle {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None).await;
        let dt = t0.elapsed();

        match &res {
            Ok(body) => info!(elapsed_ms = dt.as_millis(), bytes = body.len(), "API call succeeded"),
            Err(e) => warn!(elapsed_ms = dt.as_millis(), error = %e, "API call failed"),
        }
        res
    }
}

/// Ask through a [`RetryAsk`] with a one second base delay.
#[instrument(level = "info", skip_all, fields(max_retries = max_retries))]
pub async fn ask_with_backoff<T>(
    client: &T,
    text: &str,
    max_retries: usize,
) -> Result<T::Response, Box<dyn Error>>
where
    T: AskAsync,
{
    let t0 = Instant::now();
    let api = RetryAsk::new(client, max_retries, StdDuration::from_secs(1));
    let res = api.ask(text).await;
    let dt = t0.elapsed();

    match &res {
        Ok(_) => info!(elapsed_ms_total = dt.as_millis(), "ask_with_backoff succeeded"),
        Err(e) => {
            error!(elapsed_ms_total = dt.as_millis(), error = %e, "ask_with_backoff failed")
        }
    }
    res
}
