// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! Three providers are available: the OpenAI embeddings API (default), a
//! local fastembed model, and an external command speaking JSON over stdio.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::env;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::config::{EmbeddingConfig, EmbeddingProviderType};
use crate::errors::EmbedError;

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
const DEFAULT_FASTEMBED_MAX_CHARS: usize = 2000;

/// Output dimension of all-MiniLM-L6-v2.
pub const FASTEMBED_DIM: usize = 384;

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Fails when no request can succeed, e.g. a credential is missing.
    fn check_ready(&self) -> Result<(), EmbedError> {
        Ok(())
    }

    /// Generates an embedding for a single text.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Build the provider selected by configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    let provider: Box<dyn EmbeddingProvider> = match config.provider() {
        EmbeddingProviderType::Openai => Box::new(OpenAiProvider::from_env(
            config.model(),
            config.base_url(),
            config.dimension(),
            Duration::from_secs(config.timeout_secs()),
        )?),
        EmbeddingProviderType::Builtin => builtin_provider()?,
        EmbeddingProviderType::Command => Box::new(CommandProvider::new(
            config.command().to_string(),
            config.model().to_string(),
            config.dimension(),
        )),
    };
    Ok(provider)
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn builtin_provider() -> Result<Box<dyn EmbeddingProvider>> {
    Ok(Box::new(FastEmbedder::from_env()?))
}

#[cfg(all(target_os = "macos", target_arch = "x86_64"))]
fn builtin_provider() -> Result<Box<dyn EmbeddingProvider>> {
    bail!("The builtin embedding provider is not available on this platform")
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiProvider {
    client: reqwest::blocking::Client,
    model: String,
    api_key: Option<String>,
    base_url: String,
    dimension: usize,
}

impl OpenAiProvider {
    pub fn new(
        model: &str,
        api_key: Option<String>,
        base_url: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            model: model.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
            dimension,
        })
    }

    /// Reads the API key from `OPENAI_API_KEY`; a missing key is reported on
    /// first use rather than here.
    pub fn from_env(model: &str, base_url: &str, dimension: usize, timeout: Duration) -> Result<Self> {
        Self::new(
            model,
            env::var(OPENAI_API_KEY_VAR).ok(),
            base_url,
            dimension,
            timeout,
        )
    }
}

impl EmbeddingProvider for OpenAiProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_ready(&self) -> Result<(), EmbedError> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(EmbedError::MissingCredential {
                var: OPENAI_API_KEY_VAR.to_string(),
            }),
        }
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EmbedError> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            input: &'a str,
        }

        self.check_ready()?;
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&Request {
                model: &self.model,
                input: text,
            })
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(EmbedError::Api {
                status: status.as_u16(),
                message: parse_error_message(&body),
            });
        }

        parse_embedding_response(&body)
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn parse_embedding_response(body: &str) -> Result<Vec<f32>, EmbedError> {
    let parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;
    parsed
        .data
        .into_iter()
        .next()
        .map(|item| item.embedding.into_iter().map(|v| v as f32).collect())
        .ok_or_else(|| EmbedError::InvalidResponse("response contained no embeddings".into()))
}

fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| "unknown error".to_string())
}

/// FastEmbed provider using sentence-transformers/all-MiniLM-L6-v2.
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub struct FastEmbedder {
    embedder: fastembed::TextEmbedding,
    model_id: String,
    max_chars: usize,
    normalize: bool,
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl FastEmbedder {
    pub fn new(max_chars: usize, normalize: bool) -> Result<Self> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model = EmbeddingModel::AllMiniLML6V2;
        let model_id = model.to_string();
        let embedder = TextEmbedding::try_new(InitOptions::new(model))
            .context("Failed to initialize fastembed model")?;

        Ok(Self {
            embedder,
            model_id,
            max_chars,
            normalize,
        })
    }

    /// Honors `FASTEMBED_MAX_CHARS` and `FASTEMBED_NORMALIZE`.
    pub fn from_env() -> Result<Self> {
        let mut max_chars = parse_usize_env("FASTEMBED_MAX_CHARS", DEFAULT_FASTEMBED_MAX_CHARS)?;
        if max_chars == 0 {
            max_chars = DEFAULT_FASTEMBED_MAX_CHARS;
        }
        let normalize = parse_bool_env("FASTEMBED_NORMALIZE", true)?;
        Self::new(max_chars, normalize)
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        FASTEMBED_DIM
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let prepared = vec![truncate_to_chars(text, self.max_chars)];
        let mut embedding = self
            .embedder
            .embed(&prepared, None)
            .map_err(|e| EmbedError::Backend(format!("{:#}", e)))?
            .pop()
            .ok_or_else(|| EmbedError::Backend("No embedding returned".into()))?;

        if self.normalize {
            l2_normalize(&mut embedding);
        }
        Ok(embedding)
    }
}

/// Command provider that shells out to an external process.
///
/// Each call runs the command once. It receives `{"model": ..., "texts":
/// [text]}` on stdin and must print either a JSON array of vectors or an
/// object holding one under `embeddings`, `vectors` or `data`; the first
/// vector is used.
pub struct CommandProvider {
    command: String,
    model: String,
    dimension: usize,
}

impl CommandProvider {
    pub fn new(command: String, model: String, dimension: usize) -> Self {
        Self {
            command,
            model,
            dimension,
        }
    }

    fn run_command(&self, text: &str) -> Result<Vec<Vec<f32>>> {
        let payload = serde_json::json!({
            "model": self.model,
            "texts": [text],
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn embedding command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload_str = payload.to_string();
            // The command may exit without reading its input.
            if let Err(err) = stdin.write_all(payload_str.as_bytes()) {
                if err.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(err).context("Failed to write embeddings payload to stdin");
                }
            }
        }

        let output = child
            .wait_with_output()
            .context("Failed to read embeddings command output")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Embedding command failed (status {}): {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_command_output(stdout.trim())
    }
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.run_command(text)
            .map_err(|e| EmbedError::Command(format!("{:#}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::InvalidResponse("No embedding returned".into()))
    }
}

fn parse_command_output(stdout: &str) -> Result<Vec<Vec<f32>>> {
    let parsed: Value = serde_json::from_str(stdout)
        .with_context(|| "Failed to parse embeddings command output as JSON")?;

    let embeddings_value = match parsed {
        Value::Array(arr) => Value::Array(arr),
        Value::Object(ref obj) => {
            if let Some(value) = obj.get("embeddings") {
                value.clone()
            } else if let Some(value) = obj.get("vectors") {
                value.clone()
            } else if let Some(value) = obj.get("data") {
                value.clone()
            } else {
                bail!("Embeddings command output missing 'embeddings' field");
            }
        }
        _ => bail!("Embeddings command output must be JSON array or object"),
    };

    embeddings_value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Embeddings output must be a JSON array"))?
        .iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| anyhow::anyhow!("Embedding row must be an array"))?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .ok_or_else(|| anyhow::anyhow!("Embedding value must be a number"))
                        .map(|v| v as f32)
                })
                .collect::<Result<Vec<f32>>>()
        })
        .collect::<Result<Vec<Vec<f32>>>>()
}

fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(input[..idx].to_string()),
        None => Cow::Borrowed(input),
    }
}

/// Scales a vector to unit length; zero vectors are left alone.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

fn parse_usize_env(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                Ok(default)
            } else {
                value
                    .parse::<usize>()
                    .with_context(|| format!("Invalid {} value: {}", name, value))
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", name)),
    }
}

fn parse_bool_env(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim().to_lowercase();
            if value.is_empty() {
                return Ok(default);
            }
            match value.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => bail!("Invalid {} value: {}", name, other),
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", name)),
    }
}
