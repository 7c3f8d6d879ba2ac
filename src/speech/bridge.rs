//! HTTP bridge speech engines
//!
//! Talks to a sidecar service that hosts the actual speech models. The
//! bridge keeps heavyweight model runtimes out of this process: audio goes
//! over as a WAV payload, text comes back as JSON, and synthesis runs the
//! same route in reverse. Compiled only with the `bridge` feature.

use std::io::Cursor;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::audio::{wav, AudioClip};
use crate::error::{LookoutError, Result};
use crate::speech::{Synthesizer, Transcriber, Transcript};

/// Environment variable naming the bridge base URL, e.g. `http://127.0.0.1:5050`
pub const BRIDGE_URL_ENV: &str = "LOOKOUT_BRIDGE_URL";

/// Environment variable overriding the request timeout in milliseconds
pub const BRIDGE_TIMEOUT_ENV: &str = "LOOKOUT_BRIDGE_TIMEOUT_MS";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

const ENGINE_NAME: &str = "bridge";

#[derive(Deserialize)]
struct TranscribeResponse {
    text: String,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
}

fn engine_error(reason: impl Into<String>) -> LookoutError {
    LookoutError::EngineError {
        engine: ENGINE_NAME.to_string(),
        reason: reason.into(),
    }
}

/// Shared HTTP plumbing for both bridge engines
struct BridgeClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl BridgeClient {
    fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookoutError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn from_env() -> Result<Self> {
        let base_url =
            std::env::var(BRIDGE_URL_ENV).map_err(|_| LookoutError::InvalidConfig {
                reason: format!("{BRIDGE_URL_ENV} is not set"),
            })?;

        let timeout_ms = match std::env::var(BRIDGE_TIMEOUT_ENV) {
            Ok(raw) => raw.parse::<u64>().map_err(|_| LookoutError::InvalidConfig {
                reason: format!("{BRIDGE_TIMEOUT_ENV} must be an integer, got {raw:?}"),
            })?,
            Err(_) => DEFAULT_TIMEOUT_MS,
        };

        Self::new(&base_url, Duration::from_millis(timeout_ms))
    }

    fn ping(&self) -> bool {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// Speech-to-text over the bridge service
pub struct BridgeTranscriber {
    inner: BridgeClient,
}

impl BridgeTranscriber {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            inner: BridgeClient::new(base_url, Duration::from_millis(timeout_ms))?,
        })
    }

    /// Configure from `LOOKOUT_BRIDGE_URL` and `LOOKOUT_BRIDGE_TIMEOUT_MS`
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            inner: BridgeClient::from_env()?,
        })
    }
}

impl Transcriber for BridgeTranscriber {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn transcribe(&self, clip: &AudioClip) -> Result<Transcript> {
        let start = Instant::now();
        let payload = wav::wav_bytes(clip)?;
        log::debug!("posting {} WAV bytes to bridge transcriber", payload.len());

        let response = self
            .inner
            .client
            .post(format!("{}/v1/transcribe", self.inner.base_url))
            .header("Content-Type", "audio/wav")
            .body(payload)
            .send()
            .map_err(|e| engine_error(format!("transcribe request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(engine_error(format!("bridge returned {status}: {body}")));
        }

        let parsed: TranscribeResponse = response
            .json()
            .map_err(|e| engine_error(format!("invalid transcribe response: {e}")))?;

        log::info!("bridge transcription complete: {:?}", parsed.text);

        Ok(Transcript {
            text: parsed.text,
            engine: ENGINE_NAME.to_string(),
            audio_seconds: clip.duration_seconds(),
            processing_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn is_available(&self) -> bool {
        self.inner.ping()
    }
}

/// Text-to-speech over the bridge service
pub struct BridgeSynthesizer {
    inner: BridgeClient,
}

impl BridgeSynthesizer {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            inner: BridgeClient::new(base_url, Duration::from_millis(timeout_ms))?,
        })
    }

    /// Configure from `LOOKOUT_BRIDGE_URL` and `LOOKOUT_BRIDGE_TIMEOUT_MS`
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            inner: BridgeClient::from_env()?,
        })
    }
}

impl Synthesizer for BridgeSynthesizer {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn synthesize(&self, text: &str) -> Result<AudioClip> {
        if text.trim().is_empty() {
            return Err(LookoutError::InvalidConfig {
                reason: "cannot synthesize empty text".to_string(),
            });
        }

        let response = self
            .inner
            .client
            .post(format!("{}/v1/synthesize", self.inner.base_url))
            .json(&SynthesizeRequest { text })
            .send()
            .map_err(|e| engine_error(format!("synthesize request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(engine_error(format!("bridge returned {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .map_err(|e| engine_error(format!("failed to read synthesize response: {e}")))?;

        log::debug!("bridge synthesizer returned {} WAV bytes", bytes.len());
        wav::read_wav(Cursor::new(bytes))
    }

    fn is_available(&self) -> bool {
        self.inner.ping()
    }
}
