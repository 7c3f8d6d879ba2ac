//! Speech engine registry
//!
//! Maps engine names to transcriber and synthesizer implementations so the
//! CLI and voice loop can select engines at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{LookoutError, Result};
use crate::speech::mock::{MockSynthesizer, MockTranscriber};
use crate::speech::{Synthesizer, Transcriber};

/// Registry of available speech engines
pub struct EngineRegistry {
    transcribers: HashMap<String, Arc<dyn Transcriber>>,
    synthesizers: HashMap<String, Arc<dyn Synthesizer>>,
}

impl EngineRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            transcribers: HashMap::new(),
            synthesizers: HashMap::new(),
        }
    }

    /// Registry with the built-in engines
    ///
    /// The mock engines are always present. Bridge engines are added when
    /// the `bridge` feature is compiled in and `LOOKOUT_BRIDGE_URL` is set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_transcriber(Arc::new(MockTranscriber::new()));
        registry.register_synthesizer(Arc::new(MockSynthesizer::new()));

        #[cfg(feature = "bridge")]
        {
            use crate::speech::bridge::{BridgeSynthesizer, BridgeTranscriber};

            if let Ok(engine) = BridgeTranscriber::from_env() {
                registry.register_transcriber(Arc::new(engine));
            }
            if let Ok(engine) = BridgeSynthesizer::from_env() {
                registry.register_synthesizer(Arc::new(engine));
            }
        }

        registry
    }

    /// Register a transcriber under its own name
    pub fn register_transcriber(&mut self, engine: Arc<dyn Transcriber>) {
        self.transcribers.insert(engine.name().to_string(), engine);
    }

    /// Register a synthesizer under its own name
    pub fn register_synthesizer(&mut self, engine: Arc<dyn Synthesizer>) {
        self.synthesizers.insert(engine.name().to_string(), engine);
    }

    /// Get a transcriber by name
    pub fn transcriber(&self, name: &str) -> Result<Arc<dyn Transcriber>> {
        self.transcribers
            .get(name)
            .cloned()
            .ok_or_else(|| LookoutError::UnknownEngine {
                name: name.to_string(),
            })
    }

    /// Get a synthesizer by name
    pub fn synthesizer(&self, name: &str) -> Result<Arc<dyn Synthesizer>> {
        self.synthesizers
            .get(name)
            .cloned()
            .ok_or_else(|| LookoutError::UnknownEngine {
                name: name.to_string(),
            })
    }

    pub fn has_transcriber(&self, name: &str) -> bool {
        self.transcribers.contains_key(name)
    }

    pub fn has_synthesizer(&self, name: &str) -> bool {
        self.synthesizers.contains_key(name)
    }

    /// Registered transcriber names, sorted
    pub fn transcriber_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transcribers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered synthesizer names, sorted
    pub fn synthesizer_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.synthesizers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
