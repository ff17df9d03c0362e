use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Configuration {
    pub authentication: Authentication,
    pub model: Model,
    pub inference: Inference,
    pub commands: Commands,
}
impl Configuration {
    const FILENAME: &str = "config.toml";

    /// Reads the configuration from disk; writes out a default config for
    /// the user to fill in if none exists.
    pub fn load() -> anyhow::Result<Self> {
        let config = if let Ok(file) = std::fs::read_to_string(Self::FILENAME) {
            toml::from_str(&file).context("failed to load config")?
        } else {
            let config = Self::default();
            config.save()?;
            config
        };

        Ok(config)
    }

    fn save(&self) -> anyhow::Result<()> {
        Ok(std::fs::write(
            Self::FILENAME,
            toml::to_string_pretty(self)?,
        )?)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Authentication {
    pub discord_token: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Model {
    /// Architecture of the model at `path`, e.g. "llama" or "gptneox".
    pub architecture: String,
    pub path: String,
    /// Hugging Face repository to fetch the tokenizer from. The model's
    /// embedded vocabulary is used when unset.
    pub tokenizer_repository: Option<String>,
    pub context_token_length: usize,
    /// Offloads generation to the GPU when the binary was built with an
    /// accelerator feature; ignored otherwise.
    pub use_gpu: bool,
}
impl Default for Model {
    fn default() -> Self {
        Self {
            architecture: "llama".to_string(),
            path: "models/7B/ggml-model-q4_0.bin".to_string(),
            tokenizer_repository: None,
            context_token_length: 2048,
            use_gpu: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Inference {
    /// Number of worker threads answering questions; at most this many
    /// generations run at once.
    pub worker_count: usize,
    /// Threads used by the backend within a single generation pass.
    pub thread_count: usize,
    pub batch_size: usize,
    /// Cap on tokens generated past the prompt.
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub repeat_penalty_last_n_token_count: usize,
    /// Template the question is substituted into before tokenization.
    pub prompt_template: String,
}
impl Default for Inference {
    fn default() -> Self {
        Self {
            worker_count: 4,
            thread_count: 8,
            batch_size: 8,
            max_new_tokens: 100,
            temperature: 0.7,
            top_k: 50,
            top_p: 0.95,
            repeat_penalty: 1.3,
            repeat_penalty_last_n_token_count: 64,
            prompt_template: "Q: {{PROMPT}}\nA:".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Commands {
    pub prefix: String,
    pub ask: String,
}
impl Default for Commands {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            ask: "ask".to_string(),
        }
    }
}
