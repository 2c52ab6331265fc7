//! Configuration-driven provider selection

use async_trait::async_trait;
use tracing::debug;

use ee_core::{AppConfig, ChatProvider, Error, ProviderKind, Result};

use crate::{LocalSmallProvider, OllamaProvider, OpenAiProvider};

/// How to obtain the missing local model file
pub const MODEL_SYNC_REMEDIATION: &str =
    "Run the model sync tool (`python3 sync_models.py`) to download it first.";

/// The closed set of chat backends
pub enum Provider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    LocalSmall(LocalSmallProvider),
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Ollama(_) => ProviderKind::Ollama,
            Provider::OpenAi(_) => ProviderKind::OpenAi,
            Provider::LocalSmall(_) => ProviderKind::LocalSmall,
        }
    }

    fn inner(&self) -> &dyn ChatProvider {
        match self {
            Provider::Ollama(p) => p,
            Provider::OpenAi(p) => p,
            Provider::LocalSmall(p) => p,
        }
    }
}

#[async_trait]
impl ChatProvider for Provider {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn model(&self) -> &str {
        self.inner().model()
    }

    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        self.inner().generate(prompt, system).await
    }
}

/// Build the provider named by `config.model_provider`.
///
/// Performs no network I/O; the only failures are an unknown identifier, a
/// missing credential, or an unparsable endpoint URL.
pub fn select_provider(config: &AppConfig) -> Result<Provider> {
    let kind: ProviderKind = config.model_provider.parse()?;
    debug!(provider = %kind, model = %config.chat_model, "selecting chat provider");

    let provider = match kind {
        ProviderKind::Ollama => Provider::Ollama(OllamaProvider::from_config(config)?),
        ProviderKind::OpenAi => Provider::OpenAi(OpenAiProvider::from_config(config)?),
        ProviderKind::LocalSmall => {
            Provider::LocalSmall(LocalSmallProvider::from_config(config)?)
        }
    };
    Ok(provider)
}

/// Verify the local model file exists before the local server backend is used.
pub fn check_local_small_prereqs(config: &AppConfig) -> Result<()> {
    if config.local_model_file.exists() {
        return Ok(());
    }
    Err(Error::MissingAsset {
        path: config.local_model_file.display().to_string(),
        remediation: MODEL_SYNC_REMEDIATION.to_string(),
    })
}

/// Constructs the chat provider for one request
pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &AppConfig) -> Result<Box<dyn ChatProvider>>;
}

/// Default factory backed by [`select_provider`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendFactory;

impl ProviderFactory for BackendFactory {
    fn create(&self, config: &AppConfig) -> Result<Box<dyn ChatProvider>> {
        Ok(Box::new(select_provider(config)?))
    }
}

/// Run the provider-specific prerequisite check, then construct the provider.
pub fn prepare_provider(
    config: &AppConfig,
    factory: &dyn ProviderFactory,
) -> Result<Box<dyn ChatProvider>> {
    let kind: ProviderKind = config.model_provider.parse()?;
    if kind == ProviderKind::LocalSmall {
        check_local_small_prereqs(config)?;
    }
    factory.create(config)
}
