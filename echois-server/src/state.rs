//! Shared per-request state.

use crate::config::ServerConfig;
use echois_billing::{
    AppleJwsVerifier, AppleKeyCache, ReceiptVerifier, SubscriptionStore, SystemClock, UsageSink,
    APPLE_KEYS_BASE_URL, DEFAULT_KEY_TTL,
};
use echois_llm::{ChatProvider, OpenAiProvider};
use echois_speech::{OpenAiTtsEngine, Transcriber, TtsEngine};
use echois_stream::PipelineConfig;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ChatProvider>,
    pub tts: Arc<dyn TtsEngine>,
    pub transcriber: Arc<Transcriber>,
    pub store: Arc<SubscriptionStore>,
    pub jws_verifier: Arc<AppleJwsVerifier>,
    pub receipts: Arc<ReceiptVerifier>,
    pub usage: UsageSink,
    pub pipeline: PipelineConfig,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let clock = Arc::new(SystemClock);
        let keys = AppleKeyCache::new(APPLE_KEYS_BASE_URL, DEFAULT_KEY_TTL, clock.clone());

        let pipeline = PipelineConfig {
            voice: config.voice.clone(),
            idle_timeout: config.stream_idle_timeout,
            ..PipelineConfig::default()
        };

        Ok(Self {
            provider: Arc::new(OpenAiProvider::new(config.llm.clone())?),
            tts: Arc::new(OpenAiTtsEngine::new(config.tts.clone())?),
            transcriber: Arc::new(Transcriber::new(config.stt.clone())?),
            store: Arc::new(SubscriptionStore::new(clock)),
            jws_verifier: Arc::new(AppleJwsVerifier::new(keys)),
            receipts: Arc::new(ReceiptVerifier::new(
                config.apple_verify_url.clone(),
                config.apple_shared_secret.clone(),
            )?),
            usage: UsageSink::new(config.usage_endpoint.clone())?,
            pipeline,
        })
    }
}
