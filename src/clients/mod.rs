//! 模型客户端 - 基础设施层
//!
//! 只负责"把提示词和图片发给模型，拿回文本"，不关心回复内容。

pub mod gemini_client;
pub mod openai_client;

pub use gemini_client::{GeminiClient, GenerationConfig};
pub use openai_client::OpenAiCompatClient;

use crate::config::{Config, Provider};
use crate::error::AppResult;
use crate::models::ImagePayload;

/// 多模态模型接口
///
/// 一次调用 = 一张图片 + 一段提示词 → 模型回复文本。
#[allow(async_fn_in_trait)]
pub trait VisionModel {
    /// 报告中显示的模型名称
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str, image: &ImagePayload) -> AppResult<String>;
}

/// 按配置选择的模型客户端
pub enum ModelClient {
    Gemini(GeminiClient),
    OpenAi(OpenAiCompatClient),
}

impl ModelClient {
    /// 根据 `config.provider` 创建客户端
    pub fn from_config(config: &Config, api_key: &str) -> AppResult<Self> {
        Ok(match config.provider {
            Provider::Gemini => ModelClient::Gemini(GeminiClient::new(config, api_key)?),
            Provider::OpenAi => ModelClient::OpenAi(OpenAiCompatClient::new(config, api_key)),
        })
    }
}

impl VisionModel for ModelClient {
    fn model_name(&self) -> &str {
        match self {
            ModelClient::Gemini(c) => c.model_name(),
            ModelClient::OpenAi(c) => c.model_name(),
        }
    }

    async fn generate(&self, prompt: &str, image: &ImagePayload) -> AppResult<String> {
        match self {
            ModelClient::Gemini(c) => c.generate(prompt, image).await,
            ModelClient::OpenAi(c) => c.generate(prompt, image).await,
        }
    }
}
