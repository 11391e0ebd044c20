//! OpenAI 兼容接口客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - Gemini 自带 OpenAI 兼容端点，也可以接其他兼容服务（代理网关等）
//!
//! 图片以 `data:` URL 的形式放在用户消息的 image_url 部分。

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use tracing::{debug, warn};

use crate::clients::VisionModel;
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::models::ImagePayload;

const ENDPOINT: &str = "chat/completions";

/// OpenAI 兼容客户端
pub struct OpenAiCompatClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl OpenAiCompatClient {
    /// 创建新的客户端
    pub fn new(config: &Config, api_key: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(config.api_base_url());

        Self {
            client: Client::with_config(openai_config),
            model_name: config.model_name.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_output_tokens,
        }
    }
}

impl VisionModel for OpenAiCompatClient {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate(&self, prompt: &str, image: &ImagePayload) -> AppResult<String> {
        debug!("调用 OpenAI 兼容接口，模型: {}", self.model_name);

        // 文本 + 图片放在同一条用户消息里
        let content_parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: prompt.to_string(),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: image.data_url(),
                        detail: Some(ImageDetail::High),
                    },
                },
            ),
        ];

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(|e| AppError::Other(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(self.temperature)
            .top_p(self.top_p)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| AppError::Other(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("OpenAI 兼容接口调用失败: {}", e);
            classify_error(e)
        })?;

        debug!("OpenAI 兼容接口调用成功");

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                ApiError::EmptyResponse {
                    endpoint: ENDPOINT.to_string(),
                }
                .into()
            })
    }
}

/// 按错误信息区分 Key 无效、限流和其他失败
fn classify_error(err: OpenAIError) -> AppError {
    let message = err.to_string();
    let lower = message.to_lowercase();

    if lower.contains("api key") || lower.contains("unauthorized") || lower.contains("401") {
        ApiError::Unauthorized {
            endpoint: ENDPOINT.to_string(),
            message,
        }
        .into()
    } else if lower.contains("rate limit")
        || lower.contains("429")
        || lower.contains("resource_exhausted")
    {
        ApiError::RateLimited {
            endpoint: ENDPOINT.to_string(),
        }
        .into()
    } else {
        AppError::api_request_failed(ENDPOINT, err)
    }
}
