//! Gemini 原生 API 客户端
//!
//! 调用 `models/{model}:generateContent`，图片以 inlineData（base64）随提示词一起发送。

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::clients::VisionModel;
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::models::ImagePayload;

/// 生成参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Gemini 客户端
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model_name: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    /// 创建新的 Gemini 客户端
    pub fn new(config: &Config, api_key: impl Into<String>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::api_request_failed(config.api_base_url(), e))?;

        Ok(Self {
            http,
            base_url: config.api_base_url().to_string(),
            api_key: api_key.into(),
            model_name: config.model_name.clone(),
            generation: GenerationConfig::from_config(config),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model_name
        )
    }
}

impl VisionModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate(&self, prompt: &str, image: &ImagePayload) -> AppResult<String> {
        let endpoint = self.endpoint();
        let body = build_request(prompt, image, self.generation);

        debug!("调用 Gemini API，模型: {}", self.model_name);
        debug!(
            "提示词长度: {} 字符，图片: {} ({} bytes)",
            prompt.len(),
            image.mime_type,
            image.data.len()
        );

        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        if !status.is_success() {
            let err = classify_error(&endpoint, status, &text);
            warn!("Gemini API 调用失败: {}", err);
            return Err(err.into());
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        let content = extract_text(&parsed).ok_or_else(|| {
            let reason = parsed
                .candidates
                .first()
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "无候选结果".to_string());
            warn!("Gemini 返回内容为空 (finishReason: {})", reason);
            ApiError::EmptyResponse {
                endpoint: endpoint.clone(),
            }
        })?;

        debug!("Gemini API 调用成功");
        Ok(content)
    }
}

fn build_request<'a>(
    prompt: &'a str,
    image: &ImagePayload,
    generation: GenerationConfig,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                Part {
                    text: Some(prompt),
                    inline_data: None,
                },
                Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: image.mime_type,
                        data: image.to_base64(),
                    }),
                },
            ],
        }],
        generation_config: generation,
    }
}

/// 拼接第一个候选结果中的所有文本片段
fn extract_text(response: &GenerateContentResponse) -> Option<String> {
    let content = response.candidates.first()?.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// 把非 2xx 响应映射为 ApiError
fn classify_error(endpoint: &str, status: StatusCode, body: &str) -> ApiError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = envelope.as_ref().and_then(|e| e.error.message.clone());
    let api_status = envelope.as_ref().and_then(|e| e.error.status.clone());

    let key_rejected = message
        .as_deref()
        .map(|m| m.to_lowercase().contains("api key"))
        .unwrap_or(false);

    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
            endpoint: endpoint.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized {
            endpoint: endpoint.to_string(),
            message: message.unwrap_or_else(|| status.to_string()),
        },
        StatusCode::BAD_REQUEST if key_rejected => ApiError::Unauthorized {
            endpoint: endpoint.to_string(),
            message: message.unwrap_or_default(),
        },
        _ => ApiError::BadResponse {
            endpoint: endpoint.to_string(),
            code: Some(status.as_u16()),
            message: message.or(api_status),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation() -> GenerationConfig {
        GenerationConfig::from_config(&Config::default())
    }

    #[test]
    fn test_request_body_shape() {
        let image = ImagePayload::new("image/jpeg", b"abc".to_vec());
        let body = serde_json::to_value(build_request("grade this", &image, generation())).unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "grade this");
        assert!(parts[0].get("inlineData").is_none());
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "YWJj");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Expansion: 4, "},{"text":"ICM: A"}],"role":"model"},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(&response).as_deref(), Some("Expansion: 4, ICM: A"));
    }

    #[test]
    fn test_extract_text_empty_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(extract_text(&response).is_none());
    }

    #[test]
    fn test_classify_errors() {
        let invalid_key = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            classify_error("e", StatusCode::BAD_REQUEST, invalid_key),
            ApiError::Unauthorized { .. }
        ));
        assert!(matches!(
            classify_error("e", StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited { .. }
        ));
        match classify_error("e", StatusCode::INTERNAL_SERVER_ERROR, "oops") {
            ApiError::BadResponse { code, message, .. } => {
                assert_eq!(code, Some(500));
                assert!(message.is_none());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    /// 真实调用 Gemini
    ///
    /// 运行方式：
    /// ```bash
    /// GEMINI_API_KEY=... cargo test test_live_generate -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_live_generate() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env().unwrap();
        let key = config.api_key.clone().expect("需要 GEMINI_API_KEY");
        let client = GeminiClient::new(&config, key).unwrap();

        // 1x1 白色 PNG
        let png = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8/5+hHgAHggJ/PchI7wAAAABJRU5ErkJggg==",
        )
        .unwrap();
        let image = ImagePayload::new("image/png", png);

        let response = client
            .generate(crate::services::prompt::GARDNER_SCALE_PROMPT, &image)
            .await
            .unwrap();
        println!("{}", response);
        assert!(!response.is_empty());
    }
}
