//! 单张图片分级流程 - 流程层
//!
//! 流程顺序：
//! 1. 读取图片
//! 2. 提示词 + 图片 → 模型
//! 3. 解析回复 → GradingRecord
//!
//! 任何一步失败都生成 ERROR 记录，批处理继续；
//! 只有缺少/无效 API Key 这类致命错误会向上返回。

use std::path::Path;
use tracing::{error, info, warn};

use crate::clients::VisionModel;
use crate::error::AppResult;
use crate::models::{load_image, GradingRecord};
use crate::services::prompt::build_prompt;
use crate::services::response_parser::parse_response;
use crate::utils::logging::truncate_text;
use crate::workflow::image_ctx::ImageCtx;

/// 单张图片分级流程
///
/// - 持有模型客户端和最终提示词
/// - 不关心图片从哪里来、结果写到哪里
pub struct GradingFlow<M> {
    model: M,
    prompt: String,
}

impl<M: VisionModel> GradingFlow<M> {
    /// 创建新的分级流程，`prompt_supplement` 为专家反馈生成的补充说明
    pub fn new(model: M, prompt_supplement: Option<&str>) -> Self {
        Self {
            model,
            prompt: build_prompt(prompt_supplement),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// 对一张图片分级
    ///
    /// # 返回
    /// - `Ok(record)`：成功、不适用或非致命失败（ERROR 记录）
    /// - `Err(e)`：致命错误，调用方应中止整个运行
    pub async fn grade_image(&self, image_path: &Path, ctx: &ImageCtx) -> AppResult<GradingRecord> {
        info!("{} 🔬 正在分级...", ctx);

        let image = match load_image(image_path).await {
            Ok(image) => image,
            Err(e) => {
                error!("{} ❌ 读取图片失败: {:#}", ctx, e);
                return Ok(GradingRecord::failed(image_path, format!("{:#}", e)));
            }
        };

        let response = match self.model.generate(&self.prompt, &image).await {
            Ok(response) => response,
            Err(e) if e.is_fatal() => {
                error!("{} ❌ {}", ctx, e);
                return Err(e);
            }
            Err(e) => {
                error!("{} ❌ 模型调用失败: {}", ctx, e);
                return Ok(GradingRecord::failed(image_path, e));
            }
        };

        let parsed = parse_response(&response);
        let record = GradingRecord::from_parsed(image_path, &parsed, &response);

        if parsed.is_empty() {
            warn!(
                "{} ⚠️ 无法解析模型回复，字段记为 N/A: {}",
                ctx,
                truncate_text(&response, 120)
            );
        }
        info!("{} ✓ 分级: {}", ctx, record.gardner_grade);
        info!("{}   质量: {}", ctx, record.quality_score);

        Ok(record)
    }
}
