//! # Embryo Grader
//!
//! 使用多模态大模型按 Gardner 标准对囊胚图片分级
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 把提示词和图片发给模型，拿回文本
//! - `GeminiClient` - Gemini 原生 generateContent 接口
//! - `OpenAiCompatClient` - OpenAI 兼容接口
//!
//! ### ② 业务能力层（Services）
//! - `image_extractor` - HTML 内嵌图片提取
//! - `prompt` / `response_parser` - 分级提示词和回复解析
//! - `report_writer` - CSV / JSON / HTML 报告
//! - `feedback_analyzer` - 专家反馈分析
//!
//! ### ③ 流程层（Workflow）
//! - `GradingFlow` - 一张图片的完整分级流程（读取 → 模型 → 解析）
//!
//! ### ④ 编排层（Orchestration）
//! - `BatchGrader` - 批量分级和报告输出
//! - `run_extract` / `run_feedback_analysis` - 其他命令入口
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ModelClient, VisionModel};
pub use config::{Config, Provider};
pub use error::{AppError, AppResult};
pub use models::{GardnerGrade, GradingRecord, ParsedGrade};
pub use orchestrator::{BatchGrader, BatchOutcome};
pub use workflow::{GradingFlow, ImageCtx};
