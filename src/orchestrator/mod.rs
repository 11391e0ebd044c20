//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 把每个命令需要的步骤串起来，并输出统计信息。不做具体的业务判断。
//!
//! ## 模块划分
//!
//! ### `extract_runner` - 图片提取
//! - HTML 报告 → 独立图片文件
//!
//! ### `batch_grader` - 批量分级
//! - 扫描图片目录，逐张交给 `GradingFlow`
//! - 请求间隔、致命错误中止
//! - 写出 CSV / JSON / HTML 报告
//!
//! ### `feedback_runner` - 专家反馈
//! - 统计一致率，生成补充提示词
//!
//! ## 层次关系
//!
//! ```text
//! batch_grader (处理 Vec<图片>)
//!     ↓
//! workflow::GradingFlow (处理单张图片)
//!     ↓
//! services (能力层：prompt / response_parser / report_writer)
//!     ↓
//! clients (基础设施：Gemini / OpenAI 兼容接口)
//! ```

pub mod batch_grader;
pub mod extract_runner;
pub mod feedback_runner;

pub use batch_grader::{BatchGrader, BatchOutcome, ProcessingStats, ReportPaths};
pub use extract_runner::run_extract;
pub use feedback_runner::{run_feedback_analysis, FeedbackOutcome};
