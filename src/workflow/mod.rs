pub mod grading_flow;
pub mod image_ctx;

pub use grading_flow::GradingFlow;
pub use image_ctx::ImageCtx;
