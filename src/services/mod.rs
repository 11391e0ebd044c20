pub mod feedback_analyzer;
pub mod image_extractor;
pub mod prompt;
pub mod report_writer;
pub mod response_parser;

pub use image_extractor::{ExtractionSummary, ImageExtractor};
pub use prompt::{build_prompt, GARDNER_SCALE_PROMPT};
pub use report_writer::HtmlReportOptions;
pub use response_parser::parse_response;
