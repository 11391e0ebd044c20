pub mod feedback;
pub mod grade;
pub mod image;
pub mod loaders;

pub use feedback::{AgreementLevel, AgreementStats, FeedbackAnalysis, FeedbackEntry};
pub use grade::{
    CellQuality, ExpansionStage, GardnerGrade, GradingRecord, ParsedGrade, CSV_HEADERS,
    ERROR_LABEL, NOT_APPLICABLE, NOT_APPLICABLE_QUALITY,
};
pub use image::{mime_type_for, ImagePayload};
pub use loaders::{list_images, load_image};
