use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use embryo_grader::clients::VisionModel;
use embryo_grader::config::Config;
use embryo_grader::error::{ApiError, AppError, AppResult};
use embryo_grader::models::{GardnerGrade, GradingRecord, ImagePayload};
use embryo_grader::orchestrator::{run_extract, BatchGrader};
use embryo_grader::services::report_writer::{self, HtmlReportOptions};
use embryo_grader::services::ImageExtractor;
use embryo_grader::workflow::{GradingFlow, ImageCtx};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

const GOOD_RESPONSE: &str = "Expansion: 4, ICM: A, TE: A, Quality: Good, \
                             Explanation: Expanded blastocyst with a compact ICM.";

const MARKDOWN_RESPONSE: &str = "## Gardner Assessment\n\
                                 - **Expansion Stage:** 4\n\
                                 - **Inner Cell Mass (ICM):** A\n\
                                 - **Trophectoderm (TE):** B\n\
                                 - **Quality:** Good\n\n\
                                 **Explanation:** Expanded cavity, thin zona.";

/// 模型的预设回复
#[derive(Clone, Copy)]
enum Reply {
    Good,
    Markdown,
    Cleavage,
    ServerError,
    InvalidKey,
}

impl Reply {
    fn into_result(self) -> AppResult<String> {
        match self {
            Reply::Good => Ok(GOOD_RESPONSE.to_string()),
            Reply::Markdown => Ok(MARKDOWN_RESPONSE.to_string()),
            Reply::Cleavage => Ok("This is a Day 3 cleavage-stage embryo with 8 cells, \
                                   not a blastocyst. Gardner grade: N/A"
                .to_string()),
            Reply::ServerError => Err(ApiError::BadResponse {
                endpoint: "generateContent".to_string(),
                code: Some(500),
                message: Some("internal".to_string()),
            }
            .into()),
            Reply::InvalidKey => Err(ApiError::Unauthorized {
                endpoint: "generateContent".to_string(),
                message: "API key not valid".to_string(),
            }
            .into()),
        }
    }
}

/// 按调用次序返回预设结果的模型
struct ScriptedModel {
    calls: AtomicUsize,
    script: Vec<Reply>,
}

impl ScriptedModel {
    fn new(script: Vec<Reply>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisionModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, prompt: &str, image: &ImagePayload) -> AppResult<String> {
        assert!(prompt.contains("Gardner"));
        assert!(!image.data.is_empty());
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        self.script[i % self.script.len()].into_result()
    }
}

fn write_images(dir: &Path, names: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for name in names {
        std::fs::write(dir.join(name), b"\xFF\xD8\xFF\xE0fake-jpeg").unwrap();
    }
}

fn test_config(root: &Path) -> Config {
    Config {
        image_dir: root.join("images"),
        output_dir: root.join("results"),
        embed_images: true,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_grade_single_image() {
    let dir = tempfile::tempdir().unwrap();
    write_images(dir.path(), &["D5_368.jpg"]);

    let flow = GradingFlow::new(ScriptedModel::new(vec![Reply::Good]), None);
    let record = flow
        .grade_image(&dir.path().join("D5_368.jpg"), &ImageCtx::new(1, 1, "D5_368.jpg"))
        .await
        .unwrap();

    assert_eq!(record.image_name, "D5_368.jpg");
    assert_eq!(record.gardner_grade, "4AA");
    assert_eq!(record.expansion, "4");
    assert_eq!(record.icm_quality, "A");
    assert_eq!(record.te_quality, "A");
    assert_eq!(record.quality_score, "Good");
    assert_eq!(record.full_response, GOOD_RESPONSE);
}

#[tokio::test]
async fn test_grade_markdown_formatted_reply() {
    let dir = tempfile::tempdir().unwrap();
    write_images(dir.path(), &["D5_12.jpg"]);

    let flow = GradingFlow::new(ScriptedModel::new(vec![Reply::Markdown]), None);
    let record = flow
        .grade_image(&dir.path().join("D5_12.jpg"), &ImageCtx::new(1, 1, "D5_12.jpg"))
        .await
        .unwrap();

    assert_eq!(record.gardner_grade, "4AB");
    assert_eq!(record.expansion, "4");
    assert_eq!(record.icm_quality, "A");
    assert_eq!(record.te_quality, "B");
    assert_eq!(record.quality_score, "Good");
    assert_eq!(record.explanation, "Expanded cavity, thin zona.");
}

#[tokio::test]
async fn test_missing_image_becomes_error_record() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![Reply::Good]);
    let flow = GradingFlow::new(model, None);

    let record = flow
        .grade_image(&dir.path().join("D5_1.jpg"), &ImageCtx::new(1, 1, "D5_1.jpg"))
        .await
        .unwrap();

    assert!(record.is_error());
    assert!(record.explanation.starts_with("Error during grading:"));
    assert_eq!(flow.model().calls(), 0);
}

#[tokio::test]
async fn test_batch_continues_after_api_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_images(&config.image_dir, &["D3_1.jpg", "D5_1.jpg", "D5_2.jpg"]);

    // 按文件名排序：D3_1 → 非囊胚，D5_1 → 失败，D5_2 → 4AA
    let model = ScriptedModel::new(vec![Reply::Cleavage, Reply::ServerError, Reply::Good]);
    let grader = BatchGrader::new(config.clone(), GradingFlow::new(model, None));
    let outcome = grader.run().await.unwrap();

    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.stats.graded, 1);
    assert_eq!(outcome.stats.not_applicable, 1);
    assert_eq!(outcome.stats.failed, 1);

    let d3 = &outcome.records[0];
    assert_eq!(d3.gardner_grade, "N/A");
    assert_eq!(d3.quality_score, "Not Applicable");

    let failed = &outcome.records[1];
    assert_eq!(failed.gardner_grade, "ERROR");
    assert_eq!(failed.expansion, "ERROR");

    assert_eq!(outcome.records[2].gardner_grade, "4AA");

    let reports = outcome.reports.expect("报告应已生成");
    assert!(reports.csv.exists());
    assert!(reports.json.exists());
    assert!(reports.html.exists());

    let csv_back = report_writer::read_csv(&reports.csv).unwrap();
    assert_eq!(csv_back.len(), 3);
    assert_eq!(csv_back[2].gardner_grade, "4AA");
    assert!(csv_back.iter().all(|r| r.full_response.is_empty()));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&reports.json).unwrap()).unwrap();
    assert_eq!(json[2]["full_response"], GOOD_RESPONSE);

    let html = std::fs::read_to_string(&reports.html).unwrap();
    assert!(html.contains("grade-error"));
    assert!(html.contains("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn test_invalid_key_halts_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_images(&config.image_dir, &["D5_1.jpg", "D5_2.jpg", "D5_3.jpg"]);

    let grader = BatchGrader::new(
        config.clone(),
        GradingFlow::new(ScriptedModel::new(vec![Reply::InvalidKey]), None),
    );
    let err = grader.run().await.unwrap_err();

    let app_err = err.downcast_ref::<AppError>().expect("应为 AppError");
    assert!(app_err.is_fatal());
    assert!(!config.output_dir.exists());
}

#[tokio::test]
async fn test_missing_image_dir_mentions_extract() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let flow = GradingFlow::new(ScriptedModel::new(vec![Reply::Good]), None);
    let grader = BatchGrader::new(config, flow);
    let err = grader.run().await.unwrap_err();
    assert!(err.to_string().contains("extract"));
}

#[tokio::test]
async fn test_empty_image_dir_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.image_dir).unwrap();

    let grader = BatchGrader::new(
        config.clone(),
        GradingFlow::new(ScriptedModel::new(vec![Reply::Good]), None),
    );
    let outcome = grader.run().await.unwrap();
    assert!(outcome.records.is_empty());
    assert!(outcome.reports.is_none());
}

#[tokio::test]
async fn test_extract_names_every_image_distinctly() {
    let dir = tempfile::tempdir().unwrap();
    let jpeg = STANDARD.encode(b"jpeg-bytes");
    let png = STANDARD.encode(b"png-bytes");
    let html = format!(
        r#"<html><body>
        <div><h3>D5_10.jpg</h3><img src="data:image/jpeg;base64,{jpeg}"></div>
        <div><h3>D5_10.jpg</h3><img src="data:image/jpeg;base64,{jpeg}"></div>
        <div><img src="data:image/png;base64,{png}"></div>
        </body></html>"#
    );
    let html_path = dir.path().join("report.html");
    std::fs::write(&html_path, html).unwrap();

    let out = dir.path().join("extracted");
    let summary = run_extract(&html_path, &out, r"D[35]_\d+\.jpg").await.unwrap();

    assert_eq!(summary.found, 3);
    assert_eq!(summary.saved.len(), 3);
    let names: HashSet<_> = summary
        .saved
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains("D5_10.jpg"));
    for path in &summary.saved {
        assert!(path.exists());
    }
}

#[tokio::test]
async fn test_html_report_feeds_back_into_extractor() {
    let dir = tempfile::tempdir().unwrap();
    write_images(dir.path(), &["D5_1.jpg", "D5_2.jpg"]);

    let records = vec![
        GradingRecord::graded(
            &dir.path().join("D5_1.jpg"),
            GardnerGrade::parse("4AA").unwrap(),
            "Good",
            "",
        ),
        GradingRecord::graded(
            &dir.path().join("D5_2.jpg"),
            GardnerGrade::parse("3BC").unwrap(),
            "Fair",
            "",
        ),
    ];
    let html = report_writer::render_html(&records, &HtmlReportOptions::default());

    let extractor = ImageExtractor::new(r"D[35]_\d+\.jpg").unwrap();
    let summary = extractor
        .extract_from_str(&html, &dir.path().join("again"))
        .await
        .unwrap();

    assert_eq!(summary.saved.len(), 2);
    let bytes = std::fs::read(&summary.saved[0]).unwrap();
    assert_eq!(bytes, b"\xFF\xD8\xFF\xE0fake-jpeg");
}

#[test]
fn test_csv_round_trip_keeps_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");

    let mut graded = GradingRecord::graded(
        Path::new("images/D5_7.jpg"),
        GardnerGrade::parse("5AB").unwrap(),
        "Good",
        "Hatching, \"well\" expanded\nTE slightly irregular",
    );
    graded.full_response = "raw reply, only kept in JSON".to_string();
    let records = vec![
        graded,
        GradingRecord::not_applicable(Path::new("images/D3_2.jpg"), "8-cell, no cavity"),
        GradingRecord::failed(Path::new("images/D5_8.jpg"), "HTTP 500: \"internal\""),
    ];

    report_writer::write_csv(&records, &path).unwrap();
    let back = report_writer::read_csv(&path).unwrap();

    assert_eq!(back.len(), records.len());
    for (read, original) in back.iter().zip(&records) {
        let expected = GradingRecord {
            full_response: String::new(),
            ..original.clone()
        };
        assert_eq!(read, &expected);
    }
}

#[test]
fn test_prompt_supplement_is_prepended() {
    tokio_test::block_on(async {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), &["D5_1.jpg"]);

        let flow = GradingFlow::new(
            ScriptedModel::new(vec![Reply::Good]),
            Some("**TE QUALITY GUIDELINES (Expert-Refined):**"),
        );
        assert!(flow.prompt().starts_with("**TE QUALITY GUIDELINES"));

        let record = flow
            .grade_image(&dir.path().join("D5_1.jpg"), &ImageCtx::new(1, 1, "D5_1.jpg"))
            .await
            .unwrap();
        assert_eq!(record.gardner_grade, "4AA");
    });
}
