use crate::error::{AppError, AppResult, ConfigError};
use serde::Deserialize;
use std::fmt;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Gemini 原生接口地址
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Gemini 提供的 OpenAI 兼容接口地址
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// 模型提供方
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Gemini 原生 generateContent 接口
    #[default]
    Gemini,
    /// OpenAI 兼容的 chat/completions 接口
    #[serde(alias = "openai-compat")]
    OpenAi,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" | "openai-compat" => Ok(Provider::OpenAi),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 模型配置 ---
    pub provider: Provider,
    pub api_key: Option<String>,
    /// 为空时按 provider 选择默认地址
    pub api_base_url: Option<String>,
    pub model_name: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 两次请求之间的等待（毫秒），被限流时手动调大
    pub request_delay_ms: u64,
    // --- 路径配置 ---
    pub html_file: PathBuf,
    pub image_dir: PathBuf,
    pub output_dir: PathBuf,
    pub improved_output_dir: PathBuf,
    /// 从 HTML 中识别图片文件名的正则
    pub filename_pattern: String,
    /// HTML 报告中是否以 data URI 内嵌图片
    pub embed_images: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            api_key: None,
            api_base_url: None,
            model_name: "gemini-2.0-flash-exp".to_string(),
            temperature: 0.2,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 1024,
            request_timeout_secs: 60,
            request_delay_ms: 0,
            html_file: PathBuf::from("verification_results/verification_report.html"),
            image_dir: PathBuf::from("extracted_images"),
            output_dir: PathBuf::from("grading_results"),
            improved_output_dir: PathBuf::from("improved_results"),
            filename_pattern: r"D[35]_\d+\.jpg".to_string(),
            embed_images: true,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件 → 环境变量
    ///
    /// 文件路径优先使用参数，其次是 `GRADER_CONFIG` 环境变量；都没有时跳过文件层。
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let file_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("GRADER_CONFIG").ok().map(PathBuf::from));

        let base = match file_path {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };

        base.with_env()
    }

    /// 从 TOML 文件读取配置，缺失的字段使用默认值
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        Self::from_toml_str(&content).map_err(|source| {
            ConfigError::FileParseFailed {
                path: path.display().to_string(),
                source,
            }
            .into()
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 仅使用默认值 + 环境变量
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env()
    }

    /// 用环境变量覆盖当前配置
    pub fn with_env(self) -> AppResult<Self> {
        let base = self;
        let provider = match std::env::var("GRADER_PROVIDER") {
            Ok(v) => v.parse()?,
            Err(_) => base.provider,
        };

        Ok(Self {
            provider,
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .or(base.api_key),
            api_base_url: std::env::var("GRADER_API_BASE_URL").ok().or(base.api_base_url),
            model_name: std::env::var("GRADER_MODEL").unwrap_or(base.model_name),
            request_timeout_secs: env_parse("GRADER_TIMEOUT_SECS")?
                .unwrap_or(base.request_timeout_secs),
            request_delay_ms: env_parse("GRADER_REQUEST_DELAY_MS")?
                .unwrap_or(base.request_delay_ms),
            html_file: env_path("GRADER_HTML_FILE").unwrap_or(base.html_file),
            image_dir: env_path("GRADER_IMAGE_DIR").unwrap_or(base.image_dir),
            output_dir: env_path("GRADER_OUTPUT_DIR").unwrap_or(base.output_dir),
            embed_images: env_parse("GRADER_EMBED_IMAGES")?.unwrap_or(base.embed_images),
            verbose_logging: std::env::var("VERBOSE_LOGGING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.verbose_logging),
            ..base
        })
    }

    /// 实际使用的 API 地址
    pub fn api_base_url(&self) -> &str {
        match (&self.api_base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, Provider::Gemini) => GEMINI_API_BASE_URL,
            (None, Provider::OpenAi) => GEMINI_OPENAI_BASE_URL,
        }
    }

    /// 确定 API Key：命令行参数 → 配置/环境变量 → 终端交互输入
    ///
    /// 全部为空时返回 `ConfigError::MissingApiKey`，调用方应中止运行。
    pub fn resolve_api_key(&mut self, cli_key: Option<String>) -> AppResult<String> {
        if let Some(key) = cli_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }

        if self.api_key.is_none() && io::stdin().is_terminal() {
            self.api_key = prompt_for_api_key()?;
        }

        self.api_key
            .clone()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey.into())
    }
}

/// 解析数值/布尔类型的环境变量，不存在时返回 None
fn env_parse<T: FromStr>(var_name: &str) -> AppResult<Option<T>> {
    match std::env::var(var_name) {
        Ok(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

fn env_path(var_name: &str) -> Option<PathBuf> {
    std::env::var(var_name).ok().map(PathBuf::from)
}

fn prompt_for_api_key() -> AppResult<Option<String>> {
    eprintln!("\n未在环境变量中找到 GEMINI_API_KEY");
    eprint!("请输入 Google AI Studio API Key: ");
    io::stderr()
        .flush()
        .map_err(|e| AppError::Other(e.to_string()))?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AppError::file_read_failed("<stdin>", e))?;

    let key = line.trim().to_string();
    Ok((!key.is_empty()).then_some(key))
}
