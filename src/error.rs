use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 图片提取错误
    #[error("提取错误: {0}")]
    Extract(#[from] ExtractError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 没有可用的 API Key
    #[error("未提供 API Key (请设置 GEMINI_API_KEY 或使用 --api-key)")]
    MissingApiKey,
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 未知的模型提供方
    #[error("未知的模型提供方: {0} (可选: gemini, openai)")]
    UnknownProvider(String),
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    FileParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): code={code:?}, message={message:?}")]
    BadResponse {
        endpoint: String,
        code: Option<u16>,
        message: Option<String>,
    },
    /// API 返回空结果
    #[error("API返回空结果: {endpoint}")]
    EmptyResponse { endpoint: String },
    /// API Key 无效或没有权限
    #[error("API Key 无效或没有权限 ({endpoint}): {message}")]
    Unauthorized { endpoint: String, message: String },
    /// 请求频率限制
    #[error("API请求频率限制 ({endpoint}), 请在请求之间增加延时 (GRADER_REQUEST_DELAY_MS)")]
    RateLimited { endpoint: String },
    /// JSON 解析失败
    #[error("JSON解析失败: {0}")]
    JsonParseFailed(#[from] serde_json::Error),
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 目录不存在
    #[error("图片目录不存在: {path}，请先运行 extract 从 HTML 中提取图片")]
    ImageDirNotFound { path: String },
    /// CSV 读写失败
    #[error("CSV处理失败 ({path}): {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// 图片提取错误
#[derive(Debug, Error)]
pub enum ExtractError {
    /// base64 解码失败
    #[error("第 {index} 张图片 base64 解码失败: {source}")]
    DecodeFailed {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },
    /// 文件名正则无效
    #[error("文件名匹配规则无效: {0}")]
    InvalidPattern(#[from] regex::Error),
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建 CSV 错误
    pub fn csv_failed(path: impl Into<String>, source: csv::Error) -> Self {
        AppError::File(FileError::Csv {
            path: path.into(),
            source,
        })
    }

    /// 是否为必须中止整个运行的错误（缺少或无效的 API Key）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::Api(ApiError::Unauthorized { .. })
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed(err))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
