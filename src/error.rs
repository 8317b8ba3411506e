use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 本地校验错误（调度开始前）
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 分析服务错误
    #[error("分析服务错误: {0}")]
    Analysis(#[from] AnalysisError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 本地校验错误
///
/// 在任何网络调用之前抛出，不会重试
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 没有可分析的图片
    #[error("图片集合为空，无法开始分析")]
    EmptyItemSet,
    /// 批次超过容量上限
    #[error("批次 {batch_id} 包含 {size} 张图片，超过上限 {max}")]
    BatchTooLarge {
        batch_id: String,
        size: usize,
        max: usize,
    },
    /// 图片总数超过上限
    #[error("图片总数 {count} 超过上限 {max}")]
    TooManyImages { count: usize, max: usize },
    /// 单张图片过大
    #[error("图片 {name} 大小 {size} 字节，超过上限 {max} 字节")]
    ImageTooLarge { name: String, size: u64, max: u64 },
    /// 不支持的图片格式
    #[error("不支持的图片格式: {name}")]
    UnsupportedFormat { name: String },
    /// 系统指令长度不合法
    #[error("系统指令长度 {len} 不在 [{min}, {max}] 范围内")]
    InstructionLength { len: usize, min: usize, max: usize },
    /// 系统指令缺少必要关键词
    #[error("系统指令缺少必要关键词，至少需要包含其一: {expected}")]
    InstructionMissingKeyword { expected: String },
}

/// 分析服务错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// 请求未发出即被拒绝
    #[error("{0}")]
    Invalid(#[from] ValidationError),
    /// 单次请求超时（不重试）
    #[error("请求超时 ({secs} 秒)")]
    Timeout { secs: u64 },
    /// 服务返回非成功状态码
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },
    /// 传输层失败（连接中断、DNS 等）
    #[error("网络请求失败: {0}")]
    Transport(String),
    /// 响应无法解析
    #[error("响应格式错误: {0}")]
    MalformedResponse(String),
    /// 响应中没有文本内容
    #[error("分析服务返回内容为空")]
    EmptyContent,
    /// 构建请求失败
    #[error("构建请求失败: {0}")]
    RequestBuild(String),
    /// 重试次数用尽
    #[error("已尝试 {attempts} 次仍失败: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// 是否属于可重试的错误（429 / 502 / 503 / 传输层失败）
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::HttpStatus { status, .. } => matches!(status, 429 | 502 | 503),
            AnalysisError::Transport(_) => true,
            _ => false,
        }
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
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
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// JSON 序列化失败
    #[error("JSON序列化失败: {0}")]
    JsonFailed(#[from] serde_json::Error),
}

/// 配置错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 配置项取值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    InvalidValue { field: String, reason: String },
    /// 缺少必要配置
    #[error("缺少必要配置: {field}")]
    Missing { field: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
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
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
