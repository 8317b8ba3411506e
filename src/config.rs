use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, AppResult, ConfigError, FileError, ValidationError};

/// 系统指令最短长度
pub const MIN_INSTRUCTION_LEN: usize = 50;
/// 系统指令最长长度
pub const MAX_INSTRUCTION_LEN: usize = 4000;
/// 系统指令至少需要包含其中一个关键词（不区分大小写）
pub const INSTRUCTION_KEYWORDS: [&str; 5] = ["analy", "finding", "recommend", "image", "diagnos"];

const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an expert medical imaging assistant. \
Analyze every image in the request and respond with the sections DETAILED FINDINGS, \
RECOMMENDATIONS, CONFIDENCE and TECHNICAL NOTES. Describe observations objectively \
and flag anything that needs review by a qualified specialist.";

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 每个批次最多包含的图片数量
    pub batch_size: usize,
    /// 同时处理的批次数量
    pub max_concurrent_batches: usize,
    /// 可重试错误的额外重试次数
    pub max_retries: u32,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 退避等待上限（秒）
    pub max_backoff_secs: u64,
    /// 单次运行允许的图片总数
    pub max_images: usize,
    /// 单张图片大小上限（字节）
    pub max_image_bytes: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 报告输出目录
    pub report_dir: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 发送给分析服务的系统指令
    pub system_instruction: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_concurrent_batches: 3,
            max_retries: 3,
            request_timeout_secs: 300,
            max_backoff_secs: 30,
            max_images: 200,
            max_image_bytes: 50 * 1024 * 1024,
            verbose_logging: false,
            report_dir: "reports".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl Config {
    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置，缺失的字段使用默认值，随后再应用环境变量覆盖
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let config: Config = toml::from_str(&content).map_err(|source| FileError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config.with_env_overrides())
    }

    /// 用环境变量覆盖已有配置，解析失败时保留原值
    pub fn with_env_overrides(self) -> Self {
        Self {
            batch_size: env_parse("BATCH_SIZE").unwrap_or(self.batch_size),
            max_concurrent_batches: env_parse("MAX_CONCURRENT_BATCHES").unwrap_or(self.max_concurrent_batches),
            max_retries: env_parse("MAX_RETRIES").unwrap_or(self.max_retries),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(self.request_timeout_secs),
            max_backoff_secs: env_parse("MAX_BACKOFF_SECS").unwrap_or(self.max_backoff_secs),
            max_images: env_parse("MAX_IMAGES").unwrap_or(self.max_images),
            max_image_bytes: env_parse("MAX_IMAGE_BYTES").unwrap_or(self.max_image_bytes),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            report_dir: std::env::var("REPORT_DIR").unwrap_or(self.report_dir),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            system_instruction: std::env::var("SYSTEM_INSTRUCTION").unwrap_or(self.system_instruction),
        }
    }

    /// 检查配置是否可用于一次分析运行
    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "必须大于 0").into());
        }
        if self.max_concurrent_batches == 0 {
            return Err(ConfigError::invalid("max_concurrent_batches", "必须大于 0").into());
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs", "必须大于 0").into());
        }
        if self.llm_api_base_url.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "llm_api_base_url".to_string(),
            }
            .into());
        }
        validate_system_instruction(&self.system_instruction)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

/// 校验系统指令：长度在 [50, 4000] 之间，且至少包含一个关键词
pub fn validate_system_instruction(instruction: &str) -> Result<(), ValidationError> {
    let len = instruction.trim().chars().count();
    if !(MIN_INSTRUCTION_LEN..=MAX_INSTRUCTION_LEN).contains(&len) {
        return Err(ValidationError::InstructionLength {
            len,
            min: MIN_INSTRUCTION_LEN,
            max: MAX_INSTRUCTION_LEN,
        });
    }

    let lower = instruction.to_lowercase();
    if !INSTRUCTION_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Err(ValidationError::InstructionMissingKeyword {
            expected: INSTRUCTION_KEYWORDS.join(", "),
        });
    }

    Ok(())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_concurrent_batches, 3);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_missing_fields_use_defaults() {
        let config: Config = toml::from_str(
            r#"
            batch_size = 10
            llm_model_name = "vision-model"
            "#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.llm_model_name, "vision-model");
        assert_eq!(config.max_concurrent_batches, 3);
        assert_eq!(config.max_images, 200);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_instruction_too_short() {
        let err = validate_system_instruction("analyze this").unwrap_err();
        assert!(matches!(err, ValidationError::InstructionLength { min: 50, .. }));
    }

    #[test]
    fn test_instruction_too_long() {
        let long = format!("analyze {}", "x".repeat(4000));
        assert!(matches!(
            validate_system_instruction(&long),
            Err(ValidationError::InstructionLength { .. })
        ));
    }

    #[test]
    fn test_instruction_requires_keyword() {
        let text = "Please be a helpful assistant and answer every question politely and briefly.";
        assert!(matches!(
            validate_system_instruction(text),
            Err(ValidationError::InstructionMissingKeyword { .. })
        ));

        let text = "Please be a helpful assistant and describe the FINDINGS for each radiograph.";
        assert!(validate_system_instruction(text).is_ok());
    }
}
