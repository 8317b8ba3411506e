//! OpenAI 兼容的分析服务后端
//!
//! ## 技术栈
//! - 使用 `async-openai` 的请求类型构建消息（系统消息 + 文本段 + 图片段）
//! - 使用 `reqwest` 发送请求，以便拿到准确的 HTTP 状态码做错误归类
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
    ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::AnalysisError;
use crate::services::analysis_client::{AnalysisBackend, AnalysisRequest};
use crate::utils::logging::truncate_text;

/// OpenAI 兼容后端
pub struct OpenAiBackend {
    http: reqwest::Client,
    api_key: String,
    api_base_url: String,
    model_name: String,
}

impl OpenAiBackend {
    /// 创建新的后端
    pub fn new(config: &Config) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AnalysisError::RequestBuild(e.to_string()))?;

        Ok(Self {
            http,
            api_key: config.llm_api_key.clone(),
            api_base_url: config.llm_api_base_url.clone(),
            model_name: config.llm_model_name.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base_url.trim_end_matches('/'))
    }

    /// 构建请求体
    ///
    /// 系统消息 + 一条用户消息（一个文本段，每张图片一个图片段）
    pub fn build_request(
        &self,
        request: &AnalysisRequest,
    ) -> Result<CreateChatCompletionRequest, AnalysisError> {
        let build_err = |e: async_openai::error::OpenAIError| AnalysisError::RequestBuild(e.to_string());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_instruction.as_str())
            .build()
            .map_err(build_err)?;

        let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> =
            Vec::with_capacity(request.images.len() + 1);

        // 文本段
        content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText {
                text: request.prompt.clone(),
            },
        ));

        // 图片段
        for image in &request.images {
            content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: image.to_data_url(),
                        detail: Some(ImageDetail::High),
                    },
                },
            ));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(build_err)?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.3)
            .max_tokens(4096u32)
            .build()
            .map_err(build_err)
    }
}

#[async_trait]
impl AnalysisBackend for OpenAiBackend {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        debug!(
            "[批次 {}] 调用分析服务，模型: {}，图片数量: {}",
            request.batch_id,
            self.model_name,
            request.images.len()
        );

        let body = self.build_request(request)?;

        let mut builder = self.http.post(self.endpoint()).json(&body);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AnalysisError::HttpStatus {
                status: status.as_u16(),
                message: error_message(&raw)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string()),
            });
        }

        debug!("[批次 {}] 分析服务调用成功", request.batch_id);
        extract_content(&raw)
    }
}

/// 从响应中取出 `choices[0].message.content`
///
/// content 可能是字符串，也可能是文本段数组
fn extract_content(raw: &str) -> Result<String, AnalysisError> {
    let value: JsonValue =
        serde_json::from_str(raw).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

    let message = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| AnalysisError::MalformedResponse("缺少 choices[0].message".to_string()))?;

    let text = match message.get("content") {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::EmptyContent);
    }
    Ok(text.to_string())
}

/// 错误响应里的 `error.message`，没有时返回截断的原文
fn error_message(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }
    let parsed = serde_json::from_str::<JsonValue>(raw).ok().and_then(|v| {
        v.get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
    });
    Some(parsed.unwrap_or_else(|| truncate_text(raw.trim(), 200)))
}
