use base64::{engine::general_purpose, Engine as _};
use phf::phf_map;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 支持的图片格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Jpeg,
    Png,
    Tiff,
    Bmp,
    Dicom,
}

/// 扩展名（小写）到格式的映射
static EXTENSIONS: phf::Map<&'static str, MediaType> = phf_map! {
    "jpg" => MediaType::Jpeg,
    "jpeg" => MediaType::Jpeg,
    "png" => MediaType::Png,
    "tif" => MediaType::Tiff,
    "tiff" => MediaType::Tiff,
    "bmp" => MediaType::Bmp,
    "dcm" => MediaType::Dicom,
    "dicom" => MediaType::Dicom,
};

impl MediaType {
    /// MIME 类型
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Tiff => "image/tiff",
            MediaType::Bmp => "image/bmp",
            MediaType::Dicom => "application/dicom",
        }
    }

    /// 标准名称
    pub fn name(self) -> &'static str {
        match self {
            MediaType::Jpeg => "jpeg",
            MediaType::Png => "png",
            MediaType::Tiff => "tiff",
            MediaType::Bmp => "bmp",
            MediaType::Dicom => "dicom",
        }
    }

    /// 从扩展名解析格式（不区分大小写）
    pub fn from_extension(ext: &str) -> Option<Self> {
        EXTENSIONS.get(ext.to_ascii_lowercase().as_str()).copied()
    }

    /// 从文件名解析格式
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 一张已通过校验的图片
///
/// 只能通过 [`ImageItem::validate`] 创建，创建后不可修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageItem {
    name: String,
    media_type: MediaType,
    data: Vec<u8>,
}

impl ImageItem {
    /// 校验格式和大小后创建图片
    ///
    /// # 参数
    /// - `name`: 文件名（用于判断格式）
    /// - `data`: 原始字节
    /// - `max_bytes`: 单张图片大小上限
    pub fn validate(
        name: impl Into<String>,
        data: Vec<u8>,
        max_bytes: u64,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let media_type = MediaType::from_file_name(&name)
            .ok_or_else(|| ValidationError::UnsupportedFormat { name: name.clone() })?;

        let size = data.len() as u64;
        if size > max_bytes {
            return Err(ValidationError::ImageTooLarge {
                name,
                size,
                max: max_bytes,
            });
        }

        Ok(Self {
            name,
            media_type,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> u64 {
        self.data.len() as u64
    }

    /// 生成 `data:<mime>;base64,<payload>` 形式的 URL
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type.mime(),
            general_purpose::STANDARD.encode(&self.data)
        )
    }
}
