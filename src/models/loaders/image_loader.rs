use crate::config::Config;
use crate::error::{AppError, FileError, ValidationError};
use crate::models::image::{ImageItem, MediaType};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 上传校验的限制
#[derive(Debug, Clone, Copy)]
pub struct LoadLimits {
    /// 图片总数上限
    pub max_images: usize,
    /// 单张图片大小上限（字节）
    pub max_image_bytes: u64,
}

impl From<&Config> for LoadLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_images: config.max_images,
            max_image_bytes: config.max_image_bytes,
        }
    }
}

/// 读取单个文件并校验为 ImageItem
pub async fn load_image(path: &Path, limits: &LoadLimits) -> Result<ImageItem> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let data = fs::read(path)
        .await
        .with_context(|| format!("无法读取图片文件: {}", path.display()))?;

    let item = ImageItem::validate(name, data, limits.max_image_bytes)
        .map_err(AppError::from)?;
    Ok(item)
}

/// 扫描文件夹，返回格式和大小都合格的图片路径（不读取内容）
///
/// - 只扫描一层，按文件名排序，保证顺序稳定
/// - 不支持的格式、超过大小上限的文件会被跳过并记录警告
/// - 合格图片数量超过上限时直接返回校验错误
pub async fn scan_image_paths(folder_path: &Path, limits: &LoadLimits) -> Result<Vec<PathBuf>> {
    if !folder_path.is_dir() {
        return Err(AppError::from(FileError::DirectoryNotFound {
            path: folder_path.display().to_string(),
        })
        .into());
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(folder_path)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut candidates = Vec::new();
    for path in paths {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if MediaType::from_file_name(&file_name).is_none() {
            tracing::warn!("跳过不支持的文件: {}", file_name);
            continue;
        }

        let size = fs::metadata(&path).await?.len();
        if size > limits.max_image_bytes {
            tracing::warn!(
                "跳过过大的图片 {}: {} 字节 (上限 {} 字节)",
                file_name,
                size,
                limits.max_image_bytes
            );
            continue;
        }
        candidates.push(path);
    }

    if candidates.len() > limits.max_images {
        return Err(AppError::from(ValidationError::TooManyImages {
            count: candidates.len(),
            max: limits.max_images,
        })
        .into());
    }
    Ok(candidates)
}

/// 从文件夹中加载所有支持格式的图片
///
/// 先通过 [`scan_image_paths`] 完成格式、大小和数量校验，再读取文件内容
pub async fn load_images_from_dir(folder_path: &Path, limits: &LoadLimits) -> Result<Vec<ImageItem>> {
    let candidates = scan_image_paths(folder_path, limits).await?;

    let mut images = Vec::with_capacity(candidates.len());
    for path in candidates {
        match load_image(&path, limits).await {
            Ok(item) => {
                tracing::debug!("已加载: {} ({}, {} 字节)", item.name(), item.media_type(), item.byte_len());
                images.push(item);
            }
            Err(e) => {
                tracing::warn!("加载图片失败 {}: {}", path.display(), e);
            }
        }
    }

    tracing::info!("成功加载 {} 张图片", images.len());
    Ok(images)
}
