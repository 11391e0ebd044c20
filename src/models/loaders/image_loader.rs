use crate::models::image::{mime_type_for, ImagePayload};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 读取图片文件，MIME 类型由扩展名决定
pub async fn load_image(image_path: &Path) -> Result<ImagePayload> {
    let mime_type = mime_type_for(image_path)
        .with_context(|| format!("不支持的图片格式: {}", image_path.display()))?;

    let data = fs::read(image_path)
        .await
        .with_context(|| format!("无法读取图片: {}", image_path.display()))?;

    Ok(ImagePayload::new(mime_type, data))
}

/// 列出文件夹中所有 jpg / jpeg / png 图片，按文件名排序
pub async fn list_images(folder_path: &Path) -> Result<Vec<PathBuf>> {
    if !folder_path.is_dir() {
        anyhow::bail!("文件夹不存在: {}", folder_path.display());
    }

    let mut images = Vec::new();
    let mut entries = fs::read_dir(folder_path)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && mime_type_for(&path).is_some() {
            images.push(path);
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    tracing::debug!("在 {} 中找到 {} 张图片", folder_path.display(), images.len());

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["D5_2.jpg", "D3_1.JPEG", "notes.txt", "D5_10.png", "a.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let images = list_images(dir.path()).await.unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["D3_1.JPEG", "D5_10.png", "D5_2.jpg"]);
    }

    #[tokio::test]
    async fn test_list_images_missing_dir() {
        assert!(list_images(Path::new("/definitely/not/here")).await.is_err());
    }

    #[tokio::test]
    async fn test_load_image_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.tiff");
        std::fs::write(&path, b"x").unwrap();
        assert!(load_image(&path).await.is_err());
    }
}
