use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use phf::phf_map;
use std::path::Path;

/// 扩展名 → MIME 类型
static IMAGE_MIME_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "jpg" => "image/jpeg",
    "jpeg" => "image/jpeg",
    "png" => "image/png",
};

/// 根据文件扩展名判断 MIME 类型（不区分大小写），不支持的格式返回 None
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_MIME_TYPES.get(ext.as_str()).copied()
}

/// 发送给模型的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: &'static str, data: Vec<u8>) -> Self {
        Self { mime_type, data }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:image/jpeg;base64,...` 形式，用于 OpenAI 兼容接口和 HTML 内嵌
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}
