use std::fmt;
use std::path::Path;

use axum::body::Bytes;
use thiserror::Error;

/// 单张图片的大小上限：5MiB
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// 允许上传的图片编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// 文件选择框可接受的扩展名
    pub const EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png"];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    /// 根据文件头判断实际编码
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(JPEG_MAGIC) {
            Some(Self::Jpeg)
        } else if data.starts_with(PNG_MAGIC) {
            Some(Self::Png)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("{name}: the uploaded file is empty")]
    Empty { name: String },
    #[error("{name}: unsupported image format, expected one of jpg, jpeg, png")]
    UnsupportedFormat { name: String },
    #[error("{name}: declared as {declared} but the content is not a valid {declared} image")]
    FormatMismatch { name: String, declared: ImageFormat },
    #[error("{name}: image is {size} bytes, the limit is {limit} bytes")]
    TooLarge { name: String, size: usize, limit: usize },
    /// 请求体超过上限，无法得知具体是哪张图片
    #[error("the upload is larger than the limit of {limit} bytes")]
    RequestTooLarge { limit: usize },
    #[error("the upload could not be read: {0}")]
    Unreadable(String),
}

/// 上传的图片，只在一次请求内存活
#[derive(Clone)]
pub struct ImagePayload {
    name: String,
    format: ImageFormat,
    data: Bytes,
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

impl ImagePayload {
    /// 校验上传内容并构造图片
    ///
    /// 声明的编码优先取自文件扩展名，其次取自 content type，且必须与文件头一致。
    pub fn new(
        name: impl Into<String>,
        content_type: Option<&str>,
        data: Bytes,
    ) -> Result<Self, UploadError> {
        let name = name.into();
        if data.is_empty() {
            return Err(UploadError::Empty { name });
        }
        if data.len() > MAX_IMAGE_BYTES {
            return Err(UploadError::TooLarge { name, size: data.len(), limit: MAX_IMAGE_BYTES });
        }

        let declared = Path::new(&name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .or_else(|| content_type.and_then(ImageFormat::from_mime));
        let Some(declared) = declared else {
            return Err(UploadError::UnsupportedFormat { name });
        };
        if ImageFormat::sniff(&data) != Some(declared) {
            return Err(UploadError::FormatMismatch { name, declared });
        }

        Ok(Self { name, format: declared, data })
    }

    /// 从本地文件读取图片
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, None, Bytes::from(data))?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg() -> Bytes {
        Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
    }

    fn png() -> Bytes {
        Bytes::from_static(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00])
    }

    #[test]
    fn test_accepts_allowed_formats() {
        let img = ImagePayload::new("a.JPG", None, jpeg()).unwrap();
        assert_eq!(img.format(), ImageFormat::Jpeg);
        let img = ImagePayload::new("b.jpeg", None, jpeg()).unwrap();
        assert_eq!(img.format(), ImageFormat::Jpeg);
        let img = ImagePayload::new("c.png", None, png()).unwrap();
        assert_eq!(img.format(), ImageFormat::Png);
        assert_eq!(img.len(), 9);
    }

    #[test]
    fn test_falls_back_to_content_type() {
        let img = ImagePayload::new("blob", Some("image/png"), png()).unwrap();
        assert_eq!(img.format(), ImageFormat::Png);
    }

    #[test]
    fn test_rejects_empty() {
        let err = ImagePayload::new("a.jpg", None, Bytes::new()).unwrap_err();
        assert_eq!(err, UploadError::Empty { name: "a.jpg".into() });
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let err = ImagePayload::new("a.gif", Some("image/gif"), jpeg()).unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_rejects_mismatched_content() {
        let err = ImagePayload::new("a.png", None, jpeg()).unwrap_err();
        assert_eq!(err, UploadError::FormatMismatch { name: "a.png".into(), declared: ImageFormat::Png });
    }

    #[test]
    fn test_rejects_oversized() {
        let mut data = jpeg().to_vec();
        data.resize(MAX_IMAGE_BYTES + 1, 0);
        let err = ImagePayload::new("big.jpg", None, Bytes::from(data)).unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { size, .. } if size == MAX_IMAGE_BYTES + 1));
    }
}
