// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/input.rs - 图像输入与解码
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  fmt,
  path::{Path, PathBuf},
  sync::Arc,
};

use image::DynamicImage;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{PixelBuffer, PixelLayout},
};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
  #[error("I/O error reading {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("empty image data")]
  Empty,
  #[error("Image decoding error: {0}")]
  ImageError(image::ImageError),
  #[error("decoded image {0}x{1} has inconsistent pixel data")]
  Corrupt(u32, u32),
}

impl From<image::ImageError> for DecodeError {
  fn from(err: image::ImageError) -> Self {
    DecodeError::ImageError(err)
  }
}

/// 待分类的图像资源
#[derive(Debug, Clone)]
pub enum ImageRef {
  /// 文件系统中的图片
  Path(PathBuf),
  /// 内存中的压缩图像字节
  Bytes(Arc<[u8]>),
}

impl FromUrlWithScheme for ImageRef {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageRef {
  type Error = DecodeError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      Self::SCHEME | "file" => {
        let path = crate::url_file_path(url);
        Ok(ImageRef::Path(path))
      }
      other => {
        error!(
          "URI scheme mismatch: expected '{}' or 'file', found '{}'",
          Self::SCHEME,
          other
        );
        Err(DecodeError::SchemeMismatch(format!(
          "期望输入方式 '{}', 实际输入方式 '{}'",
          Self::SCHEME,
          other
        )))
      }
    }
  }
}

impl ImageRef {
  /// 解析 `image://`、`file://` URL 或普通路径
  pub fn parse(input: &str) -> Result<Self, DecodeError> {
    match Url::parse(input) {
      // 单字母方案视为 Windows 盘符
      Ok(url) if url.scheme().len() > 1 => Self::from_url(&url),
      _ => Ok(ImageRef::Path(PathBuf::from(input))),
    }
  }

  pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
    ImageRef::Bytes(bytes.into())
  }

  /// 用于日志与批处理结果的来源描述
  pub fn source_ref(&self) -> String {
    match self {
      ImageRef::Path(path) => path.display().to_string(),
      ImageRef::Bytes(bytes) => format!("<memory: {} bytes>", bytes.len()),
    }
  }

  pub fn read_bytes(&self) -> Result<Arc<[u8]>, DecodeError> {
    match self {
      ImageRef::Path(path) => std::fs::read(path)
        .map(Arc::from)
        .map_err(|source| DecodeError::IoError {
          path: path.clone(),
          source,
        }),
      ImageRef::Bytes(bytes) => Ok(Arc::clone(bytes)),
    }
  }

  pub fn decode(&self) -> Result<PixelBuffer, DecodeError> {
    decode(&self.read_bytes()?)
  }
}

impl fmt::Display for ImageRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.source_ref())
  }
}

impl From<PathBuf> for ImageRef {
  fn from(path: PathBuf) -> Self {
    ImageRef::Path(path)
  }
}

impl From<&Path> for ImageRef {
  fn from(path: &Path) -> Self {
    ImageRef::Path(path.to_path_buf())
  }
}

fn is_image_path(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      let lower = ext.to_lowercase();
      IMAGE_EXTENSIONS.contains(&lower.as_str())
    })
    .unwrap_or(false)
}

/// 展开输入：目录展开为其中按文件名排序的图片，其余按 [`ImageRef::parse`] 处理
pub fn collect_inputs(input: &str) -> Result<Vec<ImageRef>, DecodeError> {
  let path = Path::new(input);
  if !path.is_dir() {
    return Ok(vec![ImageRef::parse(input)?]);
  }

  let io_error = |source| DecodeError::IoError {
    path: path.to_path_buf(),
    source,
  };

  let mut files = Vec::new();
  for entry in std::fs::read_dir(path).map_err(io_error)? {
    let entry_path = entry.map_err(io_error)?.path();
    if entry_path.is_file() && is_image_path(&entry_path) {
      files.push(entry_path);
    }
  }
  files.sort();

  debug!("目录 {} 中找到 {} 张图片", path.display(), files.len());
  Ok(files.into_iter().map(ImageRef::Path).collect())
}

/// 将压缩图像字节解码为交错像素缓冲，格式由内容识别；带透明通道时保留为 RGBA
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, DecodeError> {
  if bytes.is_empty() {
    return Err(DecodeError::Empty);
  }

  let format = image::guess_format(bytes)?;
  let image = image::load_from_memory_with_format(bytes, format)?;
  debug!(
    "解码 {:?} 图像: {}x{}, 颜色类型 {:?}",
    format,
    image.width(),
    image.height(),
    image.color()
  );

  into_pixel_buffer(image)
}

fn into_pixel_buffer(image: DynamicImage) -> Result<PixelBuffer, DecodeError> {
  let (width, height) = (image.width(), image.height());
  let (layout, data) = if image.color().has_alpha() {
    (PixelLayout::Rgba, image.into_rgba8().into_raw())
  } else {
    (PixelLayout::Rgb, image.into_rgb8().into_raw())
  };

  PixelBuffer::new(width, height, layout, data).ok_or(DecodeError::Corrupt(width, height))
}
