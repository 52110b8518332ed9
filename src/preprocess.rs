// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/preprocess.rs - 缩放与归一化
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

//! 将解码后的像素缓冲变换为模型输入张量。
//!
//! 缩放使用 `image` 的三角（双线性）滤波，结果是确定的；
//! 精确像素值不是契约的一部分，契约只有张量形状与取值范围。

use image::{
  ImageBuffer, Pixel, Rgb, Rgba,
  imageops::{self, FilterType},
};
use thiserror::Error;
use tracing::debug;

use crate::frame::{NhwcTensor, PixelBuffer, PixelLayout, RGB_CHANNELS};

const RESIZE_FILTER: FilterType = FilterType::Triangle;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PreprocessError {
  #[error("像素缓冲为空")]
  EmptyBuffer,
  #[error("无效的目标尺寸 {0}x{1}")]
  InvalidTarget(u32, u32),
  #[error("尺寸不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
  #[error("张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  TensorLength { expected: usize, actual: usize },
  #[error("像素数据与 {0:?} 排列不一致")]
  LayoutMismatch(PixelLayout),
}

/// 将像素缓冲缩放至恰好 `width * height` 个像素，保持原有通道排列
pub fn resize(buffer: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer, PreprocessError> {
  if width == 0 || height == 0 {
    return Err(PreprocessError::InvalidTarget(width, height));
  }
  if buffer.is_empty() || buffer.pixel_count() == 0 {
    return Err(PreprocessError::EmptyBuffer);
  }
  if (buffer.width(), buffer.height()) == (width, height) {
    return Ok(buffer.clone());
  }

  debug!(
    "缩放图像 {}x{} -> {}x{}",
    buffer.width(),
    buffer.height(),
    width,
    height
  );

  let data = match buffer.layout() {
    PixelLayout::Rgb => resize_as::<Rgb<u8>>(buffer, width, height)?,
    PixelLayout::Rgba => resize_as::<Rgba<u8>>(buffer, width, height)?,
  };

  PixelBuffer::new(width, height, buffer.layout(), data)
    .ok_or(PreprocessError::LayoutMismatch(buffer.layout()))
}

fn resize_as<P>(buffer: &PixelBuffer, width: u32, height: u32) -> Result<Vec<u8>, PreprocessError>
where
  P: Pixel<Subpixel = u8> + 'static,
{
  let view = ImageBuffer::<P, &[u8]>::from_raw(buffer.width(), buffer.height(), buffer.as_bytes())
    .ok_or(PreprocessError::LayoutMismatch(buffer.layout()))?;

  Ok(imageops::resize(&view, width, height, RESIZE_FILTER).into_raw())
}

/// 丢弃透明通道，按 `v / 255.0` 归一化，并按 `[H, W, C]` 行优先 R,G,B 排列
pub fn normalize<const W: u32, const H: u32>(
  buffer: &PixelBuffer,
) -> Result<NhwcTensor<W, H>, PreprocessError> {
  if (buffer.width(), buffer.height()) != (W, H) {
    return Err(PreprocessError::ShapeMismatch {
      expected: (W, H),
      actual: (buffer.width(), buffer.height()),
    });
  }

  let channels = buffer.channels();
  let bytes = buffer.as_bytes();
  if bytes.len() != buffer.pixel_count() * channels {
    return Err(PreprocessError::LayoutMismatch(buffer.layout()));
  }

  let mut values = Vec::with_capacity(buffer.pixel_count() * RGB_CHANNELS);
  for pixel in bytes.chunks_exact(channels) {
    values.extend(pixel[..RGB_CHANNELS].iter().map(|&v| f32::from(v) / 255.0));
  }

  NhwcTensor::try_from(values).map_err(|values| PreprocessError::TensorLength {
    expected: NhwcTensor::<W, H>::LEN,
    actual: values.len(),
  })
}

/// 缩放并归一化为模型输入尺寸
pub fn prepare<const W: u32, const H: u32>(
  buffer: &PixelBuffer,
) -> Result<NhwcTensor<W, H>, PreprocessError> {
  let resized = resize(buffer, W, H)?;
  normalize(&resized)
}
