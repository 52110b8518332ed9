// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/frame.rs - 像素缓冲与 NHWC 张量定义
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

pub const RGB_CHANNELS: usize = 3;

/// 模型输入宽度
pub const INPUT_WIDTH: u32 = 224;
/// 模型输入高度
pub const INPUT_HEIGHT: u32 = 224;
/// 模型输入形状 `[H, W, C]`
pub const INPUT_SHAPE: [u32; 3] = [INPUT_HEIGHT, INPUT_WIDTH, RGB_CHANNELS as u32];

/// 分类模型的输入张量
pub type InputTensor = NhwcTensor<INPUT_WIDTH, INPUT_HEIGHT>;

/// 交错像素排列方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
  Rgb,
  Rgba,
}

impl PixelLayout {
  pub fn channels(&self) -> usize {
    match self {
      PixelLayout::Rgb => 3,
      PixelLayout::Rgba => 4,
    }
  }
}

/// 解码后的交错像素缓冲，按行优先存放
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
  width: u32,
  height: u32,
  layout: PixelLayout,
  data: Box<[u8]>,
}

impl PixelBuffer {
  /// 数据长度与宽高、通道数不符时返回 `None`
  pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Option<Self> {
    let expected = (width as usize) * (height as usize) * layout.channels();
    if data.len() != expected {
      return None;
    }

    Some(Self {
      width,
      height,
      layout,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn layout(&self) -> PixelLayout {
    self.layout
  }

  pub fn channels(&self) -> usize {
    self.layout.channels()
  }

  pub fn pixel_count(&self) -> usize {
    (self.width as usize) * (self.height as usize)
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }
}

/// 固定形状 `[H, W, 3]` 的浮点张量，长度在构造时校验
#[derive(Debug, Clone, PartialEq)]
pub struct NhwcTensor<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> NhwcTensor<W, H> {
  pub const LEN: usize = RGB_CHANNELS * W as usize * H as usize;

  /// 所有元素均为 `value` 的张量
  pub fn filled(value: f32) -> Self {
    Self {
      data: vec![value; Self::LEN].into_boxed_slice(),
    }
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 含 batch 维的形状 `[1, H, W, C]`
  pub fn batch_shape(&self) -> [usize; 4] {
    [1, H as usize, W as usize, RGB_CHANNELS]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

impl<const W: u32, const H: u32> Default for NhwcTensor<W, H> {
  fn default() -> Self {
    Self::filled(0.0)
  }
}

impl<const W: u32, const H: u32> TryFrom<Vec<f32>> for NhwcTensor<W, H> {
  /// 长度不符时原样交还数据
  type Error = Vec<f32>;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    if data.len() != Self::LEN {
      return Err(data);
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

/// 模型输出张量
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  data: Box<[f32]>,
}

impl OutputTensor {
  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

impl From<Vec<f32>> for OutputTensor {
  fn from(data: Vec<f32>) -> Self {
    Self {
      data: data.into_boxed_slice(),
    }
  }
}
