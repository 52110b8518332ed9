// 该文件是 Kugua （苦瓜花） 项目的一部分。
// tests/common/mod.rs - 集成测试共用工具
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

#![allow(dead_code)]

use std::{
  io::Cursor,
  path::PathBuf,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  thread,
  time::Duration,
};

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use kugua::{
  config::EngineConfig,
  engine::InferenceEngine,
  frame::{InputTensor, OutputTensor},
  model::{InferenceError, ModelLoadError, ModelRuntime, ModelSource, RuntimeLoader},
};

/// 共享计数器，测试结束后检查加载与并发情况
#[derive(Debug, Default)]
pub struct Probe {
  pub loads: AtomicUsize,
  pub runs: AtomicUsize,
  pub active: AtomicUsize,
  pub max_active: AtomicUsize,
}

impl Probe {
  pub fn loads(&self) -> usize {
    self.loads.load(Ordering::SeqCst)
  }

  pub fn runs(&self) -> usize {
    self.runs.load(Ordering::SeqCst)
  }

  pub fn max_active(&self) -> usize {
    self.max_active.load(Ordering::SeqCst)
  }
}

/// 分数为输入张量均值的假模型：白图判为雄花，黑图判为雌花
#[derive(Debug, Clone, Default)]
pub struct FakeLoader {
  pub probe: Arc<Probe>,
  pub load_delay: Duration,
  pub run_delay: Duration,
  pub fail: bool,
}

impl FakeLoader {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_load_delay(mut self, delay: Duration) -> Self {
    self.load_delay = delay;
    self
  }

  pub fn with_run_delay(mut self, delay: Duration) -> Self {
    self.run_delay = delay;
    self
  }

  pub fn failing(mut self) -> Self {
    self.fail = true;
    self
  }
}

impl RuntimeLoader for FakeLoader {
  fn load(&self, _blob: &[u8]) -> Result<Box<dyn ModelRuntime>, ModelLoadError> {
    self.probe.loads.fetch_add(1, Ordering::SeqCst);
    thread::sleep(self.load_delay);
    if self.fail {
      return Err(ModelLoadError::Rejected("unsupported operator set".to_string()));
    }
    Ok(Box::new(MeanRuntime {
      probe: Arc::clone(&self.probe),
      delay: self.run_delay,
    }))
  }
}

struct MeanRuntime {
  probe: Arc<Probe>,
  delay: Duration,
}

impl ModelRuntime for MeanRuntime {
  fn run(&mut self, input: &InputTensor) -> Result<OutputTensor, InferenceError> {
    let active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
    self.probe.max_active.fetch_max(active, Ordering::SeqCst);
    thread::sleep(self.delay);

    let values = input.as_slice();
    let mean = values.iter().sum::<f32>() / values.len() as f32;

    self.probe.runs.fetch_add(1, Ordering::SeqCst);
    self.probe.active.fetch_sub(1, Ordering::SeqCst);
    Ok(OutputTensor::from(vec![mean]))
  }
}

pub fn engine_with(loader: FakeLoader) -> InferenceEngine {
  InferenceEngine::from_config(
    EngineConfig::new(ModelSource::from(vec![0x4f; 64])),
    Arc::new(loader),
  )
}

pub fn png_bytes(width: u32, height: u32, value: u8) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, Rgb([value, value, value]));
  let mut bytes = Cursor::new(Vec::new());
  image
    .write_to(&mut bytes, ImageFormat::Png)
    .expect("encode png");
  bytes.into_inner()
}

pub fn rgba_png_bytes(width: u32, height: u32, value: u8) -> Vec<u8> {
  let image = RgbaImage::from_pixel(width, height, Rgba([value, value, value, 40]));
  let mut bytes = Cursor::new(Vec::new());
  image
    .write_to(&mut bytes, ImageFormat::Png)
    .expect("encode png");
  bytes.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32, value: u8) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, Rgb([value, value, value]));
  let mut bytes = Cursor::new(Vec::new());
  image
    .write_to(&mut bytes, ImageFormat::Jpeg)
    .expect("encode jpeg");
  bytes.into_inner()
}

/// 真实模型仅在本地存在时参与测试
pub fn find_model_path() -> Option<PathBuf> {
  let candidates = vec![
    "models/ampalaya_classifier.onnx",
    "../models/ampalaya_classifier.onnx",
  ];
  candidates
    .into_iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}
