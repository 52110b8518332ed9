// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/engine.rs - 推理引擎
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

//! 解码 → 预处理 → 推理 → 解释 的完整管线。

use std::{sync::Arc, time::Instant};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
  cancel::RunControl,
  config::{EngineConfig, ModelDescriptor, ModelMetrics},
  error::ClassifyError,
  frame::{INPUT_HEIGHT, INPUT_SHAPE, INPUT_WIDTH},
  input::ImageRef,
  interpret::{FlowerGender, interpret},
  lifecycle::{MemoryInfo, ModelManager},
  model::{ModelLoadError, RuntimeLoader},
  preprocess,
};

/// 单张图片的分类结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
  pub class_label: FlowerGender,
  pub confidence_percent: f64,
  pub raw_score: f64,
  pub is_uncertain: bool,
  pub processing_time_ms: u64,
  pub model_version: String,
  pub model_type: String,
  /// ISO-8601，UTC，毫秒精度
  pub timestamp: String,
  pub input_shape: [u32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
  pub index: usize,
  pub source_ref: String,
  pub result: Option<PredictionResult>,
  pub success: bool,
  pub error_message: Option<String>,
}

impl BatchItem {
  fn from_outcome(index: usize, source_ref: String, outcome: Result<PredictionResult, ClassifyError>) -> Self {
    match outcome {
      Ok(result) => BatchItem {
        index,
        source_ref,
        result: Some(result),
        success: true,
        error_message: None,
      },
      Err(err) => BatchItem {
        index,
        source_ref,
        result: None,
        success: false,
        error_message: Some(err.to_string()),
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
  pub is_ready: bool,
  pub is_initializing: bool,
  pub model_version: String,
  pub model_type: String,
  pub format: String,
  pub backend: String,
  pub input_shape: [u32; 3],
  pub classes: [FlowerGender; 2],
}

pub struct InferenceEngine {
  manager: Arc<ModelManager>,
  descriptor: ModelDescriptor,
  metrics: ModelMetrics,
}

impl InferenceEngine {
  pub fn new(manager: Arc<ModelManager>, descriptor: ModelDescriptor, metrics: ModelMetrics) -> Self {
    Self {
      manager,
      descriptor,
      metrics,
    }
  }

  pub fn from_config(config: EngineConfig, loader: Arc<dyn RuntimeLoader>) -> Self {
    let manager = Arc::new(ModelManager::new(config.model, loader));
    Self::new(manager, config.descriptor, config.metrics)
  }

  pub fn manager(&self) -> &Arc<ModelManager> {
    &self.manager
  }

  pub fn descriptor(&self) -> &ModelDescriptor {
    &self.descriptor
  }

  pub fn initialize(&self) -> Result<(), ModelLoadError> {
    self.manager.initialize()
  }

  pub fn warm_up(&self) -> Result<(), ClassifyError> {
    self.manager.warm_up()
  }

  pub fn dispose(&self) {
    self.manager.dispose()
  }

  pub fn reset(&self) {
    self.manager.reset()
  }

  pub fn predict_one(&self, image: &ImageRef) -> Result<PredictionResult, ClassifyError> {
    self.predict_one_with(image, &RunControl::default())
  }

  /// 各阶段之间检查 `control`；模型未就绪时不读取图片
  pub fn predict_one_with(
    &self,
    image: &ImageRef,
    control: &RunControl,
  ) -> Result<PredictionResult, ClassifyError> {
    let now = Instant::now();
    control.check()?;
    self.manager.ensure_ready()?;

    let bytes = image.read_bytes()?;
    let pixels = crate::input::decode(&bytes)?;
    debug!(
      "解码完成: {} ({}x{}, {:?})",
      image,
      pixels.width(),
      pixels.height(),
      pixels.layout()
    );
    control.check()?;

    let tensor = preprocess::prepare::<INPUT_WIDTH, INPUT_HEIGHT>(&pixels)?;
    control.check()?;

    let output = self.manager.predict(&tensor)?;
    let interpretation = interpret(output.score()?);
    let elapsed = now.elapsed();

    info!(
      "分类完成: {} -> {} ({:.2}%), 耗时: {:.2?}",
      image, interpretation.label, interpretation.confidence_percent, elapsed
    );
    if interpretation.is_uncertain {
      warn!(
        "分类结果不确定 (原始分数 {:.4})，输入可能不是苦瓜花",
        interpretation.raw_score
      );
    }

    Ok(PredictionResult {
      class_label: interpretation.label,
      confidence_percent: interpretation.confidence_percent,
      raw_score: interpretation.raw_score,
      is_uncertain: interpretation.is_uncertain,
      processing_time_ms: elapsed.as_millis() as u64,
      model_version: self.descriptor.model_version.clone(),
      model_type: self.descriptor.model_type.clone(),
      timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      input_shape: INPUT_SHAPE,
    })
  }

  pub fn predict_batch(&self, images: &[ImageRef]) -> Vec<BatchItem> {
    self.predict_batch_with(images, &RunControl::default())
  }

  /// 按输入顺序逐个处理，结果数量与输入一致；单项失败只记录在该项中
  pub fn predict_batch_with(&self, images: &[ImageRef], control: &RunControl) -> Vec<BatchItem> {
    info!("批量分类开始，共 {} 张图片", images.len());
    let items: Vec<BatchItem> = images
      .iter()
      .enumerate()
      .map(|(index, image)| {
        let outcome = self.predict_one_with(image, control);
        if let Err(err) = &outcome {
          warn!("第 {} 张图片分类失败: {}: {}", index, image, err);
        }
        BatchItem::from_outcome(index, image.source_ref(), outcome)
      })
      .collect();

    let succeeded = items.iter().filter(|item| item.success).count();
    info!("批量分类完成: {}/{} 成功", succeeded, items.len());
    items
  }

  pub fn model_info(&self) -> ModelInfo {
    ModelInfo {
      is_ready: self.manager.is_ready(),
      is_initializing: self.manager.is_initializing(),
      model_version: self.descriptor.model_version.clone(),
      model_type: self.descriptor.model_type.clone(),
      format: self.descriptor.format.clone(),
      backend: self.descriptor.backend.clone(),
      input_shape: INPUT_SHAPE,
      classes: FlowerGender::ALL,
    }
  }

  pub fn model_metrics(&self) -> &ModelMetrics {
    &self.metrics
  }

  pub fn memory_info(&self) -> Option<MemoryInfo> {
    self.manager.memory_info()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::{InputTensor, OutputTensor},
    model::{InferenceError, ModelRuntime, ModelSource},
  };

  struct ScoreLoader(f32);

  struct ScoreRuntime(f32);

  impl ModelRuntime for ScoreRuntime {
    fn run(&mut self, _input: &InputTensor) -> Result<OutputTensor, InferenceError> {
      Ok(OutputTensor::from(vec![self.0]))
    }
  }

  impl RuntimeLoader for ScoreLoader {
    fn load(&self, _blob: &[u8]) -> Result<Box<dyn ModelRuntime>, ModelLoadError> {
      Ok(Box::new(ScoreRuntime(self.0)))
    }
  }

  fn engine(score: f32) -> InferenceEngine {
    InferenceEngine::from_config(
      EngineConfig::new(ModelSource::from(vec![1u8; 8])),
      Arc::new(ScoreLoader(score)),
    )
  }

  fn png_bytes() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(16, 12, image::Rgb([90, 160, 40]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
      .write_to(&mut bytes, image::ImageFormat::Png)
      .expect("encode png");
    bytes.into_inner()
  }

  #[test]
  fn result_carries_descriptor_and_shape() {
    let engine = engine(0.95);
    engine.initialize().unwrap();

    let result = engine.predict_one(&ImageRef::from_bytes(png_bytes())).unwrap();
    assert_eq!(result.class_label, FlowerGender::Male);
    assert!((result.confidence_percent - 95.0).abs() < 1e-4);
    assert!(!result.is_uncertain);
    assert_eq!(result.model_version, "1.0.0-onnx");
    assert_eq!(result.model_type, "MobileNetV2");
    assert_eq!(result.input_shape, [224, 224, 3]);
    assert!(chrono::DateTime::parse_from_rfc3339(&result.timestamp).is_ok());
  }

  #[test]
  fn not_initialized_skips_decoding() {
    let engine = engine(0.5);
    // 损坏的字节在就绪检查之前不会被解码
    let err = engine
      .predict_one(&ImageRef::from_bytes(vec![0u8, 1, 2]))
      .unwrap_err();
    assert!(err.is_not_initialized());
  }

  #[test]
  fn result_serializes_camel_case() {
    let engine = engine(0.5);
    engine.initialize().unwrap();
    let result = engine.predict_one(&ImageRef::from_bytes(png_bytes())).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["classLabel"], "female");
    assert_eq!(json["confidencePercent"], 50.0);
    assert_eq!(json["isUncertain"], true);
    assert!(json["processingTimeMs"].is_u64());
    assert_eq!(json["inputShape"], serde_json::json!([224, 224, 3]));

    let parsed: PredictionResult = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, result);
  }

  #[test]
  fn model_info_reflects_state() {
    let engine = engine(0.2);
    let info = engine.model_info();
    assert!(!info.is_ready);
    assert!(!info.is_initializing);
    assert_eq!(info.classes, [FlowerGender::Female, FlowerGender::Male]);

    engine.initialize().unwrap();
    let json = serde_json::to_value(engine.model_info()).unwrap();
    assert_eq!(json["isReady"], true);
    assert_eq!(json["format"], "ONNX");
    assert_eq!(json["classes"], serde_json::json!(["female", "male"]));
    assert!(engine.memory_info().is_some());

    engine.reset();
    assert!(!engine.model_info().is_ready);
    assert!(engine.memory_info().is_none());
  }
}
