// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/config.rs - 管线配置与模型描述
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

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::ModelSource;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("元数据格式错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 随模型发布的静态描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelDescriptor {
  pub model_version: String,
  pub model_type: String,
  pub format: String,
  pub backend: String,
}

impl Default for ModelDescriptor {
  fn default() -> Self {
    Self {
      model_version: "1.0.0-onnx".to_string(),
      model_type: "MobileNetV2".to_string(),
      format: "ONNX".to_string(),
      backend: "tract".to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingInfo {
  pub total_epochs: u32,
  pub batch_size: u32,
  pub train_samples: u32,
  pub val_samples: u32,
  pub test_samples: u32,
}

impl Default for TrainingInfo {
  fn default() -> Self {
    Self {
      total_epochs: 62,
      batch_size: 16,
      train_samples: 701,
      val_samples: 150,
      test_samples: 152,
    }
  }
}

/// 模型的离线评估指标，原样提供给诊断使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelMetrics {
  pub accuracy: f64,
  pub precision: f64,
  pub recall: f64,
  pub f1_score: f64,
  pub auc: f64,
  pub training_info: TrainingInfo,
}

impl Default for ModelMetrics {
  fn default() -> Self {
    Self {
      accuracy: 1.0,
      precision: 1.0,
      recall: 1.0,
      f1_score: 1.0,
      auc: 1.0,
      training_info: TrainingInfo::default(),
    }
  }
}

/// 模型旁的元数据文件，字段缺省时使用内置值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMetadata {
  #[serde(flatten)]
  pub descriptor: ModelDescriptor,
  pub metrics: ModelMetrics,
}

impl ModelMetadata {
  pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(text)?)
  }

  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("读取模型元数据: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&text)
  }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub model: ModelSource,
  pub descriptor: ModelDescriptor,
  pub metrics: ModelMetrics,
}

impl EngineConfig {
  pub fn new(model: ModelSource) -> Self {
    Self {
      model,
      descriptor: ModelDescriptor::default(),
      metrics: ModelMetrics::default(),
    }
  }

  pub fn with_metadata(mut self, metadata: ModelMetadata) -> Self {
    self.descriptor = metadata.descriptor;
    self.metrics = metadata.metrics;
    self
  }
}
