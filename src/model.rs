// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/model.rs - 模型运行时
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

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{InputTensor, OutputTensor},
};

/// 已加载模型的前向推理
///
/// 实现不要求可重入，调用方负责串行化。
pub trait ModelRuntime: Send {
  fn run(&mut self, input: &InputTensor) -> Result<OutputTensor, InferenceError>;
}

/// 从模型字节构造运行时
pub trait RuntimeLoader: Send + Sync {
  fn load(&self, blob: &[u8]) -> Result<Box<dyn ModelRuntime>, ModelLoadError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelLoadError {
  #[error("模型文件不存在: {0}")]
  Missing(PathBuf),
  #[error("模型文件读取失败: {path}, 错误: {message}")]
  Unreadable { path: PathBuf, message: String },
  #[error("模型数据为空")]
  Empty,
  #[error("模型无效: {0}")]
  Rejected(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
  #[error("模型执行失败: {0}")]
  Runtime(String),
  #[error("输出形状错误: 期望 {expected} 个值, 实际 {actual} 个")]
  OutputShape { expected: usize, actual: usize },
  #[error("模型输出非有限值: {0}")]
  NonFinite(f32),
}

impl OutputTensor {
  /// 单输出 sigmoid 分类器的分数
  pub fn score(&self) -> Result<f32, InferenceError> {
    match self.as_slice() {
      [score] if score.is_finite() => Ok(*score),
      [score] => Err(InferenceError::NonFinite(*score)),
      other => Err(InferenceError::OutputShape {
        expected: 1,
        actual: other.len(),
      }),
    }
  }
}

/// 模型来源，在构造管线前确定
#[derive(Clone)]
pub enum ModelSource {
  Path(PathBuf),
  Bytes(Arc<[u8]>),
}

impl fmt::Debug for ModelSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ModelSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
      ModelSource::Bytes(bytes) => write!(f, "Bytes(<{} bytes>)", bytes.len()),
    }
  }
}

impl fmt::Display for ModelSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ModelSource::Path(path) => write!(f, "{}", path.display()),
      ModelSource::Bytes(bytes) => write!(f, "<memory: {} bytes>", bytes.len()),
    }
  }
}

impl FromUrlWithScheme for ModelSource {
  const SCHEME: &'static str = "model";
}

impl FromUrl for ModelSource {
  type Error = ModelLoadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME && url.scheme() != "file" {
      return Err(ModelLoadError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let path = crate::url_file_path(url);
    Ok(ModelSource::Path(path))
  }
}

impl From<&Path> for ModelSource {
  fn from(path: &Path) -> Self {
    ModelSource::Path(path.to_path_buf())
  }
}

impl From<Vec<u8>> for ModelSource {
  fn from(bytes: Vec<u8>) -> Self {
    ModelSource::Bytes(bytes.into())
  }
}

impl ModelSource {
  /// 读取模型字节
  pub fn read(&self) -> Result<Arc<[u8]>, ModelLoadError> {
    let blob: Arc<[u8]> = match self {
      ModelSource::Path(path) => {
        if !path.exists() {
          return Err(ModelLoadError::Missing(path.clone()));
        }
        info!("加载模型文件: {}", path.display());
        std::fs::read(path)
          .map_err(|e| ModelLoadError::Unreadable {
            path: path.clone(),
            message: e.to_string(),
          })?
          .into()
      }
      ModelSource::Bytes(bytes) => Arc::clone(bytes),
    };

    if blob.is_empty() {
      return Err(ModelLoadError::Empty);
    }

    debug!(
      "模型文件大小: {:.2} MB",
      blob.len() as f64 / (1024.0 * 1024.0)
    );
    Ok(blob)
  }
}

#[cfg(feature = "model_tract")]
mod tract;
#[cfg(feature = "model_tract")]
pub use self::tract::{TractLoader, TractRuntime};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn score_requires_single_finite_value() {
    assert_eq!(OutputTensor::from(vec![0.25]).score(), Ok(0.25));
    assert_eq!(
      OutputTensor::from(vec![0.1, 0.9]).score(),
      Err(InferenceError::OutputShape {
        expected: 1,
        actual: 2
      })
    );
    assert!(matches!(
      OutputTensor::from(vec![f32::NAN]).score(),
      Err(InferenceError::NonFinite(_))
    ));
    assert!(OutputTensor::from(Vec::new()).score().is_err());
  }

  #[test]
  fn missing_model_file_fails() {
    let source = ModelSource::Path(PathBuf::from("missing-kugua.onnx"));
    assert_eq!(
      source.read().unwrap_err(),
      ModelLoadError::Missing(PathBuf::from("missing-kugua.onnx"))
    );
  }

  #[test]
  fn empty_blob_is_rejected() {
    let source = ModelSource::from(Vec::new());
    assert_eq!(source.read().unwrap_err(), ModelLoadError::Empty);
  }

  #[test]
  fn model_source_from_url() {
    let url = Url::parse("model:///opt/kugua/classifier.onnx").unwrap();
    match ModelSource::from_url(&url).unwrap() {
      ModelSource::Path(path) => assert_eq!(path, PathBuf::from("/opt/kugua/classifier.onnx")),
      other => panic!("unexpected source: {other:?}"),
    }

    let url = Url::parse("onnx:///opt/kugua/classifier.onnx").unwrap();
    assert!(matches!(
      ModelSource::from_url(&url),
      Err(ModelLoadError::ModelPathError(_))
    ));
  }
}
