// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/error.rs - 管线错误分类
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

use thiserror::Error;

use crate::{
  input::DecodeError,
  model::{InferenceError, ModelLoadError},
  preprocess::PreprocessError,
};

/// 分类管线中任一阶段的错误，保留原始类型
#[derive(Error, Debug)]
pub enum ClassifyError {
  #[error("图像解码错误: {0}")]
  Decode(#[from] DecodeError),
  #[error("预处理错误: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("模型加载错误: {0}")]
  ModelLoad(#[from] ModelLoadError),
  #[error("Model not initialized. Call initialize() first.")]
  NotInitialized,
  #[error("推理错误: {0}")]
  Inference(#[from] InferenceError),
  #[error("操作已取消")]
  Cancelled,
  #[error("操作超时")]
  DeadlineExceeded,
}

impl ClassifyError {
  pub fn is_not_initialized(&self) -> bool {
    matches!(self, ClassifyError::NotInitialized)
  }
}
