// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/output.rs - 输出定义
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

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  engine::{BatchItem, PredictionResult},
};

pub trait Render<Output: ?Sized>: Sized {
  type Error;
  fn render_result(&self, result: &Output) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误: {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

fn scheme_mismatch(expected: &str, url: &Url) -> OutputError {
  OutputError::SchemeMismatch(format!(
    "期望输出方式 '{}', 实际输出方式 '{}'",
    expected,
    url.scheme()
  ))
}

/// 通过日志输出结果
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOutput;

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(scheme_mismatch(Self::SCHEME, url));
    }
    Ok(ConsoleOutput)
  }
}

impl Render<PredictionResult> for ConsoleOutput {
  type Error = OutputError;

  fn render_result(&self, result: &PredictionResult) -> Result<(), Self::Error> {
    info!(
      "结果: {} 置信度 {:.2}% 原始分数 {:.4} 耗时 {} ms",
      result.class_label, result.confidence_percent, result.raw_score, result.processing_time_ms
    );
    if result.is_uncertain {
      warn!("结果不确定，请确认图片内容为苦瓜花");
    }
    Ok(())
  }
}

impl Render<[BatchItem]> for ConsoleOutput {
  type Error = OutputError;

  fn render_result(&self, items: &[BatchItem]) -> Result<(), Self::Error> {
    for item in items {
      match (&item.result, &item.error_message) {
        (Some(result), _) => info!(
          "[{}] {}: {} ({:.2}%{})",
          item.index,
          item.source_ref,
          result.class_label,
          result.confidence_percent,
          if result.is_uncertain { ", 不确定" } else { "" }
        ),
        (None, message) => warn!(
          "[{}] {}: 失败: {}",
          item.index,
          item.source_ref,
          message.as_deref().unwrap_or("未知错误")
        ),
      }
    }
    Ok(())
  }
}

/// 以 JSON 格式写入文件，`json:///path/to/result.json`
#[derive(Debug, Clone)]
pub struct JsonFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(scheme_mismatch(Self::SCHEME, url));
    }
    Ok(JsonFileOutput {
      path: crate::url_file_path(url),
    })
  }
}

impl JsonFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), OutputError> {
    let io_error = |source| OutputError::IoError {
      path: self.path.clone(),
      source,
    };

    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(&self.path, text).map_err(io_error)?;
    info!("结果已写入: {}", self.path.display());
    Ok(())
  }
}

impl<T: Serialize + ?Sized> Render<T> for JsonFileOutput {
  type Error = OutputError;

  fn render_result(&self, result: &T) -> Result<(), Self::Error> {
    self.write_json(result)
  }
}

pub enum OutputWrapper {
  ConsoleOutput(ConsoleOutput),
  JsonFileOutput(JsonFileOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ConsoleOutput::SCHEME => Ok(OutputWrapper::ConsoleOutput(ConsoleOutput::from_url(url)?)),
      JsonFileOutput::SCHEME => Ok(OutputWrapper::JsonFileOutput(JsonFileOutput::from_url(url)?)),
      _ => Err(scheme_mismatch("console' 或 'json", url)),
    }
  }
}

impl Render<PredictionResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, result: &PredictionResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::ConsoleOutput(output) => output.render_result(result),
      OutputWrapper::JsonFileOutput(output) => output.render_result(result),
    }
  }
}

impl Render<[BatchItem]> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, items: &[BatchItem]) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::ConsoleOutput(output) => output.render_result(items),
      OutputWrapper::JsonFileOutput(output) => output.render_result(items),
    }
  }
}
