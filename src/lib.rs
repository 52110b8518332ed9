// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod args;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod input;
pub mod interpret;
pub mod lifecycle;
pub mod model;
pub mod output;
pub mod preprocess;
pub mod task;

pub use self::{
  cancel::{CancelToken, RunControl},
  engine::{BatchItem, InferenceEngine, ModelInfo, PredictionResult},
  error::ClassifyError,
  input::ImageRef,
  interpret::FlowerGender,
  lifecycle::{LifecycleState, ModelManager},
};

/// URL 路径转为文件路径，百分号编码按 UTF-8 解码
pub(crate) fn url_file_path(url: &url::Url) -> std::path::PathBuf {
  url.to_file_path().unwrap_or_else(|_| {
    let path = url.path();
    std::path::PathBuf::from(
      urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| path.to_string()),
    )
  })
}

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;

  #[test]
  fn url_paths_are_percent_decoded() {
    let url = url::Url::parse("json:///tmp/my results/结果.json").unwrap();
    assert_eq!(url_file_path(&url), Path::new("/tmp/my results/结果.json"));

    let url = url::Url::parse("model:///opt/kugua/classifier%20v2.onnx").unwrap();
    assert_eq!(url_file_path(&url), Path::new("/opt/kugua/classifier v2.onnx"));
  }
}
