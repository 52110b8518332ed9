// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::{path::PathBuf, sync::Arc};

use clap::Args;
use tracing::info;
use url::Url;

use crate::{
  FromUrl,
  config::{EngineConfig, ModelMetadata},
  engine::InferenceEngine,
  model::{ModelSource, RuntimeLoader},
};

/// 各个命令共用的模型参数
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
  /// ONNX 模型文件，例如 model:///opt/kugua/classifier.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 模型元数据与评估指标 JSON 文件
  #[arg(long, value_name = "FILE")]
  pub metrics: Option<PathBuf>,
  /// 跳过初始化后的预热推理
  #[arg(long)]
  pub skip_warm_up: bool,
}

impl ModelArgs {
  pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
    info!("模型文件路径: {}", self.model);
    let config = EngineConfig::new(ModelSource::from_url(&self.model)?);
    match &self.metrics {
      Some(path) => Ok(config.with_metadata(ModelMetadata::from_json_file(path)?)),
      None => Ok(config),
    }
  }

  /// 构建引擎并完成初始化与预热
  pub fn build_engine(&self, loader: Arc<dyn RuntimeLoader>) -> anyhow::Result<InferenceEngine> {
    let engine = InferenceEngine::from_config(self.engine_config()?, loader);
    engine.initialize()?;
    if !self.skip_warm_up {
      engine.warm_up()?;
    }
    Ok(engine)
  }
}
