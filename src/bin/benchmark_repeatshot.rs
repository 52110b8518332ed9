// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理测速
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

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use url::Url;

use kugua::{
  FromUrl, ImageRef,
  args::ModelArgs,
  model::TractLoader,
  output::OutputWrapper,
  task::{RepeatShotTask, Task},
};
use tracing::info;

/// Kugua 推理测速
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub model: ModelArgs,
  /// 输入图片
  #[arg(long, value_name = "SOURCE")]
  pub input: String,
  /// 输出方式
  #[arg(long, value_name = "OUTPUT", default_value = "console:")]
  pub output: Url,
  /// 重复次数
  #[arg(long, default_value = "100", value_name = "COUNT")]
  pub times: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("重复次数: {}", args.times);

  let input = ImageRef::parse(&args.input)?;
  let engine = args.model.build_engine(Arc::new(TractLoader))?;
  let output = OutputWrapper::from_url(&args.output)?;

  RepeatShotTask::default()
    .with_times(args.times)
    .run_task(input, &engine, output)?;

  let info = engine.model_info();
  info!(
    "模型: {} {} ({} / {})",
    info.model_type, info.model_version, info.format, info.backend
  );
  if let Some(memory) = engine.memory_info() {
    info!("模型大小: {} 字节, 加载于 {}", memory.model_bytes, memory.loaded_at);
  }

  Ok(())
}
