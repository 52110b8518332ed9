// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/bin/classify_batch.rs - 批量图片分类
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

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use url::Url;

use kugua::{
  FromUrl,
  args::ModelArgs,
  input::collect_inputs,
  model::TractLoader,
  output::OutputWrapper,
  task::{BatchTask, Task},
};
use tracing::info;

/// Kugua 批量图片分类
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub model: ModelArgs,
  /// 输入图片或目录，可重复指定
  #[arg(long, value_name = "SOURCE", required = true)]
  pub input: Vec<String>,
  /// 输出方式，console: 或 json:///path/to/results.json
  #[arg(long, value_name = "OUTPUT", default_value = "console:")]
  pub output: Url,
  /// 整批超时秒数，超时后剩余图片记为失败
  #[arg(long, value_name = "SECONDS")]
  pub timeout: Option<u64>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let mut inputs = Vec::new();
  for source in &args.input {
    inputs.extend(collect_inputs(source)?);
  }
  info!("输入图片数量: {}", inputs.len());
  info!("输出路径: {}", args.output);

  let engine = args.model.build_engine(Arc::new(TractLoader))?;
  let output = OutputWrapper::from_url(&args.output)?;

  BatchTask::default()
    .with_timeout(args.timeout.map(Duration::from_secs))
    .with_interrupt_handler(true)
    .run_task(inputs, &engine, output)?;
  engine.dispose();

  Ok(())
}
