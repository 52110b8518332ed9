// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/bin/classify_oneshot.rs - 单张图片分类
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
  task::{OneShotTask, Task},
};
use tracing::info;

/// Kugua 单张图片分类
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub model: ModelArgs,
  /// 输入图片，普通路径或 image:// URL
  #[arg(long, value_name = "SOURCE")]
  pub input: String,
  /// 输出方式，console: 或 json:///path/to/result.json
  #[arg(long, value_name = "OUTPUT", default_value = "console:")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = ImageRef::parse(&args.input)?;
  let engine = args.model.build_engine(Arc::new(TractLoader))?;
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask.run_task(input, &engine, output)?;
  engine.dispose();

  Ok(())
}
