// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/task.rs - 分类任务
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

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::{
  cancel::{CancelToken, RunControl},
  engine::{BatchItem, InferenceEngine, PredictionResult},
  input::ImageRef,
  output::Render,
};

pub trait Task<I, O>: Sized {
  type Error;
  fn run_task(self, input: I, engine: &InferenceEngine, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<RE, O> Task<ImageRef, O> for OneShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  O: Render<PredictionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: ImageRef, engine: &InferenceEngine, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let now = Instant::now();
    let result = engine.predict_one(&input)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 批量分类，Ctrl-C 取消尚未开始的图片
#[derive(Debug, Default)]
pub struct BatchTask {
  timeout: Option<Duration>,
  handle_interrupt: bool,
}

impl BatchTask {
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_interrupt_handler(mut self, enabled: bool) -> Self {
    self.handle_interrupt = enabled;
    self
  }

  fn run_control(&self) -> Result<RunControl, ctrlc::Error> {
    let mut control = RunControl::default();
    if self.handle_interrupt {
      let token = CancelToken::new();
      let handler_token = token.clone();
      ctrlc::set_handler(move || {
        info!("收到中断信号，取消剩余图片...");
        handler_token.cancel();
      })?;
      control = control.with_cancel(token);
    }
    if let Some(timeout) = self.timeout {
      control = control.with_timeout(timeout);
    }
    Ok(control)
  }
}

impl<RE, O> Task<Vec<ImageRef>, O> for BatchTask
where
  RE: std::error::Error + Sync + Send + 'static,
  O: Render<[BatchItem], Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: Vec<ImageRef>,
    engine: &InferenceEngine,
    output: O,
  ) -> Result<(), Self::Error> {
    if input.is_empty() {
      return Err(anyhow::anyhow!("没有输入图片"));
    }

    info!("开始任务，共 {} 张图片...", input.len());
    let control = self.run_control()?;
    let now = Instant::now();
    let items = engine.predict_batch_with(&input, &control);
    info!("批量推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(items.as_slice())?;

    Ok(())
  }
}

/// 重复推理同一张图片，统计平均耗时（跳过前两次）
#[derive(Debug)]
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 100 }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }
}

impl<RE, O> Task<ImageRef, O> for RepeatShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  O: Render<PredictionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: ImageRef, engine: &InferenceEngine, output: O) -> Result<(), Self::Error> {
    if self.times <= 2 {
      return Err(anyhow::anyhow!("重复次数必须大于 2，实际为 {}", self.times));
    }

    info!("开始任务...");
    let mut times = Vec::with_capacity(self.times);
    let mut last = None;
    for i in 0..self.times {
      let now = Instant::now();
      let result = engine.predict_one(&input)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
      last = Some(result);
    }

    warn!(
      "平均推理时间: {:.2?}",
      times.iter().skip(2).sum::<Duration>() / (times.len() - 2) as u32
    );

    if let Some(result) = last {
      output.render_result(&result)?;
    }
    Ok(())
  }
}
