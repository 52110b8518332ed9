// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/cancel.rs - 取消与超时
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::{Duration, Instant},
};

use crate::error::ClassifyError;

/// 可跨线程共享的取消标志
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  cancelled: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }
}

/// 管线各阶段之间检查的取消/超时条件
///
/// 默认不取消、不超时。正在进行的前向推理不会被打断。
#[derive(Debug, Clone, Default)]
pub struct RunControl {
  cancel: Option<CancelToken>,
  deadline: Option<Instant>,
}

impl RunControl {
  pub fn with_cancel(mut self, token: CancelToken) -> Self {
    self.cancel = Some(token);
    self
  }

  /// 截止时间从调用此方法时开始计算；超出 `Instant` 表示范围时视为不限时
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.deadline = Instant::now().checked_add(timeout);
    self
  }

  pub fn with_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(deadline);
    self
  }

  pub fn check(&self) -> Result<(), ClassifyError> {
    if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
      return Err(ClassifyError::Cancelled);
    }
    if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
      return Err(ClassifyError::DeadlineExceeded);
    }
    Ok(())
  }
}
