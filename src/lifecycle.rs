// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/lifecycle.rs - 模型生命周期管理
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

//! 唯一模型实例的持有者。
//!
//! 状态机为 `Uninitialized -> Initializing -> Ready`，`dispose()` 回到
//! `Uninitialized`。并发的 `initialize()` 共享同一次加载；初始化期间的
//! `predict()` 等待加载结束。推理期间持有状态锁，所有推理调用串行执行。
//!
//! 等待中的 `initialize()` 不会自行发起新的加载：醒来时若已 `Ready` 返回
//! `Ok`，否则返回最近一次完成的加载结果（加载成功后被 `dispose()` 时也是
//! `Ok`）。

use std::{
  sync::{
    Arc,
    atomic::{AtomicU8, AtomicU64, Ordering},
  },
  time::Instant,
};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
  error::ClassifyError,
  frame::{InputTensor, OutputTensor},
  model::{ModelLoadError, ModelRuntime, ModelSource, RuntimeLoader},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
  Uninitialized,
  Initializing,
  Ready,
}

impl LifecycleState {
  fn as_u8(self) -> u8 {
    match self {
      LifecycleState::Uninitialized => 0,
      LifecycleState::Initializing => 1,
      LifecycleState::Ready => 2,
    }
  }

  fn from_u8(value: u8) -> Self {
    match value {
      1 => LifecycleState::Initializing,
      2 => LifecycleState::Ready,
      _ => LifecycleState::Uninitialized,
    }
  }
}

/// 已加载的模型资源，仅在 `Ready` 状态下存在
pub struct ModelHandle {
  runtime: Box<dyn ModelRuntime>,
  blob_bytes: usize,
  loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
  pub model_bytes: usize,
  pub loaded_at: String,
}

enum Slot {
  Empty,
  Loading,
  Loaded(ModelHandle),
}

impl Slot {
  fn state(&self) -> LifecycleState {
    match self {
      Slot::Empty => LifecycleState::Uninitialized,
      Slot::Loading => LifecycleState::Initializing,
      Slot::Loaded(_) => LifecycleState::Ready,
    }
  }
}

struct Inner {
  slot: Slot,
  attempt: u64,
  last_outcome: Option<Result<(), ModelLoadError>>,
}

pub struct ModelManager {
  source: ModelSource,
  loader: Arc<dyn RuntimeLoader>,
  inner: Mutex<Inner>,
  changed: Condvar,
  phase: AtomicU8,
  loads: AtomicU64,
  memory: RwLock<Option<MemoryInfo>>,
}

impl ModelManager {
  pub fn new(source: ModelSource, loader: Arc<dyn RuntimeLoader>) -> Self {
    Self {
      source,
      loader,
      inner: Mutex::new(Inner {
        slot: Slot::Empty,
        attempt: 0,
        last_outcome: None,
      }),
      changed: Condvar::new(),
      phase: AtomicU8::new(LifecycleState::Uninitialized.as_u8()),
      loads: AtomicU64::new(0),
      memory: RwLock::new(None),
    }
  }

  pub fn source(&self) -> &ModelSource {
    &self.source
  }

  /// 当前状态，不等待进行中的推理
  pub fn state(&self) -> LifecycleState {
    LifecycleState::from_u8(self.phase.load(Ordering::SeqCst))
  }

  pub fn is_ready(&self) -> bool {
    self.state() == LifecycleState::Ready
  }

  pub fn is_initializing(&self) -> bool {
    self.state() == LifecycleState::Initializing
  }

  /// 调用加载器的累计次数
  pub fn load_count(&self) -> u64 {
    self.loads.load(Ordering::SeqCst)
  }

  pub fn memory_info(&self) -> Option<MemoryInfo> {
    self.memory.read().clone()
  }

  /// 幂等初始化；并发调用者等待同一次加载并得到相同结果
  pub fn initialize(&self) -> Result<(), ModelLoadError> {
    let mut inner = self.inner.lock();
    loop {
      match inner.slot.state() {
        LifecycleState::Ready => {
          debug!("模型已初始化");
          return Ok(());
        }
        LifecycleState::Initializing => {
          info!("模型初始化进行中，等待加载完成...");
          self.wait_while_loading(&mut inner);
          if inner.slot.state() == LifecycleState::Uninitialized
            && let Some(outcome) = &inner.last_outcome
          {
            return outcome.clone();
          }
        }
        LifecycleState::Uninitialized => break,
      }
    }

    inner.attempt += 1;
    let attempt = inner.attempt;
    inner.slot = Slot::Loading;
    self.set_phase(LifecycleState::Initializing);
    drop(inner);

    let guard = LoadingGuard {
      manager: self,
      attempt,
      armed: true,
    };
    let outcome = self.load_handle();
    guard.finish(outcome)
  }

  /// 等待进行中的初始化，然后要求处于 `Ready`
  pub fn ensure_ready(&self) -> Result<(), ClassifyError> {
    let mut inner = self.inner.lock();
    self.wait_while_loading(&mut inner);
    match inner.slot.state() {
      LifecycleState::Ready => Ok(()),
      _ => Err(ClassifyError::NotInitialized),
    }
  }

  pub fn predict(&self, tensor: &InputTensor) -> Result<OutputTensor, ClassifyError> {
    let mut inner = self.inner.lock();
    self.wait_while_loading(&mut inner);

    // 运行时不保证可重入，推理全程持有状态锁
    match &mut inner.slot {
      Slot::Loaded(handle) => handle.runtime.run(tensor).map_err(ClassifyError::from),
      _ => Err(ClassifyError::NotInitialized),
    }
  }

  /// 用中灰色张量跑一次推理；推理失败只记录日志
  pub fn warm_up(&self) -> Result<(), ClassifyError> {
    info!("模型预热...");
    let dummy = InputTensor::filled(0.5);
    let now = Instant::now();
    match self.predict(&dummy) {
      Ok(output) => {
        info!(
          "模型预热完成，耗时: {:.2?}, 输出: {:?}",
          now.elapsed(),
          output.as_slice()
        );
        Ok(())
      }
      Err(ClassifyError::NotInitialized) => Err(ClassifyError::NotInitialized),
      Err(err) => {
        warn!("模型预热失败，继续运行: {}", err);
        Ok(())
      }
    }
  }

  /// 释放模型并回到 `Uninitialized`；重复调用无副作用
  pub fn dispose(&self) {
    let mut inner = self.inner.lock();
    self.wait_while_loading(&mut inner);

    match std::mem::replace(&mut inner.slot, Slot::Empty) {
      Slot::Loaded(handle) => {
        drop(handle);
        *self.memory.write() = None;
        self.set_phase(LifecycleState::Uninitialized);
        self.changed.notify_all();
        info!("模型已释放");
      }
      _ => debug!("模型未加载，无需释放"),
    }
  }

  pub fn reset(&self) {
    self.dispose();
    info!("模型服务已重置");
  }

  fn wait_while_loading(&self, inner: &mut MutexGuard<'_, Inner>) {
    while inner.slot.state() == LifecycleState::Initializing {
      self.changed.wait(inner);
    }
  }

  fn set_phase(&self, state: LifecycleState) {
    self.phase.store(state.as_u8(), Ordering::SeqCst);
  }

  fn load_handle(&self) -> Result<ModelHandle, ModelLoadError> {
    info!("初始化分类模型: {}", self.source);
    let blob = self.source.read()?;
    self.loads.fetch_add(1, Ordering::SeqCst);
    let runtime = self.loader.load(&blob)?;

    Ok(ModelHandle {
      runtime,
      blob_bytes: blob.len(),
      loaded_at: Utc::now(),
    })
  }

  fn complete(
    &self,
    attempt: u64,
    outcome: Result<ModelHandle, ModelLoadError>,
  ) -> Result<(), ModelLoadError> {
    let mut inner = self.inner.lock();
    let result = match outcome {
      Ok(handle) => {
        *self.memory.write() = Some(MemoryInfo {
          model_bytes: handle.blob_bytes,
          loaded_at: handle
            .loaded_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        inner.slot = Slot::Loaded(handle);
        inner.last_outcome = Some(Ok(()));
        self.set_phase(LifecycleState::Ready);
        info!("模型加载完成 (第 {} 次尝试)", attempt);
        Ok(())
      }
      Err(err) => {
        error!("模型初始化失败: {}", err);
        inner.slot = Slot::Empty;
        inner.last_outcome = Some(Err(err.clone()));
        self.set_phase(LifecycleState::Uninitialized);
        Err(err)
      }
    };
    self.changed.notify_all();
    result
  }
}

/// 加载器 panic 时把状态恢复为 `Uninitialized` 并唤醒等待者
struct LoadingGuard<'a> {
  manager: &'a ModelManager,
  attempt: u64,
  armed: bool,
}

impl LoadingGuard<'_> {
  fn finish(mut self, outcome: Result<ModelHandle, ModelLoadError>) -> Result<(), ModelLoadError> {
    self.armed = false;
    self.manager.complete(self.attempt, outcome)
  }
}

impl Drop for LoadingGuard<'_> {
  fn drop(&mut self) {
    if self.armed {
      let _ = self.manager.complete(
        self.attempt,
        Err(ModelLoadError::Rejected("模型加载过程异常中断".to_string())),
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::InferenceError;
  use std::sync::atomic::AtomicUsize;

  struct FnLoader<F>(F);

  impl<F> RuntimeLoader for FnLoader<F>
  where
    F: Fn(&[u8]) -> Result<Box<dyn ModelRuntime>, ModelLoadError> + Send + Sync,
  {
    fn load(&self, blob: &[u8]) -> Result<Box<dyn ModelRuntime>, ModelLoadError> {
      (self.0)(blob)
    }
  }

  struct ConstRuntime(f32);

  impl ModelRuntime for ConstRuntime {
    fn run(&mut self, _input: &InputTensor) -> Result<OutputTensor, InferenceError> {
      Ok(OutputTensor::from(vec![self.0]))
    }
  }

  struct BrokenRuntime;

  impl ModelRuntime for BrokenRuntime {
    fn run(&mut self, _input: &InputTensor) -> Result<OutputTensor, InferenceError> {
      Err(InferenceError::Runtime("delegate crashed".to_string()))
    }
  }

  fn manager_with<F>(loader: F) -> ModelManager
  where
    F: Fn(&[u8]) -> Result<Box<dyn ModelRuntime>, ModelLoadError> + Send + Sync + 'static,
  {
    ModelManager::new(ModelSource::from(vec![7u8; 32]), Arc::new(FnLoader(loader)))
  }

  fn const_manager(score: f32) -> ModelManager {
    manager_with(move |_| Ok(Box::new(ConstRuntime(score)) as Box<dyn ModelRuntime>))
  }

  #[test]
  fn predict_and_warm_up_require_ready() {
    let manager = const_manager(0.9);
    assert_eq!(manager.state(), LifecycleState::Uninitialized);
    assert!(
      manager
        .predict(&InputTensor::default())
        .unwrap_err()
        .is_not_initialized()
    );
    assert!(manager.warm_up().unwrap_err().is_not_initialized());
    assert!(manager.ensure_ready().unwrap_err().is_not_initialized());
  }

  #[test]
  fn initialize_twice_loads_once() {
    let manager = const_manager(0.9);
    manager.initialize().unwrap();
    manager.initialize().unwrap();

    assert_eq!(manager.load_count(), 1);
    assert!(manager.is_ready());
    let output = manager.predict(&InputTensor::default()).unwrap();
    assert_eq!(output.as_slice(), &[0.9]);
  }

  #[test]
  fn failed_load_returns_to_uninitialized() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let manager = manager_with(move |_| {
      if counter.fetch_add(1, Ordering::SeqCst) == 0 {
        Err(ModelLoadError::Rejected("corrupt flatbuffer".to_string()))
      } else {
        Ok(Box::new(ConstRuntime(0.1)) as Box<dyn ModelRuntime>)
      }
    });

    let err = manager.initialize().unwrap_err();
    assert_eq!(err, ModelLoadError::Rejected("corrupt flatbuffer".to_string()));
    assert_eq!(manager.state(), LifecycleState::Uninitialized);

    assert!(
      manager
        .predict(&InputTensor::default())
        .unwrap_err()
        .is_not_initialized()
    );
    assert!(manager.warm_up().unwrap_err().is_not_initialized());
    assert!(manager.memory_info().is_none());

    manager.initialize().unwrap();
    assert!(manager.is_ready());
    assert!(manager.predict(&InputTensor::default()).is_ok());
  }

  #[test]
  fn missing_model_file_is_a_load_error() {
    let manager = ModelManager::new(
      ModelSource::Path("no/such/classifier.onnx".into()),
      Arc::new(FnLoader(|_: &[u8]| {
        Ok(Box::new(ConstRuntime(0.5)) as Box<dyn ModelRuntime>)
      })),
    );

    assert!(matches!(
      manager.initialize(),
      Err(ModelLoadError::Missing(_))
    ));
    assert_eq!(manager.load_count(), 0);
  }

  #[test]
  fn panicking_loader_does_not_wedge_the_manager() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let manager = manager_with(move |_| {
      if counter.fetch_add(1, Ordering::SeqCst) == 0 {
        panic!("loader blew up");
      }
      Ok(Box::new(ConstRuntime(0.3)) as Box<dyn ModelRuntime>)
    });

    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| manager.initialize()));
    assert!(caught.is_err());
    assert_eq!(manager.state(), LifecycleState::Uninitialized);

    manager.initialize().unwrap();
    assert!(manager.is_ready());
  }

  #[test]
  fn dispose_then_initialize_round_trip() {
    let manager = const_manager(0.7);
    manager.dispose();
    assert_eq!(manager.state(), LifecycleState::Uninitialized);

    manager.initialize().unwrap();
    assert_eq!(manager.memory_info().map(|info| info.model_bytes), Some(32));

    manager.dispose();
    manager.dispose();
    assert_eq!(manager.state(), LifecycleState::Uninitialized);
    assert!(manager.memory_info().is_none());
    assert!(
      manager
        .predict(&InputTensor::default())
        .unwrap_err()
        .is_not_initialized()
    );

    manager.initialize().unwrap();
    assert_eq!(manager.load_count(), 2);
    assert!(manager.predict(&InputTensor::default()).is_ok());

    manager.reset();
    assert_eq!(manager.state(), LifecycleState::Uninitialized);
  }

  #[test]
  fn warm_up_failure_is_not_fatal() {
    let manager = manager_with(|_| Ok(Box::new(BrokenRuntime) as Box<dyn ModelRuntime>));
    manager.initialize().unwrap();

    assert!(manager.warm_up().is_ok());
    assert!(matches!(
      manager.predict(&InputTensor::default()),
      Err(ClassifyError::Inference(InferenceError::Runtime(_)))
    ));
  }
}
