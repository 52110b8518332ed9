// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/model/tract.rs - tract ONNX 运行时
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

use std::io::Cursor;

use tract_onnx::prelude::*;
use tracing::{debug, info, warn};

use crate::{
  frame::{INPUT_HEIGHT, INPUT_WIDTH, InputTensor, OutputTensor, RGB_CHANNELS},
  model::{InferenceError, ModelLoadError, ModelRuntime, RuntimeLoader},
};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const INPUT_BATCH_SHAPE: [usize; 4] = [1, INPUT_HEIGHT as usize, INPUT_WIDTH as usize, RGB_CHANNELS];

/// 基于 tract 的 ONNX 加载器，输入固定为 `[1, 224, 224, 3] f32`
#[derive(Debug, Default, Clone, Copy)]
pub struct TractLoader;

#[derive(Debug)]
pub struct TractRuntime {
  runnable: RunnableModel,
}

impl RuntimeLoader for TractLoader {
  fn load(&self, blob: &[u8]) -> Result<Box<dyn ModelRuntime>, ModelLoadError> {
    let runnable = match load_runnable_model(blob, true) {
      Ok(model) => {
        debug!("模型图优化完成");
        model
      }
      Err(opt_err) => {
        warn!("模型图优化失败 ({opt_err}), 回退到未优化的图");
        load_runnable_model(blob, false).map_err(|e| {
          ModelLoadError::Rejected(format!(
            "decluttered graph failed after optimize error ({opt_err}): {e}"
          ))
        })?
      }
    };

    info!("ONNX 模型加载完成");
    Ok(Box::new(TractRuntime { runnable }))
  }
}

fn load_runnable_model(blob: &[u8], optimized: bool) -> Result<RunnableModel, ModelLoadError> {
  let model = tract_onnx::onnx()
    .model_for_read(&mut Cursor::new(blob))
    .map_err(|e| ModelLoadError::Rejected(format!("failed to parse ONNX graph: {e}")))?
    .with_input_fact(0, f32::fact(INPUT_BATCH_SHAPE).into())
    .map_err(|e| ModelLoadError::Rejected(format!("unable to fix input shape: {e}")))?;

  if optimized {
    model
      .into_optimized()
      .map_err(|e| ModelLoadError::Rejected(format!("unable to optimize graph: {e}")))?
      .into_runnable()
      .map_err(|e| ModelLoadError::Rejected(format!("unable to make graph runnable: {e}")))
  } else {
    model
      .into_typed()
      .map_err(|e| ModelLoadError::Rejected(format!("unable to type-check graph: {e}")))?
      .into_decluttered()
      .map_err(|e| ModelLoadError::Rejected(format!("unable to declutter graph: {e}")))?
      .into_runnable()
      .map_err(|e| ModelLoadError::Rejected(format!("unable to make graph runnable: {e}")))
  }
}

impl ModelRuntime for TractRuntime {
  fn run(&mut self, input: &InputTensor) -> Result<OutputTensor, InferenceError> {
    let tensor = Tensor::from_shape(&input.batch_shape(), input.as_slice())
      .map_err(|e| InferenceError::Runtime(format!("failed to build input tensor: {e}")))?;

    let outputs = self
      .runnable
      .run(tvec![tensor.into()])
      .map_err(|e| InferenceError::Runtime(e.to_string()))?;

    let output = outputs
      .into_iter()
      .next()
      .ok_or_else(|| InferenceError::Runtime("model produced no outputs".to_string()))?
      .into_tensor();

    let values = output
      .as_slice::<f32>()
      .map_err(|e| InferenceError::Runtime(format!("output not f32: {e}")))?;

    Ok(OutputTensor::from(values.to_vec()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_model_is_rejected() {
    let err = TractLoader
      .load(b"not a real onnx file")
      .err()
      .expect("invalid ONNX should fail");

    match err {
      ModelLoadError::Rejected(message) => assert!(
        message.contains("failed to parse ONNX") || message.contains("decluttered graph"),
        "Unexpected error message: {message}"
      ),
      other => panic!("unexpected error: {other:?}"),
    }
  }
}
