// 该文件是 Kugua （苦瓜花） 项目的一部分。
// src/interpret.rs - 分类结果解释
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

use std::fmt;

use serde::{Deserialize, Serialize};

/// 高于该分数判为雄花，恰好相等判为雌花
pub const DECISION_THRESHOLD: f64 = 0.5;
/// 不确定区间下界（不含）
pub const UNCERTAIN_LOW: f64 = 0.4;
/// 不确定区间上界（不含）
pub const UNCERTAIN_HIGH: f64 = 0.6;

pub trait WithLabel: Sized + fmt::Debug {
  fn to_label_str(&self) -> String;
  fn from_label_id(id: u32) -> Self;
}

/// 苦瓜花性别。模型训练标签中低分为雌花，高分为雄花
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowerGender {
  Female,
  Male,
}

impl FlowerGender {
  /// 按标签编号排列
  pub const ALL: [FlowerGender; 2] = [FlowerGender::Female, FlowerGender::Male];

  pub fn as_str(&self) -> &'static str {
    match self {
      FlowerGender::Female => "female",
      FlowerGender::Male => "male",
    }
  }
}

impl WithLabel for FlowerGender {
  fn to_label_str(&self) -> String {
    self.as_str().to_string()
  }

  fn from_label_id(id: u32) -> Self {
    if id == 0 {
      FlowerGender::Female
    } else {
      FlowerGender::Male
    }
  }
}

impl fmt::Display for FlowerGender {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpretation {
  pub label: FlowerGender,
  /// `[0, 100]`
  pub confidence_percent: f64,
  /// `[0, 1]`
  pub raw_score: f64,
  pub is_uncertain: bool,
}

/// 将 sigmoid 输出映射为标签、置信度与不确定标记；输入先截断到 `[0, 1]`
///
/// 比较在扩展后的 f64 上进行，与上报的 `raw_score` 一致；因此 `0.4f32`
/// （即 0.4000000059604645）落在不确定区间内。
pub fn interpret(raw_score: f32) -> Interpretation {
  let raw = f64::from(raw_score).clamp(0.0, 1.0);
  let is_male = raw > DECISION_THRESHOLD;

  let confidence_percent = if is_male {
    raw * 100.0
  } else {
    (1.0 - raw) * 100.0
  };

  Interpretation {
    label: FlowerGender::from_label_id(is_male as u32),
    confidence_percent,
    raw_score: raw,
    is_uncertain: raw > UNCERTAIN_LOW && raw < UNCERTAIN_HIGH,
  }
}
