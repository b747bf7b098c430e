// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/postprocess/verify.rs - 检测数量校验
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

use std::{collections::BTreeMap, fmt};

use crate::model::BoundingBox;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMismatch {
  pub class_name: String,
  pub expected: usize,
  pub found: usize,
}

impl fmt::Display for CountMismatch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} (期望: {}, 实际: {})",
      self.class_name, self.expected, self.found
    )
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountReport {
  pub missing: Vec<CountMismatch>,
  pub excess: Vec<CountMismatch>,
}

impl CountReport {
  pub fn is_ok(&self) -> bool {
    self.missing.is_empty() && self.excess.is_empty()
  }
}

impl fmt::Display for CountReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_ok() {
      return write!(f, "检测数量符合预期");
    }

    let join = |items: &[CountMismatch]| {
      items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
    };

    let mut parts = Vec::new();
    if !self.missing.is_empty() {
      parts.push(format!("缺少 -> {}", join(&self.missing)));
    }
    if !self.excess.is_empty() {
      parts.push(format!("多余 -> {}", join(&self.excess)));
    }
    write!(f, "{}", parts.join(" | "))
  }
}

/// 按类别统计检测框数量并与期望数量比较
///
/// 只检查 `expected` 中出现的类别，其他类别的检测框不计入报告。
pub fn verify_counts(boxes: &[BoundingBox], expected: &BTreeMap<String, usize>) -> CountReport {
  let mut found: BTreeMap<&str, usize> = BTreeMap::new();
  for bbox in boxes {
    *found.entry(bbox.class_name.as_str()).or_default() += 1;
  }

  let mut report = CountReport::default();
  for (class_name, &expected) in expected {
    let found = found.get(class_name.as_str()).copied().unwrap_or(0);
    let mismatch = CountMismatch {
      class_name: class_name.clone(),
      expected,
      found,
    };
    if found < expected {
      report.missing.push(mismatch);
    } else if found > expected {
      report.excess.push(mismatch);
    }
  }
  report
}
