// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/model.rs - 推理协作方接口与检测结果
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

use crate::frame::FrameSnapshot;

/// 外部推理引擎
///
/// 实现方负责加载权重、运行网络以及 NMS，返回的即为最终检测框。
/// 没有检测到目标时应返回空的 [`Detection`]，而不是错误；
/// 错误只用于模型未就绪等硬故障。
pub trait Model {
  type Error;

  fn infer(&self, frame: &FrameSnapshot) -> Result<Detection, Self::Error>;
}

/// 单个检测框，坐标按源帧宽高归一化到 [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  pub class_name: String,
  pub confidence: f32,
}

impl BoundingBox {
  pub fn new(class_name: impl Into<String>, confidence: f32, bbox: [f32; 4]) -> Self {
    let [x1, y1, x2, y2] = bbox;
    Self {
      x1,
      y1,
      x2,
      y2,
      class_name: class_name.into(),
      confidence,
    }
  }

  pub fn bbox(&self) -> [f32; 4] {
    [self.x1, self.y1, self.x2, self.y2]
  }

  pub fn is_well_formed(&self) -> bool {
    self.x1 <= self.x2 && self.y1 <= self.y2
  }
}

/// 一次推理调用的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
  /// 推理返回的顺序不可信，后处理会重新排序
  pub boxes: Vec<BoundingBox>,
  pub inference_time_ms: u64,
}

impl Detection {
  pub fn new(boxes: Vec<BoundingBox>, inference_time_ms: u64) -> Self {
    Self {
      boxes,
      inference_time_ms,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }
}

pub mod label;

mod record;
pub use self::record::{RecordModel, RecordModelError};
