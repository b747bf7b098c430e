// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/postprocess.rs - 检测结果过滤、排序与拼接
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

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::{BoundingBox, Detection};

pub mod verify;

pub type ExcludeSet = BTreeSet<String>;

/// 默认排除的类别：整车与误检的标点
pub const DEFAULT_EXCLUDE: [&str; 2] = ["car", "."];

/// 按左上角坐标筛选检测框的中心窗口（闭区间）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionFilter {
  pub min_x1: f32,
  pub max_x1: f32,
  pub min_y1: f32,
  pub max_y1: f32,
}

impl Default for RegionFilter {
  fn default() -> Self {
    Self {
      min_x1: 0.15,
      max_x1: 0.85,
      min_y1: 0.2,
      max_y1: 0.8,
    }
  }
}

impl RegionFilter {
  pub fn contains(&self, bbox: &BoundingBox) -> bool {
    (self.min_x1..=self.max_x1).contains(&bbox.x1) && (self.min_y1..=self.max_y1).contains(&bbox.y1)
  }
}

pub fn default_exclude() -> ExcludeSet {
  DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostprocessConfig {
  pub region: RegionFilter,
  pub exclude: ExcludeSet,
}

impl Default for PostprocessConfig {
  fn default() -> Self {
    Self {
      region: RegionFilter::default(),
      exclude: default_exclude(),
    }
  }
}

impl PostprocessConfig {
  pub fn process(&self, detection: &Detection) -> AnnotationResult {
    process(detection, &self.region, &self.exclude)
  }
}

/// 后处理的语义输出
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationResult {
  pub plate_text: String,
  /// 从左到右排列的保留检测框，也是渲染顺序
  pub filtered_boxes: Vec<BoundingBox>,
}

impl AnnotationResult {
  pub fn is_empty(&self) -> bool {
    self.filtered_boxes.is_empty()
  }
}

/// 过滤、排序并拼接检测结果
///
/// 1. 丢弃左上角不在 `region` 内的检测框；
/// 2. 丢弃类别在 `exclude` 中的检测框；
/// 3. 按 `x1` 升序稳定排序，相同 `x1` 保持推理返回的顺序；
/// 4. 依次无分隔拼接类别名得到车牌文本。
///
/// 输入为空或全部被过滤时返回空文本和空列表，这不是错误。
pub fn process(detection: &Detection, region: &RegionFilter, exclude: &ExcludeSet) -> AnnotationResult {
  let mut filtered_boxes: Vec<BoundingBox> = detection
    .boxes
    .iter()
    .filter(|bbox| region.contains(bbox) && !exclude.contains(&bbox.class_name))
    .cloned()
    .collect();

  // sort_by 是稳定排序
  filtered_boxes.sort_by(|a, b| a.x1.total_cmp(&b.x1));

  let plate_text: String = filtered_boxes
    .iter()
    .map(|bbox| bbox.class_name.as_str())
    .collect();

  debug!(
    "后处理: 输入 {} 个检测框, 保留 {} 个, 文本 \"{}\"",
    detection.len(),
    filtered_boxes.len(),
    plate_text
  );

  AnnotationResult {
    plate_text,
    filtered_boxes,
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  fn at(class_name: &str, x1: f32, y1: f32) -> BoundingBox {
    BoundingBox::new(class_name, 0.9, [x1, y1, x1 + 0.05, y1 + 0.1])
  }

  #[test]
  fn orders_left_to_right_and_drops_edges() {
    let detection = Detection::new(vec![at("A", 0.3, 0.5), at("B", 0.2, 0.5), at("C", 0.9, 0.5)], 12);
    let result = PostprocessConfig::default().process(&detection);

    assert_eq!(result.plate_text, "BA");
    let names: Vec<_> = result.filtered_boxes.iter().map(|b| b.class_name.as_str()).collect();
    assert_eq!(names, ["B", "A"]);
  }

  #[test]
  fn empty_input_is_valid_result() {
    let result = PostprocessConfig::default().process(&Detection::default());
    assert_eq!(result.plate_text, "");
    assert!(result.filtered_boxes.is_empty());
    assert!(result.is_empty());
  }

  #[test]
  fn excluded_class_is_dropped_inside_region() {
    let detection = Detection::new(vec![at("car", 0.4, 0.4), at("7", 0.5, 0.4), at(".", 0.6, 0.4)], 3);
    let result = PostprocessConfig::default().process(&detection);
    assert_eq!(result.plate_text, "7");
    assert_eq!(result.filtered_boxes.len(), 1);
  }

  #[test]
  fn region_bounds_are_inclusive() {
    let detection = Detection::new(
      vec![at("L", 0.15, 0.2), at("R", 0.85, 0.8), at("X", 0.5, 0.81), at("Y", 0.5, 0.19)],
      0,
    );
    let result = PostprocessConfig::default().process(&detection);
    assert_eq!(result.plate_text, "LR");
  }

  #[test]
  fn config_overrides_defaults() {
    let detection = Detection::new(vec![at("car", 0.05, 0.05), at("A", 0.5, 0.5)], 0);
    let region = RegionFilter {
      min_x1: 0.0,
      max_x1: 0.1,
      min_y1: 0.0,
      max_y1: 0.1,
    };
    let result = process(&detection, &region, &ExcludeSet::new());
    assert_eq!(result.plate_text, "car");
  }

  #[test]
  fn ties_keep_detection_order() {
    let detection = Detection::new(vec![at("2", 0.4, 0.3), at("1", 0.4, 0.6), at("0", 0.3, 0.3)], 0);
    let result = PostprocessConfig::default().process(&detection);
    assert_eq!(result.plate_text, "021");
  }

  #[test]
  fn nan_coordinates_are_filtered() {
    let detection = Detection::new(vec![at("N", f32::NAN, 0.5), at("A", 0.5, 0.5)], 0);
    let result = PostprocessConfig::default().process(&detection);
    assert_eq!(result.plate_text, "A");
  }

  fn arb_box() -> impl Strategy<Value = BoundingBox> {
    (
      prop::sample::select(vec!["A", "B", "7", "car", ".", "number_plate"]),
      // 离散取值以制造相同 x1
      (0u8..=20).prop_map(|v| v as f32 / 20.0),
      0.0f32..1.0,
    )
      .prop_map(|(name, x1, y1)| BoundingBox::new(name, 0.5, [x1, y1, 1.0, 1.0]))
  }

  proptest! {
    #[test]
    fn output_is_sorted_filtered_subset(boxes in prop::collection::vec(arb_box(), 0..40)) {
      // 用置信度记录原始下标
      let boxes: Vec<BoundingBox> = boxes
        .into_iter()
        .enumerate()
        .map(|(i, mut b)| { b.confidence = i as f32; b })
        .collect();
      let detection = Detection::new(boxes.clone(), 1);
      let config = PostprocessConfig::default();
      let result = config.process(&detection);

      for bbox in &result.filtered_boxes {
        prop_assert!(boxes.contains(bbox));
        prop_assert!(config.region.contains(bbox));
        prop_assert!(!config.exclude.contains(&bbox.class_name));
      }
      let expected = boxes
        .iter()
        .filter(|b| config.region.contains(b) && !config.exclude.contains(&b.class_name))
        .count();
      prop_assert_eq!(result.filtered_boxes.len(), expected);

      for pair in result.filtered_boxes.windows(2) {
        prop_assert!(pair[0].x1 <= pair[1].x1);
        if pair[0].x1 == pair[1].x1 {
          prop_assert!(pair[0].confidence < pair[1].confidence);
        }
      }

      let text: String = result.filtered_boxes.iter().map(|b| b.class_name.clone()).collect();
      prop_assert_eq!(&result.plate_text, &text);
    }

    #[test]
    fn process_is_idempotent(boxes in prop::collection::vec(arb_box(), 0..40)) {
      let detection = Detection::new(boxes, 5);
      let config = PostprocessConfig::default();
      prop_assert_eq!(config.process(&detection), config.process(&detection));
    }
  }
}
