// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/model/record.rs - 检测记录回放模型
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

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, decode_url_path,
  frame::FrameSnapshot,
  model::{BoundingBox, Detection, Model, label::label_name},
};

#[derive(Error, Debug)]
pub enum RecordModelError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("第 {line} 行格式错误: {reason}")]
  ParseError { line: usize, reason: String },
  #[error("未知类别编号: {0}")]
  UnknownLabel(u32),
}

/// 回放预先记录的检测结果，代替真实的推理引擎
///
/// 记录文件每行一个检测框：`name, score, x1, y1, x2, y2`，坐标为归一化值。
/// `?by=id` 时第一列为类别编号，通过车牌类别表转换为类别名。
#[derive(Debug, Clone)]
pub struct RecordModel {
  boxes: Vec<BoundingBox>,
}

impl FromUrlWithScheme for RecordModel {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordModel {
  type Error = RecordModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecordModelError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let by_id = url.query_pairs().any(|(k, v)| k == "by" && v == "id");
    let path = decode_url_path(url);
    info!("加载检测记录: {}", path);
    let content = std::fs::read_to_string(&path)?;
    let model = Self::parse(&content, by_id)?;
    info!("检测记录加载完成，共 {} 个检测框", model.boxes.len());
    Ok(model)
  }
}

impl RecordModel {
  pub fn from_boxes(boxes: Vec<BoundingBox>) -> Self {
    Self { boxes }
  }

  pub fn parse(content: &str, by_id: bool) -> Result<Self, RecordModelError> {
    let mut boxes = Vec::new();
    for (index, line) in content.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      boxes.push(parse_line(line, index + 1, by_id)?);
    }
    Ok(Self { boxes })
  }
}

fn parse_line(line: &str, line_no: usize, by_id: bool) -> Result<BoundingBox, RecordModelError> {
  let parse_error = |reason: String| RecordModelError::ParseError {
    line: line_no,
    reason,
  };

  let fields: Vec<&str> = line.split(',').map(str::trim).collect();
  if fields.len() != 6 {
    return Err(parse_error(format!("期望 6 列, 实际 {} 列", fields.len())));
  }

  let class_name = if by_id {
    let id: u32 = fields[0]
      .parse()
      .map_err(|e| parse_error(format!("类别编号 '{}': {}", fields[0], e)))?;
    label_name(id)
      .ok_or(RecordModelError::UnknownLabel(id))?
      .to_string()
  } else {
    fields[0].to_string()
  };

  let mut values = [0f32; 5];
  for (value, field) in values.iter_mut().zip(&fields[1..]) {
    *value = field
      .parse()
      .map_err(|e| parse_error(format!("数值 '{}': {}", field, e)))?;
  }

  let [confidence, x1, y1, x2, y2] = values;
  if let Some(v) = [x1, y1, x2, y2]
    .into_iter()
    .find(|v| !(0.0..=1.0).contains(v))
  {
    return Err(parse_error(format!("坐标 {} 不在 [0, 1] 内", v)));
  }
  let bbox = BoundingBox::new(class_name, confidence, [x1, y1, x2, y2]);
  if !bbox.is_well_formed() {
    return Err(parse_error("要求 x1 <= x2 且 y1 <= y2".to_string()));
  }
  Ok(bbox)
}

impl Model for RecordModel {
  type Error = RecordModelError;

  fn infer(&self, frame: &FrameSnapshot) -> Result<Detection, Self::Error> {
    let now = Instant::now();
    let boxes = self.boxes.clone();
    let elapsed = now.elapsed();
    debug!(
      "回放第 {} 帧的检测结果 ({}x{})",
      frame.sequence(),
      frame.width(),
      frame.height()
    );
    Ok(Detection::new(boxes, elapsed.as_millis() as u64))
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;

  #[test]
  fn parses_named_records() {
    let model = RecordModel::parse(
      "# plate\nK, 0.91, 0.30, 0.50, 0.35, 0.60\n\nW, 0.88, 0.20, 0.50, 0.25, 0.60\n",
      false,
    )
    .unwrap();
    assert_eq!(model.boxes.len(), 2);
    assert_eq!(model.boxes[0].class_name, "K");
    assert_eq!(model.boxes[1].bbox(), [0.20, 0.50, 0.25, 0.60]);
    assert!((model.boxes[0].confidence - 0.91).abs() < f32::EPSILON);
  }

  #[test]
  fn maps_ids_through_label_table() {
    let model = RecordModel::parse("2, 0.5, 0.1, 0.1, 0.2, 0.2\n0, 0.9, 0, 0, 1, 1", true).unwrap();
    assert_eq!(model.boxes[0].class_name, "A");
    assert_eq!(model.boxes[1].class_name, "car");
  }

  #[test]
  fn rejects_unknown_id() {
    let err = RecordModel::parse("99, 0.5, 0.1, 0.1, 0.2, 0.2", true).unwrap_err();
    assert!(matches!(err, RecordModelError::UnknownLabel(99)));
  }

  #[test]
  fn reports_line_of_malformed_record() {
    let err = RecordModel::parse("A, 0.5, 0.1, 0.1, 0.2, 0.2\nB, 0.5, 0.1", false).unwrap_err();
    assert!(matches!(err, RecordModelError::ParseError { line: 2, .. }));

    let err = RecordModel::parse("A, 0.5, 0.3, 0.1, 0.2, 0.2", false).unwrap_err();
    assert!(matches!(err, RecordModelError::ParseError { line: 1, .. }));
  }

  #[test]
  fn rejects_coordinates_outside_unit_range() {
    let err = RecordModel::parse("A, 0.9, 0.3, 0.5, 1e10, 0.6", false).unwrap_err();
    assert!(matches!(err, RecordModelError::ParseError { line: 1, .. }));

    let err = RecordModel::parse("A, 0.9, -0.1, 0.5, 0.2, 0.6", false).unwrap_err();
    assert!(matches!(err, RecordModelError::ParseError { line: 1, .. }));

    let err = RecordModel::parse("A, 0.9, 0.3, NaN, 0.4, 0.6", false).unwrap_err();
    assert!(matches!(err, RecordModelError::ParseError { line: 1, .. }));

    assert!(RecordModel::parse("A, 0.9, 0, 0, 1, 1", false).is_ok());
  }

  #[test]
  fn empty_record_infers_empty_detection() {
    let model = RecordModel::parse("", false).unwrap();
    let frame = FrameSnapshot::new(RgbImage::new(2, 2)).unwrap();
    assert!(model.infer(&frame).unwrap().is_empty());
  }

  #[test]
  fn from_url_requires_record_scheme() {
    let url = Url::parse("image:///tmp/a.txt").unwrap();
    assert!(matches!(
      RecordModel::from_url(&url),
      Err(RecordModelError::SchemeMismatch { .. })
    ));
  }

  #[test]
  fn from_url_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plate.txt");
    std::fs::write(&path, "28, 0.7, 0.4, 0.4, 0.45, 0.5\n").unwrap();
    let url = Url::parse(&format!("record://{}?by=id", path.display())).unwrap();
    let model = RecordModel::from_url(&url).unwrap();
    assert_eq!(model.boxes[0].class_name, "1");
  }
}
