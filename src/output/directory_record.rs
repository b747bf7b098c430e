// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
  path::{Path, PathBuf},
  sync::atomic::{AtomicU32, Ordering},
};

use chrono::{Datelike, Utc};
use image::RgbImage;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme, decode_url_path,
  model::label::label_id,
  output::{Store, extension_for_mime, save_image},
  postprocess::AnnotationResult,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按日期分目录保存标注图像：`<dir>/YYYY/MM/DD/<name>-<counter>.<ext>`
///
/// `?record` 时在图像旁写入同名 `.json`，记录车牌文本与检测框。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: bool,
  frame_counter: AtomicU32,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");

    Ok(DirectoryRecordOutput::new(decode_url_path(uri), record))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl AsRef<Path>, record: bool) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      record,
      frame_counter: AtomicU32::new(0),
    }
  }

  fn frame_id(&self) -> u32 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1
  }

  fn frame_path(&self, suggested_name: &str, mime_type: &str) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    let suggested = Path::new(suggested_name);
    let stem = suggested
      .file_stem()
      .and_then(|s| s.to_str())
      .filter(|s| !s.is_empty())
      .unwrap_or("frame");
    let extension = suggested
      .extension()
      .and_then(|s| s.to_str())
      .unwrap_or_else(|| extension_for_mime(mime_type));

    Ok(directory.join(format!("{}-{:04X}.{}", stem, self.frame_id(), extension)))
  }

  fn write_record(&self, path: &Path, result: &AnnotationResult) -> Result<(), DirectoryRecordOutputError> {
    let boxes: Vec<_> = result
      .filtered_boxes
      .iter()
      .map(|bbox| {
        json!({
          "class_name": bbox.class_name,
          "class_id": label_id(&bbox.class_name),
          "confidence": bbox.confidence,
          "bbox": bbox.bbox(),
        })
      })
      .collect();
    let record = json!({
      "plate_text": result.plate_text,
      "boxes": boxes,
    });
    std::fs::write(path.with_extension("json"), serde_json::to_vec_pretty(&record)?)?;
    Ok(())
  }

  fn save(
    &self,
    image: &RgbImage,
    suggested_name: &str,
    mime_type: &str,
    result: Option<&AnnotationResult>,
  ) -> Result<(), DirectoryRecordOutputError> {
    let path = self.frame_path(suggested_name, mime_type)?;
    save_image(&path, image)?;
    if self.record
      && let Some(result) = result
    {
      self.write_record(&path, result)?;
    }
    info!("保存标注图像: {}", path.display());
    Ok(())
  }
}

impl Store for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn store(&self, image: &RgbImage, suggested_name: &str, mime_type: &str) -> Result<(), Self::Error> {
    self.save(image, suggested_name, mime_type, None)
  }

  fn store_with_result(
    &self,
    image: &RgbImage,
    suggested_name: &str,
    mime_type: &str,
    result: &AnnotationResult,
  ) -> Result<(), Self::Error> {
    self.save(image, suggested_name, mime_type, Some(result))
  }
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;
  use crate::model::BoundingBox;

  fn files_with_extension(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          pending.push(path);
        } else if path.extension().is_some_and(|e| e == extension) {
          found.push(path);
        }
      }
    }
    found.sort();
    found
  }

  #[test]
  fn writes_dated_numbered_files() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::new(dir.path(), false);
    let image = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));

    output.store(&image, "plate_1.jpg", "image/jpeg").unwrap();
    output.store(&image, "plate_1.jpg", "image/jpeg").unwrap();

    let files = files_with_extension(dir.path(), "jpg");
    assert_eq!(files.len(), 2);
    let name = files[0].file_name().unwrap().to_str().unwrap();
    assert_eq!(name, "plate_1-0001.jpg");
    let year = Utc::now().year().to_string();
    assert!(files[0].starts_with(dir.path().join(year)));
    assert!(files_with_extension(dir.path(), "json").is_empty());
  }

  #[test]
  fn missing_extension_comes_from_mime() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::new(dir.path(), false);
    output
      .store(&RgbImage::new(2, 2), "snapshot", "image/png")
      .unwrap();
    assert_eq!(files_with_extension(dir.path(), "png").len(), 1);
  }

  #[test]
  fn record_sidecar_lists_boxes() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?record", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    let result = AnnotationResult {
      plate_text: "K2".into(),
      filtered_boxes: vec![
        BoundingBox::new("K", 0.9, [0.2, 0.4, 0.25, 0.5]),
        BoundingBox::new("2", 0.8, [0.3, 0.4, 0.35, 0.5]),
      ],
    };

    output
      .store_with_result(&RgbImage::new(4, 4), "plate_7.jpg", "image/jpeg", &result)
      .unwrap();

    let records = files_with_extension(dir.path(), "json");
    assert_eq!(records.len(), 1);
    let value: serde_json::Value =
      serde_json::from_slice(&std::fs::read(&records[0]).unwrap()).unwrap();
    assert_eq!(value["plate_text"], "K2");
    assert_eq!(value["boxes"][0]["class_name"], "K");
    assert_eq!(value["boxes"][0]["class_id"], 12);
    assert_eq!(value["boxes"][1]["class_id"], 29);
  }
}
