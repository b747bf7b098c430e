// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/output.rs - 渲染与持久化输出
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

use std::{fs::File, io::BufWriter, path::Path};

use image::{RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;
use url::Url;

use crate::FromUrl;
#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
use crate::FromUrlWithScheme;
use crate::postprocess::AnnotationResult;

pub const JPEG_MIME: &str = "image/jpeg";
const JPEG_QUALITY: u8 = 100;

/// 持久化协作方：把标注后的图像写入某个存储
pub trait Store {
  type Error;

  fn store(&self, image: &RgbImage, suggested_name: &str, mime_type: &str) -> Result<(), Self::Error>;

  /// 同时拿到后处理结果的存储可以额外记录检测框
  fn store_with_result(
    &self,
    image: &RgbImage,
    suggested_name: &str,
    mime_type: &str,
    _result: &AnnotationResult,
  ) -> Result<(), Self::Error> {
    self.store(image, suggested_name, mime_type)
  }
}

pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

/// 按路径扩展名保存图像，JPEG 使用最高质量编码
pub(crate) fn save_image(path: &Path, image: &RgbImage) -> Result<(), image::ImageError> {
  let is_jpeg = path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));

  if is_jpeg {
    let writer = BufWriter::new(File::create(path)?);
    image.write_with_encoder(JpegEncoder::new_with_quality(writer, JPEG_QUALITY))
  } else {
    image.save(path)
  }
}

/// MIME 类型对应的默认扩展名
pub(crate) fn extension_for_mime(mime_type: &str) -> &'static str {
  match mime_type {
    "image/png" => "png",
    "image/bmp" => "bmp",
    _ => "jpg",
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Store for OutputWrapper {
  type Error = OutputError;

  fn store(&self, image: &RgbImage, suggested_name: &str, mime_type: &str) -> Result<(), Self::Error> {
    match *self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(ref output) => output
        .store(image, suggested_name, mime_type)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(ref output) => output
        .store(image, suggested_name, mime_type)
        .map_err(OutputError::from),
    }
  }

  fn store_with_result(
    &self,
    image: &RgbImage,
    suggested_name: &str,
    mime_type: &str,
    result: &AnnotationResult,
  ) -> Result<(), Self::Error> {
    match *self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(ref output) => output
        .store_with_result(image, suggested_name, mime_type, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(ref output) => output
        .store_with_result(image, suggested_name, mime_type, result)
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn jpeg_written_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.JPG");
    save_image(&path, &RgbImage::from_pixel(8, 8, image::Rgb([9, 9, 9]))).unwrap();

    let format = image::ImageReader::open(&path)
      .unwrap()
      .with_guessed_format()
      .unwrap()
      .format();
    assert_eq!(format, Some(image::ImageFormat::Jpeg));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("ftp://example.com/out.jpg").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch)
    ));
  }

  #[cfg(feature = "save_image_file")]
  #[test]
  fn wrapper_dispatches_store_to_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = OutputWrapper::from_url(&url).unwrap();

    let result = AnnotationResult::default();
    output
      .store_with_result(&RgbImage::new(3, 3), "plate_1.jpg", JPEG_MIME, &result)
      .unwrap();
    assert!(path.is_file());
  }

  #[test]
  fn mime_maps_to_extension() {
    assert_eq!(extension_for_mime(JPEG_MIME), "jpg");
    assert_eq!(extension_for_mime("image/png"), "png");
  }
}
