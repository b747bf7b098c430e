// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::PathBuf;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, decode_url_path, frame::RawFrame};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Invalid query parameter '{key}': {value}")]
  InvalidQuery { key: String, value: String },
  #[error("No image found in {0}")]
  EmptyDirectory(String),
}

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

struct SourceOptions {
  rotation_degrees: i32,
  repeat: bool,
}

impl SourceOptions {
  fn from_url(url: &Url) -> Result<Self, ImageFileInputError> {
    let mut options = SourceOptions {
      rotation_degrees: 0,
      repeat: false,
    };
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "rotation" => {
          options.rotation_degrees = v.parse().map_err(|_| ImageFileInputError::InvalidQuery {
            key: k.to_string(),
            value: v.to_string(),
          })?;
        }
        "repeat" => options.repeat = true,
        _ => warn!("忽略未知参数: {}={}", k, v),
      }
    }
    Ok(options)
  }
}

fn check_scheme(url: &Url, scheme: &str) -> Result<(), ImageFileInputError> {
  if url.scheme() != scheme {
    error!(
      "URI scheme mismatch: expected '{}', found '{}'",
      scheme,
      url.scheme()
    );
    return Err(ImageFileInputError::SchemaMismatch);
  }
  Ok(())
}

/// 单张图片作为相机画面：`image:///path.jpg?rotation=90&repeat`
///
/// 默认只产出一帧，`repeat` 时无限重复同一帧。
pub struct ImageFileInput {
  image: Option<RgbImage>,
  rotation_degrees: i32,
  repeat: bool,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme(url, Self::SCHEME)?;
    let options = SourceOptions::from_url(url)?;

    let image = ImageReader::open(decode_url_path(url))?.decode()?.to_rgb8();

    Ok(ImageFileInput {
      image: Some(image),
      rotation_degrees: options.rotation_degrees,
      repeat: options.repeat,
    })
  }
}

impl ImageFileInput {
  pub fn width(&self) -> Option<u32> {
    self.image.as_ref().map(|image| image.width())
  }

  pub fn height(&self) -> Option<u32> {
    self.image.as_ref().map(|image| image.height())
  }
}

impl Iterator for ImageFileInput {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    let image = if self.repeat {
      self.image.clone()
    } else {
      self.image.take()
    };
    image.map(|image| RawFrame::from_rgb_image(image, self.rotation_degrees))
  }
}

/// 目录中的图片按文件名顺序作为连续画面：`folder:///dir?rotation=90&repeat`
///
/// 无法解码的文件记录日志后跳过。
pub struct DirectoryInput {
  paths: Vec<PathBuf>,
  index: usize,
  rotation_degrees: i32,
  repeat: bool,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme(url, Self::SCHEME)?;
    let options = SourceOptions::from_url(url)?;
    let directory = decode_url_path(url);

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
      if path.is_file() && is_image {
        paths.push(path);
      }
    }
    if paths.is_empty() {
      return Err(ImageFileInputError::EmptyDirectory(directory));
    }
    paths.sort();

    Ok(DirectoryInput {
      paths,
      index: 0,
      rotation_degrees: options.rotation_degrees,
      repeat: options.repeat,
    })
  }
}

impl DirectoryInput {
  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }
}

impl Iterator for DirectoryInput {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    // 最多尝试一轮，避免目录中全是坏文件时无限循环
    for _ in 0..self.paths.len() {
      if self.index >= self.paths.len() {
        if !self.repeat {
          return None;
        }
        self.index = 0;
      }

      let path = &self.paths[self.index];
      self.index += 1;
      match image::open(path) {
        Ok(image) => {
          return Some(RawFrame::from_rgb_image(
            image.to_rgb8(),
            self.rotation_degrees,
          ));
        }
        Err(e) => warn!("跳过无法读取的图片 {}: {}", path.display(), e),
      }
    }
    None
  }
}
