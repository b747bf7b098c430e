// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/frame.rs - 帧快照定义
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

use image::RgbImage;
use thiserror::Error;

mod cache;
mod transform;

pub use self::cache::FrameCache;
pub use self::transform::transform;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("帧尺寸无效: {width}x{height}")]
  EmptyFrame { width: u32, height: u32 },
  #[error("缓冲区大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
}

/// 原始缓冲区的像素排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  Rgba8,
  Rgb8,
}

impl PixelFormat {
  pub fn channels(self) -> usize {
    match self {
      PixelFormat::Rgba8 => 4,
      PixelFormat::Rgb8 => 3,
    }
  }
}

/// 帧生产者推送的原始帧，带有相机报告的旋转角度
#[derive(Debug, Clone)]
pub struct RawFrame {
  pub data: Vec<u8>,
  pub width: u32,
  pub height: u32,
  /// 顺时针旋转多少度后图像为正
  pub rotation_degrees: i32,
  pub format: PixelFormat,
}

impl RawFrame {
  pub fn expected_len(&self) -> usize {
    self.width as usize * self.height as usize * self.format.channels()
  }

  pub fn from_rgb_image(image: RgbImage, rotation_degrees: i32) -> Self {
    let (width, height) = image.dimensions();
    Self {
      data: image.into_raw(),
      width,
      height,
      rotation_degrees,
      format: PixelFormat::Rgb8,
    }
  }
}

/// 某一时刻的不可变帧快照
///
/// 快照一旦构造便不再修改，缓存替换时只替换指针，
/// 因此消费者持有的快照不会被生产者改写。
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
  image: RgbImage,
  sequence: u64,
  captured_at: Instant,
}

impl FrameSnapshot {
  pub fn new(image: RgbImage) -> Result<Self, FrameError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(FrameError::EmptyFrame { width, height });
    }

    Ok(Self {
      image,
      sequence: 0,
      captured_at: Instant::now(),
    })
  }

  pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
    self.sequence = sequence;
    self
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  /// 发布到缓存时分配的序号，未发布的快照为 0
  pub fn sequence(&self) -> u64 {
    self.sequence
  }

  pub fn captured_at(&self) -> Instant {
    self.captured_at
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snapshot_rejects_empty_image() {
    let err = FrameSnapshot::new(RgbImage::new(0, 4)).unwrap_err();
    assert_eq!(err, FrameError::EmptyFrame { width: 0, height: 4 });
  }

  #[test]
  fn raw_frame_from_rgb_image_keeps_layout() {
    let image = RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3]));
    let raw = RawFrame::from_rgb_image(image, 90);
    assert_eq!(raw.format, PixelFormat::Rgb8);
    assert_eq!(raw.data.len(), raw.expected_len());
    assert_eq!(raw.rotation_degrees, 90);
    assert_eq!(&raw.data[..3], &[1, 2, 3]);
  }
}
