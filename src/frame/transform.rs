// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/frame/transform.rs - 原始帧旋转与镜像
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

use image::{Rgb, RgbImage, imageops};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

use crate::frame::{FrameError, FrameSnapshot, PixelFormat, RawFrame};

/// 将相机原始缓冲区转换为正向的帧快照
///
/// 先按 `rotation_degrees` 顺时针旋转，再按需水平镜像（前置摄像头）。
/// 90° 与 270° 时宽高互换；非直角旋转输出旋转后外接矩形大小的画布，
/// 源图像以外的区域填充黑色。
pub fn transform(raw: &RawFrame, mirror: bool) -> Result<FrameSnapshot, FrameError> {
  if raw.width == 0 || raw.height == 0 {
    return Err(FrameError::EmptyFrame {
      width: raw.width,
      height: raw.height,
    });
  }

  let expected = raw.expected_len();
  if raw.data.len() != expected {
    return Err(FrameError::BufferSizeMismatch {
      expected,
      actual: raw.data.len(),
    });
  }

  let image = to_rgb_image(raw)?;
  let mut upright = match raw.rotation_degrees.rem_euclid(360) {
    0 => image,
    90 => imageops::rotate90(&image),
    180 => imageops::rotate180(&image),
    270 => imageops::rotate270(&image),
    degrees => rotate_about_center(&image, degrees as f32),
  };

  if mirror {
    imageops::flip_horizontal_in_place(&mut upright);
  }

  FrameSnapshot::new(upright)
}

fn to_rgb_image(raw: &RawFrame) -> Result<RgbImage, FrameError> {
  let data = match raw.format {
    PixelFormat::Rgb8 => raw.data.clone(),
    PixelFormat::Rgba8 => raw
      .data
      .chunks_exact(4)
      .flat_map(|px| [px[0], px[1], px[2]])
      .collect(),
  };

  let actual = data.len();
  RgbImage::from_raw(raw.width, raw.height, data).ok_or(FrameError::BufferSizeMismatch {
    expected: raw.width as usize * raw.height as usize * 3,
    actual,
  })
}

fn rotate_about_center(image: &RgbImage, degrees: f32) -> RgbImage {
  let theta = degrees.to_radians();
  let (sin, cos) = theta.sin_cos();
  let (w, h) = (image.width() as f32, image.height() as f32);

  let out_w = (w * cos.abs() + h * sin.abs()).round().max(1.0) as u32;
  let out_h = (w * sin.abs() + h * cos.abs()).round().max(1.0) as u32;

  // 双线性采样要求右下邻点在图内，补一圈黑边后源图像的最后一行列才能被采到
  let mut padded = RgbImage::new(image.width() + 2, image.height() + 2);
  imageops::replace(&mut padded, image, 1, 1);

  // 像素中心位于整数坐标，旋转中心取 (n - 1) / 2；补边后源中心为 (w + 1) / 2
  let projection = Projection::translate(-(w + 1.0) / 2.0, -(h + 1.0) / 2.0)
    .and_then(Projection::rotate(theta))
    .and_then(Projection::translate(
      (out_w as f32 - 1.0) / 2.0,
      (out_h as f32 - 1.0) / 2.0,
    ));

  let mut out = RgbImage::new(out_w, out_h);
  warp_into(
    &padded,
    &projection,
    Interpolation::Bilinear,
    Rgb([0, 0, 0]),
    &mut out,
  );
  out
}
