// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

//! 检测框渲染
//!
//! 实时叠加层与保存的图片共用同一套布局：先按各自目标的宽高把归一化坐标
//! 换算成像素，得到一组 [`DrawCommand`]。实时叠加层直接拿走这组命令，
//! 保存路径则把同一组命令光栅化到源图像的副本上，因此两者的位置完全一致。

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};

use crate::model::BoundingBox;

// 渲染常量
const BOX_STROKE_WIDTH: u32 = 8;
const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const LABEL_BACKGROUND_COLOR: [u8; 3] = [0, 0, 0];
const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255];
const LABEL_FONT_SIZE: f32 = 25.0;
const LABEL_PADDING: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
  pub stroke_width: u32,
  pub box_color: Rgb<u8>,
  pub label_background: Rgb<u8>,
  pub label_color: Rgb<u8>,
  pub font_size: f32,
  pub label_padding: u32,
}

impl Default for Style {
  fn default() -> Self {
    Self {
      stroke_width: BOX_STROKE_WIDTH,
      box_color: Rgb(BOX_COLOR),
      label_background: Rgb(LABEL_BACKGROUND_COLOR),
      label_color: Rgb(LABEL_TEXT_COLOR),
      font_size: LABEL_FONT_SIZE,
      label_padding: LABEL_PADDING,
    }
  }
}

/// 像素坐标矩形，`right` 与 `bottom` 不包含在内
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  pub left: i32,
  pub top: i32,
  pub right: i32,
  pub bottom: i32,
}

impl PixelRect {
  pub fn width(&self) -> i32 {
    self.right.saturating_sub(self.left)
  }

  pub fn height(&self) -> i32 {
    self.bottom.saturating_sub(self.top)
  }

  fn inset(&self, by: i32) -> Option<Rect> {
    let rect = PixelRect {
      left: self.left.saturating_add(by),
      top: self.top.saturating_add(by),
      right: self.right.saturating_sub(by),
      bottom: self.bottom.saturating_sub(by),
    };
    rect.to_rect()
  }

  fn to_rect(self) -> Option<Rect> {
    if self.width() <= 0 || self.height() <= 0 {
      return None;
    }
    Some(Rect::at(self.left, self.top).of_size(self.width() as u32, self.height() as u32))
  }
}

/// 一条绘制命令，坐标已换算到目标表面的像素
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
  /// 空心矩形，描边以矩形边为中线
  StrokeRect {
    rect: PixelRect,
    color: Rgb<u8>,
    width: u32,
  },
  FillRect {
    rect: PixelRect,
    color: Rgb<u8>,
  },
  Text {
    x: i32,
    y: i32,
    text: String,
    color: Rgb<u8>,
    size: f32,
  },
}

/// 归一化坐标换算为像素，越界的坐标限制在目标两侧各一个目标尺寸之内
fn to_pixel(value: f32, extent: f32) -> i32 {
  (value * extent).round().clamp(-extent, 2.0 * extent) as i32
}

fn label_extent(text: u32, padding: i32) -> i32 {
  i32::try_from(text).unwrap_or(i32::MAX).saturating_add(padding)
}

pub struct Draw {
  style: Style,
  font: FontArc,
}

impl Draw {
  /// 使用内置字体和默认样式
  pub fn new() -> Result<Self, InvalidFont> {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;
    Ok(Self::with_font(font, Style::default()))
  }

  pub fn with_font(font: FontArc, style: Style) -> Self {
    Self { style, font }
  }

  /// 计算在 `width`x`height` 的表面上绘制检测框所需的命令
  ///
  /// 命令按检测框的顺序排列，每个框依次为边框、标签背景、标签文本，
  /// 重叠的标签按从左到右的顺序叠放。
  pub fn render_live(&self, boxes: &[BoundingBox], width: u32, height: u32) -> Vec<DrawCommand> {
    let (w, h) = (width as f32, height as f32);
    let scale = PxScale::from(self.style.font_size);
    let padding = self.style.label_padding as i32;

    let mut commands = Vec::with_capacity(boxes.len() * 3);
    for bbox in boxes {
      let rect = PixelRect {
        left: to_pixel(bbox.x1, w),
        top: to_pixel(bbox.y1, h),
        right: to_pixel(bbox.x2, w),
        bottom: to_pixel(bbox.y2, h),
      };
      commands.push(DrawCommand::StrokeRect {
        rect,
        color: self.style.box_color,
        width: self.style.stroke_width,
      });

      let (text_width, text_height) = text_size(scale, &self.font, &bbox.class_name);
      commands.push(DrawCommand::FillRect {
        rect: PixelRect {
          left: rect.left,
          top: rect.top,
          right: rect.left.saturating_add(label_extent(text_width, padding)),
          bottom: rect.top.saturating_add(label_extent(text_height, padding)),
        },
        color: self.style.label_background,
      });
      commands.push(DrawCommand::Text {
        x: rect.left,
        y: rect.top,
        text: bbox.class_name.clone(),
        color: self.style.label_color,
        size: self.style.font_size,
      });
    }
    commands
  }

  /// 在源图像的副本上绘制检测框，源图像保持不变
  pub fn render_baked(&self, boxes: &[BoundingBox], source: &RgbImage) -> RgbImage {
    let mut image = source.clone();
    let commands = self.render_live(boxes, image.width(), image.height());
    self.rasterize(&mut image, &commands);
    image
  }

  /// 将绘制命令光栅化到图像上，超出图像的部分被裁剪
  pub fn rasterize(&self, canvas: &mut RgbImage, commands: &[DrawCommand]) {
    for command in commands {
      match command {
        DrawCommand::StrokeRect { rect, color, width } => {
          let half = (*width / 2) as i32;
          for t in 0..*width as i32 {
            if let Some(edge) = rect.inset(t - half) {
              draw_hollow_rect_mut(canvas, edge, *color);
            }
          }
        }
        DrawCommand::FillRect { rect, color } => {
          if let Some(rect) = rect.to_rect() {
            draw_filled_rect_mut(canvas, rect, *color);
          }
        }
        DrawCommand::Text {
          x,
          y,
          text,
          color,
          size,
        } => {
          draw_text_mut(
            canvas,
            *color,
            *x,
            *y,
            PxScale::from(*size),
            &self.font,
            text,
          );
        }
      }
    }
  }
}
