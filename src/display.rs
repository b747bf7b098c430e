// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/display.rs - 界面协作方接口
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

use tracing::{info, warn};

use crate::output::draw::DrawCommand;

/// 持有实时画面的界面，所有方法只在界面线程上调用
pub trait DisplaySurface {
  /// 叠加层当前的像素尺寸
  fn surface_size(&self) -> (u32, u32);
  fn notify(&mut self, plate_text: &str);
  /// 用新的命令替换叠加层内容，空列表即清空叠加层
  fn update_overlay(&mut self, commands: &[DrawCommand]);
  fn update_inference_time(&mut self, ms: u64);
}

/// 只把界面更新写进日志的显示端，供命令行程序使用
#[derive(Debug)]
pub struct LogDisplay {
  width: u32,
  height: u32,
  last_plate: Option<String>,
}

impl LogDisplay {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      width,
      height,
      last_plate: None,
    }
  }

  pub fn last_plate(&self) -> Option<&str> {
    self.last_plate.as_deref()
  }
}

impl DisplaySurface for LogDisplay {
  fn surface_size(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  fn notify(&mut self, plate_text: &str) {
    if plate_text.is_empty() {
      warn!("未识别到车牌");
    } else {
      info!("识别到车牌: {}", plate_text);
    }
    self.last_plate = Some(plate_text.to_string());
  }

  fn update_overlay(&mut self, commands: &[DrawCommand]) {
    let boxes = commands
      .iter()
      .filter(|c| matches!(c, DrawCommand::StrokeRect { .. }))
      .count();
    info!("叠加层更新: {} 个检测框, {} 条绘制命令", boxes, commands.len());
  }

  fn update_inference_time(&mut self, ms: u64) {
    info!("推理耗时: {}ms", ms);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn log_display_remembers_last_plate() {
    let mut shown = LogDisplay::new(640, 480);
    assert_eq!(shown.surface_size(), (640, 480));
    assert_eq!(shown.last_plate(), None);

    shown.notify("BA");
    shown.notify("");
    let last_plate = shown.last_plate().unwrap_or("-");
    info!("最后识别的车牌: {}", last_plate);
    assert_eq!(last_plate, "");
  }
}
