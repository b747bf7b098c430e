// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/model/label.rs - 车牌字符类别表
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

//! 车牌检测模型的类别表：0 为车辆，1 为车牌区域，其余为单个字符。

pub const PLATE_LABELS: [&str; 38] = [
  "car",
  "number_plate",
  "A",
  "B",
  "C",
  "D",
  "E",
  "F",
  "G",
  "H",
  "I",
  "J",
  "K",
  "L",
  "M",
  "N",
  "O",
  "P",
  "Q",
  "R",
  "S",
  "T",
  "U",
  "V",
  "W",
  "X",
  "Y",
  "Z",
  "1",
  "2",
  "3",
  "4",
  "5",
  "6",
  "7",
  "8",
  "9",
  "0",
];

pub fn label_name(id: u32) -> Option<&'static str> {
  PLATE_LABELS.get(id as usize).copied()
}

pub fn label_id(name: &str) -> Option<u32> {
  PLATE_LABELS
    .iter()
    .position(|label| *label == name)
    .map(|id| id as u32)
}
