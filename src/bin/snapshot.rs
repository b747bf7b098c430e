// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/bin/snapshot.rs - 单次抓拍识别
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

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use platelens::{
  FromUrl,
  display::LogDisplay,
  input::InputWrapper,
  model::RecordModel,
  output::{OutputWrapper, draw::Draw},
  postprocess::{PostprocessConfig, RegionFilter, default_exclude, verify::verify_counts},
  task::{Controller, Pipeline, PipelineConfig},
};

/// 发布若干帧后触发一次识别
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测结果记录，如 record:///data/plate.txt
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，如 image:///data/plate.jpg?rotation=90
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，如 folder:///data/out?record
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 触发前发布的帧数，只有最后一帧参与识别
  #[arg(long, default_value = "1", value_name = "FRAME_NUMBER")]
  pub frame_number: usize,

  #[arg(long, default_value = "0.15")]
  pub min_x1: f32,
  #[arg(long, default_value = "0.85")]
  pub max_x1: f32,
  #[arg(long, default_value = "0.2")]
  pub min_y1: f32,
  #[arg(long, default_value = "0.8")]
  pub max_y1: f32,

  /// 不参与车牌文本的类别，逗号分隔；缺省为 car 和 .
  #[arg(long, value_delimiter = ',', value_name = "CLASS")]
  pub exclude: Vec<String>,

  /// 水平镜像（前置摄像头）
  #[arg(long)]
  pub mirror: bool,
  /// 实时叠加层不显示检测框
  #[arg(long)]
  pub no_live_overlay: bool,

  /// 叠加层宽度
  #[arg(long, default_value = "640")]
  pub width: u32,
  /// 叠加层高度
  #[arg(long, default_value = "480")]
  pub height: u32,

  /// 期望的车牌文本，用于核对各字符的检测数量
  #[arg(long, value_name = "PLATE")]
  pub expect: Option<String>,
}

impl Args {
  fn pipeline_config(&self) -> PipelineConfig {
    let exclude = if self.exclude.is_empty() {
      default_exclude()
    } else {
      self.exclude.iter().cloned().collect()
    };
    PipelineConfig {
      postprocess: PostprocessConfig {
        region: RegionFilter {
          min_x1: self.min_x1,
          max_x1: self.max_x1,
          min_y1: self.min_y1,
          max_y1: self.max_y1,
        },
        exclude,
      },
      mirror: self.mirror,
      live_overlay: !self.no_live_overlay,
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测结果记录: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let model = RecordModel::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let draw = Draw::new()?;

  let pipeline = Arc::new(Pipeline::new(model, output, draw, args.pipeline_config()));
  for raw in input.take(args.frame_number) {
    pipeline.on_frame(&raw);
  }

  let mut controller = Controller::new(pipeline, LogDisplay::new(args.width, args.height));
  controller.trigger();
  let results = controller.wait();

  let Some(result) = results.into_iter().next() else {
    bail!("没有得到识别结果");
  };
  let report = result?;

  info!(
    "第 {} 帧识别结果: '{}', 耗时 {}ms, 已保存: {}",
    report.sequence, report.annotation.plate_text, report.inference_time_ms, report.persisted
  );

  if let Some(expect) = &args.expect {
    let mut expected = BTreeMap::new();
    for c in expect.chars() {
      *expected.entry(c.to_string()).or_insert(0) += 1;
    }
    let counts = verify_counts(&report.annotation.filtered_boxes, &expected);
    if counts.is_ok() {
      info!("检测数量与 '{}' 一致", expect);
    } else {
      warn!("检测数量与 '{}' 不一致: {}", expect, counts);
    }
  }

  controller.shutdown();
  Ok(())
}
