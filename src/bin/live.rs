// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/bin/live.rs - 连续画面与周期触发
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc,
  },
  thread,
  time::{Duration, Instant},
};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use platelens::{
  FromUrl,
  display::LogDisplay,
  input::InputWrapper,
  model::RecordModel,
  output::{OutputWrapper, draw::Draw},
  postprocess::{PostprocessConfig, RegionFilter, default_exclude},
  task::{Controller, Pipeline, PipelineConfig, TriggerOutcome},
};

/// 生产者线程按帧率回放画面，界面线程每隔若干帧触发一次识别
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测结果记录，如 record:///data/plate.txt
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，如 folder:///data/frames?rotation=90&repeat
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，如 folder:///data/out?record
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 最大回放帧数，缺省时直到输入结束
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 回放帧率
  #[arg(long, default_value = "30")]
  pub fps: u32,
  /// 每发布多少帧触发一次识别
  #[arg(long, default_value = "30", value_name = "FRAMES")]
  pub trigger_every: u64,

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

  #[arg(long, default_value = "640")]
  pub width: u32,
  #[arg(long, default_value = "480")]
  pub height: u32,
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

  let (tx, rx) = mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
  })?;

  let running = Arc::new(AtomicBool::new(true));
  let frame_interval = Duration::from_secs(1) / args.fps.max(1);
  let frame_limit = args.frame_number.unwrap_or(usize::MAX);
  let producer = {
    let pipeline = Arc::clone(&pipeline);
    let running = Arc::clone(&running);
    thread::spawn(move || {
      let mut now = Instant::now();
      for raw in input.take(frame_limit) {
        if !running.load(Ordering::Relaxed) {
          break;
        }
        pipeline.on_frame(&raw);

        let elapsed = now.elapsed();
        if elapsed < frame_interval {
          thread::sleep(frame_interval - elapsed);
        }
        now = Instant::now();
      }
      info!("输入结束，生产者线程退出");
    })
  };

  let mut controller = Controller::new(pipeline, LogDisplay::new(args.width, args.height));
  let trigger_every = args.trigger_every.max(1);
  let mut next_trigger = trigger_every;
  loop {
    if rx.try_recv().is_ok() {
      break;
    }

    let published = controller.pipeline().cache().published();
    if published >= next_trigger {
      if controller.trigger() == TriggerOutcome::Started {
        info!("已发布 {} 帧，触发识别", published);
      }
      next_trigger = published + trigger_every;
    }

    for result in controller.poll() {
      if let Err(e) = result {
        warn!("本次识别没有结果: {}", e);
      }
    }

    if producer.is_finished() {
      break;
    }
    thread::sleep(Duration::from_millis(10));
  }

  running.store(false, Ordering::Relaxed);
  if producer.join().is_err() {
    warn!("生产者线程异常退出");
  }
  let shown = controller.shutdown();
  let last_plate = shown.last_plate().unwrap_or("-");
  info!("最后识别的车牌: {}", last_plate);
  Ok(())
}
