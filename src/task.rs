// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/task.rs - 帧流与触发事件的调度
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

//! 两个事件源：
//!
//! - 帧事件：生产者线程调用 [`Pipeline::on_frame`]，变换后写入最新帧缓存，从不等待消费者；
//! - 触发事件：界面线程调用 [`Controller::trigger`]，在工作线程上完成推理、后处理、
//!   烘焙渲染与保存，结果经通道送回界面线程，由 [`Controller::poll`] 绘制实时叠加层并通知。
//!
//! 同一时刻最多只有一次检测在进行，期间到达的触发会被合并（忽略）。

use std::{
  error::Error as StdError,
  fmt,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver, Sender},
  },
  thread::{self, JoinHandle},
};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  display::DisplaySurface,
  frame::{FrameCache, RawFrame, transform},
  model::Model,
  output::{JPEG_MIME, Store, draw::Draw},
  postprocess::{AnnotationResult, PostprocessConfig},
};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
  pub postprocess: PostprocessConfig,
  /// 前置摄像头需要水平镜像
  pub mirror: bool,
  /// 关闭时实时叠加层只被清空，检测框只出现在保存的图像上
  pub live_overlay: bool,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      postprocess: PostprocessConfig::default(),
      mirror: false,
      live_overlay: true,
    }
  }
}

#[derive(Error, Debug)]
pub enum TriggerError {
  #[error("没有可用的帧")]
  NoFrameAvailable,
  #[error("上一次检测尚未完成")]
  Busy,
  #[error("推理不可用: {0}")]
  InferenceUnavailable(#[source] Box<dyn StdError + Send + Sync>),
}

/// 一次触发的结果
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
  /// 参与检测的帧序号
  pub sequence: u64,
  pub annotation: AnnotationResult,
  pub inference_time_ms: u64,
  /// 标注图像是否保存成功
  pub persisted: bool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
  fn acquire(flag: &'a AtomicBool) -> Option<Self> {
    flag
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Self(flag))
  }
}

impl Drop for InFlightGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

pub struct Pipeline<M, S> {
  cache: FrameCache,
  model: M,
  store: S,
  draw: Draw,
  config: PipelineConfig,
  in_flight: AtomicBool,
}

impl<M, S> Pipeline<M, S>
where
  M: Model,
  M::Error: StdError + Send + Sync + 'static,
  S: Store,
  S::Error: fmt::Display,
{
  pub fn new(model: M, store: S, draw: Draw, config: PipelineConfig) -> Self {
    Self {
      cache: FrameCache::new(),
      model,
      store,
      draw,
      config,
      in_flight: AtomicBool::new(false),
    }
  }

  pub fn cache(&self) -> &FrameCache {
    &self.cache
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn draw(&self) -> &Draw {
    &self.draw
  }

  pub fn is_busy(&self) -> bool {
    self.in_flight.load(Ordering::Acquire)
  }

  /// 帧事件：变换后发布到缓存，返回帧序号；变换失败的帧被丢弃
  pub fn on_frame(&self, raw: &RawFrame) -> Option<u64> {
    match transform(raw, self.config.mirror) {
      Ok(snapshot) => Some(self.cache.publish(snapshot)),
      Err(e) => {
        warn!("丢弃无法变换的帧: {}", e);
        None
      }
    }
  }

  /// 触发事件：取最新帧，推理、后处理、烘焙渲染并保存
  ///
  /// 保存失败只记录日志，不影响返回的结果。
  pub fn detect(&self) -> Result<DetectionReport, TriggerError> {
    let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(TriggerError::Busy)?;

    let frame = self.cache.take().ok_or(TriggerError::NoFrameAvailable)?;
    info!(
      "开始检测第 {} 帧 ({}x{}), 已发布 {} 帧",
      frame.sequence(),
      frame.width(),
      frame.height(),
      self.cache.published()
    );

    let detection = self
      .model
      .infer(&frame)
      .map_err(|e| TriggerError::InferenceUnavailable(Box::new(e)))?;
    info!(
      "推理完成，耗时: {}ms, 检测到 {} 个对象",
      detection.inference_time_ms,
      detection.len()
    );

    let annotation = self.config.postprocess.process(&detection);
    let baked = self.draw.render_baked(&annotation.filtered_boxes, frame.image());

    let name = suggested_name();
    let persisted = match self
      .store
      .store_with_result(&baked, &name, JPEG_MIME, &annotation)
    {
      Ok(()) => true,
      Err(e) => {
        error!("保存标注图像 {} 失败: {}", name, e);
        false
      }
    };

    Ok(DetectionReport {
      sequence: frame.sequence(),
      annotation,
      inference_time_ms: detection.inference_time_ms,
      persisted,
    })
  }
}

fn suggested_name() -> String {
  format!("plate_{}.jpg", Utc::now().timestamp_millis())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
  Started,
  /// 已有检测在进行，本次触发被忽略
  Coalesced,
}

type TriggerResult = Result<DetectionReport, TriggerError>;

/// 界面线程一侧的控制器
pub struct Controller<M, S, D> {
  pipeline: Arc<Pipeline<M, S>>,
  display: D,
  tx: Sender<TriggerResult>,
  rx: Receiver<TriggerResult>,
  worker: Option<JoinHandle<()>>,
}

impl<M, S, D> Controller<M, S, D>
where
  M: Model + Send + Sync + 'static,
  M::Error: StdError + Send + Sync + 'static,
  S: Store + Send + Sync + 'static,
  S::Error: fmt::Display,
  D: DisplaySurface,
{
  pub fn new(pipeline: Arc<Pipeline<M, S>>, display: D) -> Self {
    let (tx, rx) = mpsc::channel();
    Self {
      pipeline,
      display,
      tx,
      rx,
      worker: None,
    }
  }

  pub fn pipeline(&self) -> &Arc<Pipeline<M, S>> {
    &self.pipeline
  }

  pub fn display(&self) -> &D {
    &self.display
  }

  /// 在工作线程上启动一次检测
  pub fn trigger(&mut self) -> TriggerOutcome {
    let running = self
      .worker
      .as_ref()
      .is_some_and(|worker| !worker.is_finished());
    if running || self.pipeline.is_busy() {
      debug!("检测进行中，忽略本次触发");
      return TriggerOutcome::Coalesced;
    }

    self.reap();
    let pipeline = Arc::clone(&self.pipeline);
    let tx = self.tx.clone();
    self.worker = Some(thread::spawn(move || {
      // 控制器已关闭时接收端不存在，结果直接丢弃
      let _ = tx.send(pipeline.detect());
    }));
    TriggerOutcome::Started
  }

  /// 处理所有已完成的检测结果，必须在界面线程上调用
  pub fn poll(&mut self) -> Vec<TriggerResult> {
    let results: Vec<TriggerResult> = self.rx.try_iter().collect();
    for result in &results {
      self.apply(result);
    }
    results
  }

  /// 等待正在进行的检测结束后再处理结果
  pub fn wait(&mut self) -> Vec<TriggerResult> {
    self.reap();
    self.poll()
  }

  /// 关闭控制器，等待进行中的检测完成
  pub fn shutdown(mut self) -> D {
    self.reap();
    self.poll();
    self.display
  }

  fn reap(&mut self) {
    if let Some(worker) = self.worker.take()
      && worker.join().is_err()
    {
      error!("检测线程异常退出");
    }
  }

  fn apply(&mut self, result: &TriggerResult) {
    match result {
      Ok(report) => {
        self.display.update_inference_time(report.inference_time_ms);

        let commands = if self.pipeline.config().live_overlay {
          let (width, height) = self.display.surface_size();
          self
            .pipeline
            .draw()
            .render_live(&report.annotation.filtered_boxes, width, height)
        } else {
          Vec::new()
        };
        self.display.update_overlay(&commands);
        self.display.notify(&report.annotation.plate_text);
      }
      Err(TriggerError::NoFrameAvailable) => {
        warn!("没有可用于检测的帧");
      }
      Err(TriggerError::Busy) => {
        debug!("检测进行中，触发已合并");
      }
      Err(TriggerError::InferenceUnavailable(e)) => {
        error!("推理不可用，等待下一次触发: {}", e);
      }
    }
  }
}
