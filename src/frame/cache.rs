// 该文件是 PlateLens （车牌透镜） 项目的一部分。
// src/frame/cache.rs - 最新帧缓存
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

use std::sync::{
  Arc, Mutex, PoisonError,
  atomic::{AtomicU64, Ordering},
};

use tracing::trace;

use crate::frame::FrameSnapshot;

/// 只保留最新一帧的单槽缓存
///
/// 生产者调用 [`FrameCache::publish`] 无条件覆盖旧帧，从不等待消费者；
/// 消费者调用 [`FrameCache::take`] 得到当前帧的共享引用，
/// 之后即便生产者替换了槽位，消费者手中的快照依旧有效且不会被改写。
#[derive(Debug, Default)]
pub struct FrameCache {
  slot: Mutex<Option<Arc<FrameSnapshot>>>,
  published: AtomicU64,
}

impl FrameCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// 发布新帧并返回分配给它的序号（从 1 开始）
  pub fn publish(&self, frame: FrameSnapshot) -> u64 {
    let (sequence, previous) = {
      // 槽位只存放不可变的 Arc，中毒的锁不会留下半写状态
      let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
      let sequence = self.published.fetch_add(1, Ordering::Relaxed) + 1;
      (sequence, slot.replace(Arc::new(frame.with_sequence(sequence))))
    };

    // 在锁外释放旧帧
    if let Some(previous) = previous {
      trace!("丢弃第 {} 帧", previous.sequence());
    }

    sequence
  }

  /// 读取当前帧，不清空槽位
  pub fn take(&self) -> Option<Arc<FrameSnapshot>> {
    self
      .slot
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// 历史上发布过的帧总数
  pub fn published(&self) -> u64 {
    self.published.load(Ordering::Relaxed)
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use image::{Rgb, RgbImage};

  use super::*;

  fn solid(value: u8) -> FrameSnapshot {
    FrameSnapshot::new(RgbImage::from_pixel(4, 4, Rgb([value, value, value]))).unwrap()
  }

  #[test]
  fn empty_cache_returns_none() {
    let cache = FrameCache::new();
    assert!(cache.take().is_none());
    assert_eq!(cache.published(), 0);
  }

  #[test]
  fn newest_frame_wins() {
    let cache = FrameCache::new();
    cache.publish(solid(1));
    cache.publish(solid(2));

    let frame = cache.take().unwrap();
    assert_eq!(frame.image().get_pixel(0, 0), &Rgb([2, 2, 2]));
    assert_eq!(frame.sequence(), 2);
    assert_eq!(cache.published(), 2);
  }

  #[test]
  fn take_does_not_clear_slot() {
    let cache = FrameCache::new();
    cache.publish(solid(7));
    let a = cache.take().unwrap();
    let b = cache.take().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
  }

  #[test]
  fn held_snapshot_survives_replacement() {
    let cache = FrameCache::new();
    cache.publish(solid(1));
    let held = cache.take().unwrap();
    cache.publish(solid(2));

    assert_eq!(held.image().get_pixel(3, 3), &Rgb([1, 1, 1]));
    assert_eq!(cache.take().unwrap().sequence(), 2);
  }

  #[test]
  fn retains_a_single_frame() {
    let cache = FrameCache::new();
    cache.publish(solid(1));
    let first = cache.take().unwrap();
    let weak = Arc::downgrade(&first);
    drop(first);

    cache.publish(solid(2));
    assert!(weak.upgrade().is_none());
  }

  #[test]
  fn concurrent_publish_and_take_never_tear() {
    let cache = Arc::new(FrameCache::new());
    let producer = {
      let cache = Arc::clone(&cache);
      thread::spawn(move || {
        for value in 0..200u8 {
          cache.publish(solid(value));
        }
      })
    };

    for _ in 0..200 {
      if let Some(frame) = cache.take() {
        let first = *frame.image().get_pixel(0, 0);
        assert!(frame.image().pixels().all(|px| *px == first));
      }
    }

    producer.join().unwrap();
    assert_eq!(cache.published(), 200);
    assert_eq!(cache.take().unwrap().image().get_pixel(0, 0), &Rgb([199, 199, 199]));
  }
}
