// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/model.rs - 检测结果定义
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

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，原图像素坐标
  /// 估计距离（米），未启用测距时为 `None`
  pub distance: Option<f32>,
}

/// 单张图像的检测结果，顺序为 NMS 保留顺序
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }
}

/// 一批图像的检测结果，与输入按索引对齐
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchDetections {
  /// 是否有任意一张图像检测到目标
  pub found: bool,
  pub results: Vec<DetectResult>,
}

impl BatchDetections {
  pub fn total(&self) -> usize {
    self.results.iter().map(DetectResult::len).sum()
  }
}
