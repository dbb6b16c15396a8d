// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/decode.rs - 输出解码与非极大值抑制
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

use tracing::debug;

use crate::{
  config::{DetectorConfig, ROW_PREFIX, RangeModel},
  geometry::{LetterboxTransform, estimate_distance, iou, map_box_to_original, xywh_to_corners},
  model::{DetectItem, DetectResult},
};

const OBJECTNESS_IDX: usize = 4;

/// 模型空间中的候选框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

/// 最大类别分数的索引，相同分数取靠前的类别
fn argmax(scores: &[f32]) -> u32 {
  let mut best = 0usize;
  let mut best_score = f32::NEG_INFINITY;
  for (idx, &score) in scores.iter().enumerate() {
    if score > best_score {
      best_score = score;
      best = idx;
    }
  }
  best as u32
}

/// 按 objectness 过滤原始输出行，结尾不完整的行被忽略
pub fn filter_candidates(raw: &[f32], num_classes: usize, conf_threshold: f32) -> Vec<Candidate> {
  raw
    .chunks_exact(ROW_PREFIX + num_classes)
    .filter_map(|row| {
      let objectness = row[OBJECTNESS_IDX];
      // NaN 也在这里被丢弃
      if !(objectness >= conf_threshold) {
        return None;
      }
      Some(Candidate {
        class_id: argmax(&row[ROW_PREFIX..]),
        score: objectness,
        bbox: xywh_to_corners(row[0], row[1], row[2], row[3]),
      })
    })
    .collect()
}

/// 按类别的贪心 NMS，最多保留 `limit` 个
pub fn suppress(mut candidates: Vec<Candidate>, iou_threshold: f32, limit: usize) -> Vec<Candidate> {
  // 稳定排序，相同分数保持扫描顺序
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut suppressed = vec![false; candidates.len()];
  let mut kept = Vec::new();

  for i in 0..candidates.len() {
    if suppressed[i] {
      continue;
    }
    if kept.len() >= limit {
      break;
    }

    let best = candidates[i];
    kept.push(best);

    for (j, other) in candidates.iter().enumerate().skip(i + 1) {
      if !suppressed[j] && other.class_id == best.class_id && iou(&best.bbox, &other.bbox) > iou_threshold
      {
        suppressed[j] = true;
      }
    }
  }

  kept
}

/// 对单张图像的原始输出做过滤与抑制，结果位于模型空间
pub fn decode_and_suppress(
  raw: &[f32],
  num_classes: usize,
  conf_threshold: f32,
  iou_threshold: f32,
) -> Vec<Candidate> {
  let candidates = filter_candidates(raw, num_classes, conf_threshold);
  suppress(candidates, iou_threshold, usize::MAX)
}

/// 把模型输出解码为原图坐标下的检测结果
#[derive(Debug, Clone)]
pub struct Decoder {
  num_classes: usize,
  conf_threshold: f32,
  iou_threshold: f32,
  limit: usize,
  range: Option<RangeModel>,
}

impl Decoder {
  pub fn new(config: &DetectorConfig) -> Self {
    Self {
      num_classes: config.classes(),
      conf_threshold: config.conf(),
      iou_threshold: config.nms(),
      limit: config.detections_limit(),
      range: config.range_model().copied(),
    }
  }

  pub fn decode(&self, raw: &[f32], transform: &LetterboxTransform) -> DetectResult {
    let candidates = filter_candidates(raw, self.num_classes, self.conf_threshold);
    let num_candidates = candidates.len();
    let kept = suppress(candidates, self.iou_threshold, self.limit);
    debug!("候选框 {} 个, NMS 后保留 {} 个", num_candidates, kept.len());

    kept
      .into_iter()
      .map(|c| {
        let bbox = map_box_to_original(c.bbox, transform);
        let distance = self
          .range
          .as_ref()
          .and_then(|model| estimate_distance(bbox[3] - bbox[1], model));
        DetectItem {
          class_id: c.class_id,
          score: c.score,
          bbox,
          distance,
        }
      })
      .collect::<Vec<_>>()
      .into()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::compute_letterbox;

  const CLASSES: usize = 3;

  fn push_row(raw: &mut Vec<f32>, cx: f32, cy: f32, w: f32, h: f32, obj: f32, class: usize) {
    raw.extend_from_slice(&[cx, cy, w, h, obj]);
    for c in 0..CLASSES {
      raw.push(if c == class { 0.9 } else { 0.05 });
    }
  }

  fn push_candidate(raw: &mut Vec<f32>, c: &Candidate) {
    let [x1, y1, x2, y2] = c.bbox;
    push_row(
      raw,
      (x1 + x2) / 2.0,
      (y1 + y2) / 2.0,
      x2 - x1,
      y2 - y1,
      c.score,
      c.class_id as usize,
    );
  }

  /// 若干簇沿 x 方向平移的框，分数沿平移方向递减
  fn clustered_scene() -> Vec<f32> {
    let mut raw = Vec::new();
    for cluster in 0..4 {
      let base_x = 40.0 + cluster as f32 * 120.0;
      let class = cluster % 2;
      for k in 0..6 {
        let score = 0.95 - k as f32 * 0.1;
        push_row(&mut raw, base_x + k as f32 * 3.0, 50.0, 20.0, 20.0, score, class);
      }
    }
    raw
  }

  #[test]
  fn overlapping_same_class_keeps_highest() {
    let mut raw = Vec::new();
    // 两框 IoU = 75 / 125 = 0.6
    push_row(&mut raw, 5.0, 5.0, 10.0, 10.0, 0.9, 1);
    push_row(&mut raw, 7.5, 5.0, 10.0, 10.0, 0.8, 1);
    let kept = decode_and_suppress(&raw, CLASSES, 0.5, 0.45);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].score, 0.9);
    assert_eq!(kept[0].bbox, [0.0, 0.0, 10.0, 10.0]);
  }

  #[test]
  fn different_classes_never_suppress() {
    let mut raw = Vec::new();
    push_row(&mut raw, 5.0, 5.0, 10.0, 10.0, 0.9, 1);
    push_row(&mut raw, 7.5, 5.0, 10.0, 10.0, 0.8, 2);
    let kept = decode_and_suppress(&raw, CLASSES, 0.5, 0.45);
    assert_eq!(kept.len(), 2);
    assert_eq!((kept[0].class_id, kept[1].class_id), (1, 2));
  }

  #[test]
  fn identical_boxes_collapse_to_one() {
    let mut raw = Vec::new();
    for _ in 0..3 {
      push_row(&mut raw, 30.0, 30.0, 8.0, 8.0, 0.7, 0);
    }
    assert_eq!(decode_and_suppress(&raw, CLASSES, 0.5, 0.45).len(), 1);
  }

  #[test]
  fn below_threshold_yields_empty() {
    let mut raw = Vec::new();
    push_row(&mut raw, 30.0, 30.0, 8.0, 8.0, 0.49, 0);
    push_row(&mut raw, 60.0, 30.0, 8.0, 8.0, f32::NAN, 0);
    assert!(decode_and_suppress(&raw, CLASSES, 0.5, 0.45).is_empty());
    assert!(decode_and_suppress(&[], CLASSES, 0.5, 0.45).is_empty());
  }

  #[test]
  fn threshold_is_inclusive_and_score_is_objectness() {
    let mut raw = Vec::new();
    push_row(&mut raw, 30.0, 30.0, 8.0, 8.0, 0.5, 2);
    let kept = decode_and_suppress(&raw, CLASSES, 0.5, 0.45);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].score, 0.5);
    assert_eq!(kept[0].class_id, 2);
  }

  #[test]
  fn equal_scores_keep_scan_order() {
    let mut raw = Vec::new();
    push_row(&mut raw, 100.0, 10.0, 8.0, 8.0, 0.6, 0);
    push_row(&mut raw, 10.0, 10.0, 8.0, 8.0, 0.6, 0);
    push_row(&mut raw, 50.0, 10.0, 8.0, 8.0, 0.8, 0);
    let kept = decode_and_suppress(&raw, CLASSES, 0.5, 0.45);
    let xs: Vec<f32> = kept.iter().map(|c| c.bbox[0]).collect();
    assert_eq!(xs, [46.0, 96.0, 6.0]);
  }

  #[test]
  fn class_ties_pick_first_index() {
    let raw = [10.0, 10.0, 4.0, 4.0, 0.9, 0.3, 0.7, 0.7];
    assert_eq!(decode_and_suppress(&raw, CLASSES, 0.5, 0.45)[0].class_id, 1);
  }

  #[test]
  fn trailing_partial_row_is_ignored() {
    let mut raw = Vec::new();
    push_row(&mut raw, 10.0, 10.0, 4.0, 4.0, 0.9, 0);
    raw.extend_from_slice(&[1.0, 1.0, 1.0, 1.0, 0.99]);
    assert_eq!(decode_and_suppress(&raw, CLASSES, 0.5, 0.45).len(), 1);
  }

  #[test]
  fn suppression_is_idempotent() {
    let raw = clustered_scene();
    let first = decode_and_suppress(&raw, CLASSES, 0.3, 0.45);
    assert!(first.len() > 4);

    let mut rebuilt = Vec::new();
    for c in &first {
      push_candidate(&mut rebuilt, c);
    }
    let second = decode_and_suppress(&rebuilt, CLASSES, 0.3, 0.45);
    assert_eq!(first, second);
  }

  #[test]
  fn thresholds_are_monotonic() {
    let raw = clustered_scene();

    let counts: Vec<usize> = [0.1, 0.3, 0.5, 0.7, 0.9]
      .iter()
      .map(|&conf| decode_and_suppress(&raw, CLASSES, conf, 0.45).len())
      .collect();
    assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{:?}", counts);

    let counts: Vec<usize> = [0.1, 0.3, 0.5, 0.7, 0.9]
      .iter()
      .map(|&nms| decode_and_suppress(&raw, CLASSES, 0.1, nms).len())
      .collect();
    assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{:?}", counts);
    assert_eq!(counts[4], 24);
  }

  #[test]
  fn repeated_runs_are_bit_identical() {
    let raw = clustered_scene();
    let bits = |v: Vec<Candidate>| {
      v.iter()
        .flat_map(|c| {
          let mut b = vec![c.class_id, c.score.to_bits()];
          b.extend(c.bbox.iter().map(|x| x.to_bits()));
          b
        })
        .collect::<Vec<u32>>()
    };
    let a = bits(decode_and_suppress(&raw, CLASSES, 0.2, 0.3));
    let b = bits(decode_and_suppress(&raw, CLASSES, 0.2, 0.3));
    assert_eq!(a, b);
  }

  #[test]
  fn decoder_maps_to_original_and_limits() {
    let config = DetectorConfig::default()
      .input_size(640, 640)
      .num_classes(CLASSES)
      .max_detections(1)
      .range(Some(RangeModel::default()));
    let decoder = Decoder::new(&config);
    let t = compute_letterbox(1280, 720, 640, 640).unwrap();

    let mut raw = Vec::new();
    // 模型空间 [300, 190, 340, 240] → 原图 [600, 100, 680, 200]
    push_row(&mut raw, 320.0, 215.0, 40.0, 50.0, 0.9, 0);
    push_row(&mut raw, 100.0, 300.0, 10.0, 10.0, 0.8, 1);

    let result = decoder.decode(&raw, &t);
    assert_eq!(result.len(), 1);
    let item = &result.items[0];
    assert_eq!(item.bbox, [600.0, 100.0, 680.0, 200.0]);
    let expected = estimate_distance(100.0, &RangeModel::default());
    assert_eq!(item.distance, expected);
  }
}
