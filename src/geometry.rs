// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/geometry.rs - 几何工具：letterbox 变换与框坐标映射
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

use crate::{config::RangeModel, error::InvalidInput};

/// 保持宽高比缩放并居中填充的变换参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
  /// 缩放系数 r = min(target_w / orig_w, target_h / orig_h)
  pub r: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub orig_w: u32,
  pub orig_h: u32,
  /// 缩放后图像在画布中的整数像素区域
  pub resized_w: u32,
  pub resized_h: u32,
  pub offset_x: u32,
  pub offset_y: u32,
}

pub fn compute_letterbox(
  orig_w: u32,
  orig_h: u32,
  target_w: u32,
  target_h: u32,
) -> Result<LetterboxTransform, InvalidInput> {
  if orig_w == 0 || orig_h == 0 {
    return Err(InvalidInput::new(format!(
      "原始尺寸必须大于 0: {}x{}",
      orig_w, orig_h
    )));
  }
  if target_w == 0 || target_h == 0 {
    return Err(InvalidInput::new(format!(
      "目标尺寸必须大于 0: {}x{}",
      target_w, target_h
    )));
  }

  let (ow, oh) = (orig_w as f32, orig_h as f32);
  let (tw, th) = (target_w as f32, target_h as f32);
  let r = (tw / ow).min(th / oh);

  let resized_w = ((ow * r).round() as u32).clamp(1, target_w);
  let resized_h = ((oh * r).round() as u32).clamp(1, target_h);

  Ok(LetterboxTransform {
    r,
    pad_x: (tw - ow * r) / 2.0,
    pad_y: (th - oh * r) / 2.0,
    orig_w,
    orig_h,
    resized_w,
    resized_h,
    offset_x: (target_w - resized_w) / 2,
    offset_y: (target_h - resized_h) / 2,
  })
}

/// 模型空间 [x_min, y_min, x_max, y_max] 映射回原图并裁剪到图像范围内
pub fn map_box_to_original(bbox: [f32; 4], t: &LetterboxTransform) -> [f32; 4] {
  let max_x = t.orig_w.saturating_sub(1) as f32;
  let max_y = t.orig_h.saturating_sub(1) as f32;
  [
    ((bbox[0] - t.pad_x) / t.r).clamp(0.0, max_x),
    ((bbox[1] - t.pad_y) / t.r).clamp(0.0, max_y),
    ((bbox[2] - t.pad_x) / t.r).clamp(0.0, max_x),
    ((bbox[3] - t.pad_y) / t.r).clamp(0.0, max_y),
  ]
}

/// 原图坐标映射到模型空间，不做裁剪
pub fn map_box_to_model(bbox: [f32; 4], t: &LetterboxTransform) -> [f32; 4] {
  [
    bbox[0] * t.r + t.pad_x,
    bbox[1] * t.r + t.pad_y,
    bbox[2] * t.r + t.pad_x,
    bbox[3] * t.r + t.pad_y,
  ]
}

#[inline]
pub fn xywh_to_corners(cx: f32, cy: f32, w: f32, h: f32) -> [f32; 4] {
  [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
}

/// 两个角点形式框的交并比
#[inline]
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 根据原图中的框高度估计目标距离（米），保留两位小数
pub fn estimate_distance(box_height: f32, model: &RangeModel) -> Option<f32> {
  if box_height <= 0.0 || !box_height.is_finite() {
    return None;
  }

  let d0 = model.focal / box_height;
  let b = -(model.c1 + d0);
  let c = model.c1 + model.a1;
  let discriminant = b * b - 4.0 * c;
  if discriminant < 0.0 {
    return None;
  }

  let root = (-b + discriminant.sqrt()) / 2.0;
  Some((root * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  const EPS: f32 = 1e-3;

  fn assert_box_eq(a: [f32; 4], b: [f32; 4]) {
    for i in 0..4 {
      assert!((a[i] - b[i]).abs() < EPS, "{:?} != {:?}", a, b);
    }
  }

  #[test]
  fn letterbox_wide_image_pads_vertically() {
    let t = compute_letterbox(1280, 720, 640, 640).unwrap();
    assert!((t.r - 0.5).abs() < f32::EPSILON);
    assert_eq!(t.pad_x, 0.0);
    assert!((t.pad_y - 140.0).abs() < EPS);
    assert_eq!((t.resized_w, t.resized_h), (640, 360));
    assert_eq!((t.offset_x, t.offset_y), (0, 140));
  }

  #[test]
  fn letterbox_tall_image_pads_horizontally() {
    let t = compute_letterbox(300, 600, 640, 640).unwrap();
    assert!((t.r - 640.0 / 600.0).abs() < 1e-6);
    assert_eq!(t.resized_h, 640);
    assert_eq!(t.resized_w, 320);
    assert_eq!(t.offset_x, 160);
    assert!((t.pad_x - 160.0).abs() < EPS);
  }

  #[test]
  fn letterbox_rejects_zero_dimensions() {
    assert!(compute_letterbox(0, 10, 640, 640).is_err());
    assert!(compute_letterbox(10, 0, 640, 640).is_err());
    assert!(compute_letterbox(10, 10, 0, 640).is_err());
  }

  #[test]
  fn mapping_round_trips_inside_image() {
    for &(w, h) in &[(1280u32, 720u32), (300, 600), (640, 640), (17, 911), (1, 1)] {
      let t = compute_letterbox(w, h, 640, 480).unwrap();
      let max_x = (w - 1) as f32;
      let max_y = (h - 1) as f32;
      let original = [max_x * 0.1, max_y * 0.2, max_x * 0.7, max_y * 0.9];
      let model = map_box_to_model(original, &t);
      let back = map_box_to_original(model, &t);
      assert_box_eq(back, original);
    }
  }

  #[test]
  fn mapping_clamps_overshooting_boxes() {
    let t = compute_letterbox(1280, 720, 640, 640).unwrap();
    let back = map_box_to_original([-50.0, 10.0, 700.0, 630.0], &t);
    assert_eq!(back[0], 0.0);
    // 上方填充区域映射到负坐标后被裁剪
    assert_eq!(back[1], 0.0);
    assert_eq!(back[2], 1279.0);
    assert_eq!(back[3], 719.0);
    for v in back {
      assert!(v >= 0.0);
    }
  }

  #[test]
  fn mapping_onto_empty_image_clamps_to_origin() {
    let t = LetterboxTransform {
      r: 1.0,
      pad_x: 0.0,
      pad_y: 0.0,
      orig_w: 0,
      orig_h: 0,
      resized_w: 1,
      resized_h: 1,
      offset_x: 0,
      offset_y: 0,
    };
    assert_eq!(map_box_to_original([5.0, 5.0, 10.0, 10.0], &t), [0.0; 4]);
  }

  #[test]
  fn iou_handles_overlap_and_degenerate_boxes() {
    let a = [0.0, 0.0, 10.0, 10.0];
    assert!((iou(&a, &a) - 1.0).abs() < f32::EPSILON);
    assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
    let half = [5.0, 0.0, 15.0, 10.0];
    assert!((iou(&a, &half) - 50.0 / 150.0).abs() < 1e-6);
    let point = [3.0, 3.0, 3.0, 3.0];
    assert_eq!(iou(&point, &point), 0.0);
  }

  #[test]
  fn corners_from_center_form() {
    assert_eq!(xywh_to_corners(10.0, 20.0, 4.0, 6.0), [8.0, 17.0, 12.0, 23.0]);
  }

  #[test]
  fn distance_estimate_matches_reference_formula() {
    let d = estimate_distance(100.0, &RangeModel::default()).unwrap();
    assert!((d - 16.64).abs() < 1e-3, "{}", d);
    assert_eq!(estimate_distance(0.0, &RangeModel::default()), None);
    assert_eq!(estimate_distance(-4.0, &RangeModel::default()), None);
  }
}
