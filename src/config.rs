// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/config.rs - 检测流水线配置
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

use std::{fmt, str::FromStr};

use crate::error::ConfigError;

pub const DEFAULT_INPUT_W: u32 = 640;
pub const DEFAULT_INPUT_H: u32 = 640;
pub const DEFAULT_BATCH_SIZE: usize = 1;
pub const DEFAULT_CLASS_NUM: usize = 80;
pub const DEFAULT_CONF_THRESH: f32 = 0.5;
pub const DEFAULT_NMS_THRESH: f32 = 0.4;
pub const DEFAULT_PAD_VALUE: u8 = 128;
pub const DEFAULT_MAX_DETECTIONS: usize = 1000;

/// 每个检测头的锚框数量
const ANCHORS_PER_CELL: usize = 3;
const HEAD_STRIDES: [u32; 3] = [8, 16, 32];

/// 每一行原始输出前 5 个值: cx, cy, w, h, objectness
pub const ROW_PREFIX: usize = 5;

/// 根据输入尺寸计算锚框网格的输出行数
pub fn anchor_grid_rows(input_w: u32, input_h: u32) -> usize {
  HEAD_STRIDES
    .iter()
    .map(|&s| ANCHORS_PER_CELL * (input_w / s) as usize * (input_h / s) as usize)
    .sum()
}

/// 模型引擎的构建精度，由外部的模型构建工具使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildPrecision {
  #[default]
  Fp32,
  Fp16,
  Int8,
}

impl FromStr for BuildPrecision {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "fp32" | "float32" => Ok(BuildPrecision::Fp32),
      "fp16" | "float16" | "half" => Ok(BuildPrecision::Fp16),
      "int8" => Ok(BuildPrecision::Int8),
      _ => Err(ConfigError::UnknownPrecision(s.to_string())),
    }
  }
}

impl fmt::Display for BuildPrecision {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      BuildPrecision::Fp32 => "fp32",
      BuildPrecision::Fp16 => "fp16",
      BuildPrecision::Int8 => "int8",
    };
    f.write_str(name)
  }
}

/// 单目测距模型参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeModel {
  /// 焦距与目标实际高度的乘积（像素）
  pub focal: f32,
  pub a1: f32,
  pub c1: f32,
}

impl Default for RangeModel {
  fn default() -> Self {
    RangeModel {
      focal: 1650.0,
      a1: 1.62 * 0.18 / 0.71,
      c1: 0.18,
    }
  }
}

/// 检测流水线配置，构造流水线后不可修改
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
  input_w: u32,
  input_h: u32,
  batch_size: usize,
  num_classes: usize,
  conf_thresh: f32,
  nms_thresh: f32,
  output_rows: Option<usize>,
  pad_value: u8,
  max_detections: usize,
  range: Option<RangeModel>,
  precision: BuildPrecision,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    DetectorConfig {
      input_w: DEFAULT_INPUT_W,
      input_h: DEFAULT_INPUT_H,
      batch_size: DEFAULT_BATCH_SIZE,
      num_classes: DEFAULT_CLASS_NUM,
      conf_thresh: DEFAULT_CONF_THRESH,
      nms_thresh: DEFAULT_NMS_THRESH,
      output_rows: None,
      pad_value: DEFAULT_PAD_VALUE,
      max_detections: DEFAULT_MAX_DETECTIONS,
      range: None,
      precision: BuildPrecision::default(),
    }
  }
}

impl DetectorConfig {
  pub fn input_size(mut self, width: u32, height: u32) -> Self {
    self.input_w = width;
    self.input_h = height;
    self
  }

  pub fn batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = num_classes;
    self
  }

  pub fn conf_thresh(mut self, thresh: f32) -> Self {
    self.conf_thresh = thresh;
    self
  }

  pub fn nms_thresh(mut self, thresh: f32) -> Self {
    self.nms_thresh = thresh;
    self
  }

  /// 覆盖每张图像的输出行数，默认按锚框网格计算
  pub fn output_rows(mut self, rows: usize) -> Self {
    self.output_rows = Some(rows);
    self
  }

  pub fn pad_value(mut self, value: u8) -> Self {
    self.pad_value = value;
    self
  }

  pub fn max_detections(mut self, max: usize) -> Self {
    self.max_detections = max;
    self
  }

  pub fn range(mut self, range: Option<RangeModel>) -> Self {
    self.range = range;
    self
  }

  pub fn precision(mut self, precision: BuildPrecision) -> Self {
    self.precision = precision;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.input_w == 0 || self.input_h == 0 {
      return Err(ConfigError::InputSize(self.input_w, self.input_h));
    }
    if self.batch_size == 0 {
      return Err(ConfigError::BatchSize);
    }
    if self.num_classes == 0 {
      return Err(ConfigError::NumClasses);
    }
    if self.rows_per_image() == 0 {
      return Err(ConfigError::OutputRows);
    }
    if self.max_detections == 0 {
      return Err(ConfigError::MaxDetections);
    }
    check_threshold("置信度", self.conf_thresh)?;
    check_threshold("NMS", self.nms_thresh)?;
    Ok(())
  }

  pub fn input_w(&self) -> u32 {
    self.input_w
  }

  pub fn input_h(&self) -> u32 {
    self.input_h
  }

  pub fn batch(&self) -> usize {
    self.batch_size
  }

  pub fn classes(&self) -> usize {
    self.num_classes
  }

  pub fn conf(&self) -> f32 {
    self.conf_thresh
  }

  pub fn nms(&self) -> f32 {
    self.nms_thresh
  }

  pub fn pad(&self) -> u8 {
    self.pad_value
  }

  pub fn detections_limit(&self) -> usize {
    self.max_detections
  }

  pub fn range_model(&self) -> Option<&RangeModel> {
    self.range.as_ref()
  }

  pub fn build_precision(&self) -> BuildPrecision {
    self.precision
  }

  pub fn rows_per_image(&self) -> usize {
    self
      .output_rows
      .unwrap_or_else(|| anchor_grid_rows(self.input_w, self.input_h))
  }

  pub fn row_stride(&self) -> usize {
    ROW_PREFIX + self.num_classes
  }

  /// 单张图像的输入张量长度 (3 × H × W)
  pub fn image_input_len(&self) -> usize {
    3 * self.input_w as usize * self.input_h as usize
  }

  /// 单张图像的输出张量长度 (OUTPUT_SIZE × (5 + NUM_CLASSES))
  pub fn image_output_len(&self) -> usize {
    self.rows_per_image() * self.row_stride()
  }

  pub fn input_len(&self) -> usize {
    self.batch_size * self.image_input_len()
  }

  pub fn output_len(&self) -> usize {
    self.batch_size * self.image_output_len()
  }
}

fn check_threshold(name: &'static str, value: f32) -> Result<(), ConfigError> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(ConfigError::Threshold { name, value })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_rows_match_yolov5_grid() {
    assert_eq!(anchor_grid_rows(640, 640), 25200);
    let config = DetectorConfig::default();
    assert_eq!(config.rows_per_image(), 25200);
    assert_eq!(config.row_stride(), 85);
    assert_eq!(config.input_len(), 3 * 640 * 640);
  }

  #[test]
  fn rows_follow_input_size_unless_overridden() {
    let config = DetectorConfig::default().input_size(320, 320);
    assert_eq!(config.rows_per_image(), 6300);
    let config = config.output_rows(10);
    assert_eq!(config.rows_per_image(), 10);
  }

  #[test]
  fn validate_rejects_bad_values() {
    assert_eq!(
      DetectorConfig::default().batch_size(0).validate(),
      Err(ConfigError::BatchSize)
    );
    assert_eq!(
      DetectorConfig::default().input_size(0, 640).validate(),
      Err(ConfigError::InputSize(0, 640))
    );
    assert!(matches!(
      DetectorConfig::default().conf_thresh(1.5).validate(),
      Err(ConfigError::Threshold { .. })
    ));
    assert!(matches!(
      DetectorConfig::default().nms_thresh(f32::NAN).validate(),
      Err(ConfigError::Threshold { .. })
    ));
    assert_eq!(
      DetectorConfig::default().max_detections(0).validate(),
      Err(ConfigError::MaxDetections)
    );
    assert!(DetectorConfig::default().validate().is_ok());
  }

  #[test]
  fn precision_parses_names() {
    assert_eq!("FP16".parse::<BuildPrecision>(), Ok(BuildPrecision::Fp16));
    assert_eq!("int8".parse::<BuildPrecision>(), Ok(BuildPrecision::Int8));
    assert!("fp64".parse::<BuildPrecision>().is_err());
    assert_eq!(BuildPrecision::Fp32.to_string(), "fp32");
  }
}
