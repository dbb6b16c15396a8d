// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/error.rs - 错误定义
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

use thiserror::Error;

/// 单张图像几何参数无效，该图像会被跳过
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("输入无效: {reason}")]
pub struct InvalidInput {
  pub reason: String,
}

impl InvalidInput {
  pub fn new(reason: impl Into<String>) -> Self {
    InvalidInput {
      reason: reason.into(),
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("输入尺寸必须大于 0: {0}x{1}")]
  InputSize(u32, u32),
  #[error("批大小必须大于 0")]
  BatchSize,
  #[error("类别数量必须大于 0")]
  NumClasses,
  #[error("输出行数必须大于 0")]
  OutputRows,
  #[error("最大检测数量必须大于 0")]
  MaxDetections,
  #[error("{name} 阈值必须位于 [0, 1] 区间, 实际为 {value}")]
  Threshold { name: &'static str, value: f32 },
  #[error("未知的构建精度: {0}")]
  UnknownPrecision(String),
}

#[derive(Error, Debug)]
pub enum LoadError {
  #[error("模型加载错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  InvalidModel(String),
  #[error("推理后端错误: {0}")]
  Backend(String),
  #[error("模型路径错误: {0}")]
  SchemeMismatch(String),
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("{name} 张量长度不匹配: 配置为 {expected}, 执行器为 {actual}")]
  ShapeMismatch {
    name: &'static str,
    expected: usize,
    actual: usize,
  },
}

#[derive(Error, Debug)]
pub enum DeviceError {
  #[error("输入张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  InputShape { expected: usize, actual: usize },
  #[error("输出张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  OutputShape { expected: usize, actual: usize },
  #[error("主机到设备传输失败: {0}")]
  Upload(String),
  #[error("推理执行失败: {0}")]
  Execute(String),
  #[error("设备到主机传输失败: {0}")]
  Download(String),
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error(transparent)]
  InvalidInput(#[from] InvalidInput),
  #[error("设备错误: {0}")]
  Device(#[from] DeviceError),
  #[error("批次溢出: 容量 {capacity}, 实际 {actual}")]
  BatchOverflow { capacity: usize, actual: usize },
}
