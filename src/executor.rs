// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/executor.rs - 推理执行器接口
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

use crate::error::DeviceError;

/// 加速器执行器。同一时刻只有一个批次在执行，`infer` 返回时
/// 主机到设备、推理、设备到主机三个阶段都已完成。
/// 设备资源由实现者持有，在 `Drop` 时释放。
pub trait Executor {
  /// 初始化时协商的批容量
  fn batch_capacity(&self) -> usize;
  /// 输入张量长度: BATCH × 3 × INPUT_H × INPUT_W
  fn input_len(&self) -> usize;
  /// 输出张量长度: BATCH × OUTPUT_SIZE × (5 + NUM_CLASSES)
  fn output_len(&self) -> usize;

  fn infer(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), DeviceError>;
}

impl<E: Executor + ?Sized> Executor for Box<E> {
  fn batch_capacity(&self) -> usize {
    (**self).batch_capacity()
  }

  fn input_len(&self) -> usize {
    (**self).input_len()
  }

  fn output_len(&self) -> usize {
    (**self).output_len()
  }

  fn infer(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), DeviceError> {
    (**self).infer(input, output)
  }
}

/// 调用前的长度检查，供各实现复用
pub fn check_lengths(
  input: &[f32],
  output: &[f32],
  input_len: usize,
  output_len: usize,
) -> Result<(), DeviceError> {
  if input.len() != input_len {
    return Err(DeviceError::InputShape {
      expected: input_len,
      actual: input.len(),
    });
  }
  if output.len() != output_len {
    return Err(DeviceError::OutputShape {
      expected: output_len,
      actual: output.len(),
    });
  }
  Ok(())
}

/// 回放预先录制的输出张量，用于离线校验后处理
pub struct ReplayExecutor {
  batch: usize,
  input_len: usize,
  recorded: Box<[f32]>,
}

impl ReplayExecutor {
  pub fn new(batch: usize, input_len: usize, recorded: Vec<f32>) -> Self {
    Self {
      batch,
      input_len,
      recorded: recorded.into_boxed_slice(),
    }
  }
}

impl Executor for ReplayExecutor {
  fn batch_capacity(&self) -> usize {
    self.batch
  }

  fn input_len(&self) -> usize {
    self.input_len
  }

  fn output_len(&self) -> usize {
    self.recorded.len()
  }

  fn infer(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), DeviceError> {
    check_lengths(input, output, self.input_len, self.recorded.len())?;
    output.copy_from_slice(&self.recorded);
    Ok(())
  }
}

#[cfg(feature = "rknpu")]
mod rknn;
#[cfg(feature = "rknpu")]
pub use self::rknn::{RknnExecutor, RknnExecutorBuilder};
