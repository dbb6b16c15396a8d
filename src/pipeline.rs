// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/pipeline.rs - 检测流水线：预处理 → 推理 → 解码
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

use std::time::Instant;

use tracing::{debug, info};

use crate::{
  config::DetectorConfig,
  decode::Decoder,
  error::{DetectError, LoadError},
  executor::Executor,
  frame::BgrFrame,
  model::{BatchDetections, DetectResult},
  preprocess::Preprocessor,
};

/// 检测流水线。输入输出缓冲区在构造时分配一次并在每次调用中复用；
/// `detect` 需要 `&mut self`，因此同一实例同一时刻只有一个批次在执行，
/// 跨线程共享时需由调用方加锁。
pub struct Pipeline<E: Executor> {
  config: DetectorConfig,
  executor: E,
  preprocessor: Preprocessor,
  decoder: Decoder,
  input: Box<[f32]>,
  output: Box<[f32]>,
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<(), LoadError> {
  if expected == actual {
    Ok(())
  } else {
    Err(LoadError::ShapeMismatch {
      name,
      expected,
      actual,
    })
  }
}

impl<E: Executor> Pipeline<E> {
  pub fn new(config: DetectorConfig, executor: E) -> Result<Self, LoadError> {
    config.validate()?;
    check_len("批容量", config.batch(), executor.batch_capacity())?;
    check_len("输入", config.input_len(), executor.input_len())?;
    check_len("输出", config.output_len(), executor.output_len())?;

    info!(
      "创建检测流水线: 输入 {}x{}, 批大小 {}, 类别数 {}, 置信度阈值 {}, NMS 阈值 {}",
      config.input_w(),
      config.input_h(),
      config.batch(),
      config.classes(),
      config.conf(),
      config.nms()
    );

    Ok(Pipeline {
      preprocessor: Preprocessor::new(&config),
      decoder: Decoder::new(&config),
      input: vec![0.0; config.input_len()].into_boxed_slice(),
      output: vec![0.0; config.output_len()].into_boxed_slice(),
      config,
      executor,
    })
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn executor(&self) -> &E {
    &self.executor
  }

  /// 对任意数量的图像做检测，按批容量分批执行；
  /// 结果与输入按索引对齐，无效图像对应空结果
  pub fn detect(&mut self, images: &[BgrFrame]) -> Result<BatchDetections, DetectError> {
    let mut results = Vec::with_capacity(images.len());
    for chunk in images.chunks(self.config.batch()) {
      self.detect_batch(chunk, &mut results)?;
    }

    let found = results.iter().any(|r| !r.is_empty());
    Ok(BatchDetections { found, results })
  }

  fn detect_batch(
    &mut self,
    images: &[BgrFrame],
    results: &mut Vec<DetectResult>,
  ) -> Result<(), DetectError> {
    let now = Instant::now();
    let transforms = self.preprocessor.preprocess(images, &mut self.input)?;
    let preprocessed = now.elapsed();

    if transforms.iter().all(Option::is_none) {
      debug!("批次中没有有效图像，跳过推理");
      results.extend(transforms.iter().map(|_| DetectResult::default()));
      return Ok(());
    }

    self.executor.infer(&self.input, &mut self.output)?;
    let inferred = now.elapsed();

    let per_image = self.config.image_output_len();
    for (raw, transform) in self.output.chunks_exact(per_image).zip(&transforms) {
      let result = match transform {
        Some(t) => self.decoder.decode(raw, t),
        None => DetectResult::default(),
      };
      results.push(result);
    }

    debug!(
      "批次完成: 预处理 {:.2?}, 推理 {:.2?}, 总计 {:.2?}",
      preprocessed,
      inferred - preprocessed,
      now.elapsed()
    );
    Ok(())
  }
}
