// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/task.rs - 检测任务
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

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::{executor::Executor, frame::BgrFrame, output::Render, pipeline::Pipeline};

const WARMUP_RUNS: usize = 2;

pub trait Task<I, E: Executor, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: &mut Pipeline<E>, output: O) -> Result<(), Self::Error>;
}

fn collect_frames<I: Iterator<Item = BgrFrame>>(input: I) -> anyhow::Result<Vec<BgrFrame>> {
  let frames: Vec<BgrFrame> = input.collect();
  if frames.is_empty() {
    anyhow::bail!("没有输入帧");
  }
  info!("获取 {} 帧输入图像", frames.len());
  Ok(frames)
}

pub struct OneShotTask;

impl<E, RE, I, O> Task<I, E, O> for OneShotTask
where
  E: Executor,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = BgrFrame>,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &mut Pipeline<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frames = collect_frames(input)?;
    let now = Instant::now();
    let result = pipeline.detect(&frames)?;
    let elapsed = now.elapsed();
    info!("推理完成，共 {} 个目标，耗时: {:.2?}", result.total(), elapsed);
    output.render_result(&frames, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 重复执行同一批输入，统计平均推理时间（去掉前两次预热）
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }

  pub fn mean_latency(times: &[Duration]) -> Option<Duration> {
    let measured = times.get(WARMUP_RUNS..)?;
    if measured.is_empty() {
      return None;
    }
    Some(measured.iter().sum::<Duration>() / measured.len() as u32)
  }
}

impl<E, RE, I, O> Task<I, E, O> for RepeatShotTask
where
  E: Executor,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = BgrFrame>,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &mut Pipeline<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frames = collect_frames(input)?;
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = Instant::now();
      let result = pipeline.detect(&frames)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frames, &result)?;
      times.push(elapsed);
    }

    match Self::mean_latency(&times) {
      Some(mean) => warn!("平均推理时间: {:.2?}", mean),
      None => warn!("运行次数不足 {} 次，无法统计平均推理时间", WARMUP_RUNS + 1),
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use super::*;
  use crate::{
    config::DetectorConfig,
    executor::ReplayExecutor,
    model::BatchDetections,
  };

  struct CountingOutput<'a> {
    calls: &'a Cell<usize>,
  }

  impl Render for CountingOutput<'_> {
    type Error = std::io::Error;

    fn render_result(&self, frames: &[BgrFrame], result: &BatchDetections) -> Result<(), Self::Error> {
      assert_eq!(frames.len(), result.results.len());
      self.calls.set(self.calls.get() + 1);
      Ok(())
    }
  }

  fn pipeline() -> Pipeline<ReplayExecutor> {
    let config = DetectorConfig::default()
      .input_size(32, 32)
      .num_classes(2)
      .output_rows(4);
    let executor = ReplayExecutor::new(1, config.input_len(), vec![0.0; config.output_len()]);
    Pipeline::new(config, executor).unwrap()
  }

  #[test]
  fn oneshot_renders_once() {
    let calls = Cell::new(0);
    let frames = vec![BgrFrame::filled(8, 8, [0, 0, 0]); 3];
    OneShotTask
      .run_task(frames.into_iter(), &mut pipeline(), CountingOutput { calls: &calls })
      .unwrap();
    assert_eq!(calls.get(), 1);
  }

  #[test]
  fn oneshot_without_frames_fails() {
    let calls = Cell::new(0);
    let result = OneShotTask.run_task(
      std::iter::empty(),
      &mut pipeline(),
      CountingOutput { calls: &calls },
    );
    assert!(result.is_err());
    assert_eq!(calls.get(), 0);
  }

  #[test]
  fn repeatshot_runs_requested_times() {
    let calls = Cell::new(0);
    let frames = vec![BgrFrame::filled(8, 8, [0, 0, 0])];
    RepeatShotTask::default()
      .with_times(5)
      .run_task(frames.into_iter(), &mut pipeline(), CountingOutput { calls: &calls })
      .unwrap();
    assert_eq!(calls.get(), 5);
  }

  #[test]
  fn mean_latency_skips_warmup() {
    let times = [100, 50, 2, 4].map(Duration::from_millis);
    assert_eq!(RepeatShotTask::mean_latency(&times), Some(Duration::from_millis(3)));
    assert_eq!(RepeatShotTask::mean_latency(&times[..2]), None);
  }
}
