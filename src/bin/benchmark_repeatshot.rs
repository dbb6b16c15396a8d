// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理基准测试
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use tld_detector::{
  BuildPrecision, DetectorConfig, FromUrl, Pipeline,
  executor::RknnExecutorBuilder,
  input::InputWrapper,
  output::OutputWrapper,
  task::{RepeatShotTask, Task},
};
use tracing::info;

/// 基准测试参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型文件路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，可重复指定
  #[arg(long, value_name = "SOURCE", required = true)]
  pub input: Vec<Url>,
  /// 输出路径，默认只打印日志
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
  pub confidence: f32,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.4, value_name = "THRESHOLD")]
  pub nms_threshold: f32,
  /// 批大小，需与模型一致
  #[arg(long, default_value_t = 1, value_name = "BATCH")]
  pub batch_size: usize,
  /// 模型构建精度: fp32, fp16, int8
  #[arg(long, default_value = "fp32", value_name = "PRECISION")]
  pub precision: BuildPrecision,
  /// 重复次数
  #[arg(long, default_value_t = 1000, value_name = "COUNT")]
  pub times: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("重复次数: {}", args.times);

  let config = DetectorConfig::default()
    .batch_size(args.batch_size)
    .conf_thresh(args.confidence)
    .nms_thresh(args.nms_threshold)
    .precision(args.precision);

  let inputs = args
    .input
    .iter()
    .map(InputWrapper::from_url)
    .collect::<Result<Vec<_>, _>>()?;
  let executor = RknnExecutorBuilder::from_url(&args.model)?.build(&config)?;
  let mut pipeline = Pipeline::new(config, executor)?;
  let output = OutputWrapper::from_url(&args.output)?;

  RepeatShotTask::default()
    .with_times(args.times)
    .run_task(inputs.into_iter().flatten(), &mut pipeline, output)?;

  Ok(())
}
