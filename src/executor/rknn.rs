// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/executor/rknn.rs - RKNPU 推理执行器
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

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::DetectorConfig,
  error::{DeviceError, LoadError},
  executor::{Executor, check_lengths},
};

const RKNN_NUM_INPUTS: u32 = 1;
const RKNN_NUM_OUTPUTS: u32 = 1;

/// 持有 RKNN 上下文的执行器，上下文释放时一并释放设备内存
pub struct RknnExecutor {
  context: Context,
  batch: usize,
  input_len: usize,
  output_len: usize,
  /// 输入张量的字节暂存区，初始化时一次性分配
  staging: Vec<u8>,
}

pub struct RknnExecutorBuilder {
  model_path: String,
  flags: InitFlags,
}

impl FromUrlWithScheme for RknnExecutorBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnExecutorBuilder {
  type Error = LoadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LoadError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(RknnExecutorBuilder {
      model_path: url.path().to_string(),
      flags: InitFlags::default(),
    })
  }
}

impl RknnExecutorBuilder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn build(self, config: &DetectorConfig) -> Result<RknnExecutor, LoadError> {
    config.validate()?;

    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB, 构建精度: {}",
      model_data.len() as f64 / (1024.0 * 1024.0),
      config.build_precision()
    );

    info!("创建 RKNN 推理上下文");
    let context =
      Context::new(&model_data, self.flags).map_err(|e| LoadError::Backend(e.to_string()))?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(LoadError::InvalidModel(format!("无法查询 SDK 版本: {}", e)));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| LoadError::InvalidModel(format!("无法获取输入数量: {}", e)))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| LoadError::InvalidModel(format!("无法获取输出数量: {}", e)))?;

    if num_inputs != RKNN_NUM_INPUTS || num_outputs != RKNN_NUM_OUTPUTS {
      error!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        RKNN_NUM_INPUTS, RKNN_NUM_OUTPUTS, num_inputs, num_outputs
      );
      return Err(LoadError::InvalidModel(format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        RKNN_NUM_INPUTS, RKNN_NUM_OUTPUTS, num_inputs, num_outputs
      )));
    }
    info!("模型加载完成");

    let input_len = config.input_len();
    Ok(RknnExecutor {
      context,
      batch: config.batch(),
      input_len,
      output_len: config.output_len(),
      staging: Vec::with_capacity(input_len * std::mem::size_of::<f32>()),
    })
  }
}

impl Executor for RknnExecutor {
  fn batch_capacity(&self) -> usize {
    self.batch
  }

  fn input_len(&self) -> usize {
    self.input_len
  }

  fn output_len(&self) -> usize {
    self.output_len
  }

  fn infer(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), DeviceError> {
    check_lengths(input, output, self.input_len, self.output_len)?;

    self.staging.clear();
    for v in input {
      self.staging.extend_from_slice(&v.to_ne_bytes());
    }

    debug!("设置模型输入");
    self
      .context
      .set_input(0, self.staging.as_slice(), TensorFormat::NCHW, TensorType::Float32)
      .map_err(|e| DeviceError::Upload(e.to_string()))?;

    debug!("执行模型推理");
    self
      .context
      .run()
      .map_err(|e| DeviceError::Execute(e.to_string()))?;

    debug!("获取模型输出");
    let outputs = self
      .context
      .get_outputs()
      .map_err(|e| DeviceError::Download(e.to_string()))?;
    let data = outputs
      .get_f32(0)
      .map_err(|e| DeviceError::Download(e.to_string()))?;

    if data.len() != output.len() {
      return Err(DeviceError::OutputShape {
        expected: output.len(),
        actual: data.len(),
      });
    }
    output.copy_from_slice(data);
    Ok(())
  }
}
