// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/preprocess.rs - 图像预处理：letterbox 缩放、BGR 转 RGB、归一化、NCHW 打包
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

use image::imageops::{self, FilterType};
use tracing::{debug, warn};

use crate::{
  config::DetectorConfig,
  error::DetectError,
  frame::{BGR_CHANNELS, BgrFrame},
  geometry::{LetterboxTransform, compute_letterbox},
};

pub struct Preprocessor {
  input_w: u32,
  input_h: u32,
  pad: f32,
}

impl Preprocessor {
  pub fn new(config: &DetectorConfig) -> Self {
    Self {
      input_w: config.input_w(),
      input_h: config.input_h(),
      pad: config.pad() as f32 / 255.0,
    }
  }

  fn slot_len(&self) -> usize {
    BGR_CHANNELS * self.plane_len()
  }

  fn plane_len(&self) -> usize {
    self.input_w as usize * self.input_h as usize
  }

  /// 将一批图像写入 `tensor`，返回每张图像的 letterbox 变换；
  /// 无效图像与未使用的批次槽位全部写 0，对应变换为 `None`
  pub fn preprocess(
    &self,
    images: &[BgrFrame],
    tensor: &mut [f32],
  ) -> Result<Vec<Option<LetterboxTransform>>, DetectError> {
    let slot_len = self.slot_len();
    let capacity = tensor.len() / slot_len;
    if images.len() > capacity {
      return Err(DetectError::BatchOverflow {
        capacity,
        actual: images.len(),
      });
    }

    let mut transforms = Vec::with_capacity(images.len());
    for (b, slot) in tensor.chunks_exact_mut(slot_len).enumerate() {
      let Some(image) = images.get(b) else {
        slot.fill(0.0);
        continue;
      };

      match self.letterbox_into(image, slot) {
        Ok(t) => transforms.push(Some(t)),
        Err(e) => {
          warn!("跳过第 {} 张图像: {}", b, e);
          slot.fill(0.0);
          transforms.push(None);
        }
      }
    }

    debug!(
      "预处理完成: {} 张图像, {} 张有效",
      images.len(),
      transforms.iter().filter(|t| t.is_some()).count()
    );
    Ok(transforms)
  }

  fn letterbox_into(
    &self,
    image: &BgrFrame,
    slot: &mut [f32],
  ) -> Result<LetterboxTransform, DetectError> {
    image.check()?;
    let t = compute_letterbox(image.width(), image.height(), self.input_w, self.input_h)?;

    slot.fill(self.pad);

    let rgb = image.to_rgb_image();
    let resized = if rgb.dimensions() == (t.resized_w, t.resized_h) {
      rgb
    } else {
      imageops::resize(&rgb, t.resized_w, t.resized_h, FilterType::Triangle)
    };

    let plane = self.plane_len();
    let (r_plane, rest) = slot.split_at_mut(plane);
    let (g_plane, b_plane) = rest.split_at_mut(plane);
    let width = self.input_w as usize;

    for (y, row) in resized.rows().enumerate() {
      let dst_row = (t.offset_y as usize + y) * width + t.offset_x as usize;
      for (x, pixel) in row.enumerate() {
        let [r, g, b] = pixel.0;
        let idx = dst_row + x;
        r_plane[idx] = r as f32 / 255.0;
        g_plane[idx] = g as f32 / 255.0;
        b_plane[idx] = b as f32 / 255.0;
      }
    }

    Ok(t)
  }
}
