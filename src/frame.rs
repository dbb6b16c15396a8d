// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/frame.rs - BGR 帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::InvalidInput;

pub const BGR_CHANNELS: usize = 3;

/// 按行存储的 BGR 交错图像，每行可能带有填充字节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrFrame {
  width: u32,
  height: u32,
  stride: usize,
  data: Box<[u8]>,
}

impl BgrFrame {
  /// 不做校验，畸形帧由 [`BgrFrame::check`] 报告并在批处理中被跳过
  pub fn new(width: u32, height: u32, stride: usize, data: Vec<u8>) -> Self {
    Self {
      width,
      height,
      stride,
      data: data.into_boxed_slice(),
    }
  }

  /// 无行填充的紧凑帧
  pub fn packed(width: u32, height: u32, data: Vec<u8>) -> Self {
    Self::new(width, height, width as usize * BGR_CHANNELS, data)
  }

  /// 纯色帧，颜色按 BGR 顺序给出
  pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Self {
    let data = bgr
      .iter()
      .copied()
      .cycle()
      .take(width as usize * height as usize * BGR_CHANNELS)
      .collect();
    Self::packed(width, height, data)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn stride(&self) -> usize {
    self.stride
  }

  pub fn channels(&self) -> usize {
    BGR_CHANNELS
  }

  pub fn check(&self) -> Result<(), InvalidInput> {
    if self.width == 0 || self.height == 0 {
      return Err(InvalidInput::new(format!(
        "图像尺寸为 {}x{}",
        self.width, self.height
      )));
    }

    let row_len = self.width as usize * BGR_CHANNELS;
    if self.stride < row_len {
      return Err(InvalidInput::new(format!(
        "行跨度 {} 小于行长度 {}",
        self.stride, row_len
      )));
    }

    let required = self.stride * (self.height as usize - 1) + row_len;
    if self.data.len() < required {
      return Err(InvalidInput::new(format!(
        "数据长度不足: 期望至少 {}, 实际 {}",
        required,
        self.data.len()
      )));
    }

    Ok(())
  }

  /// 第 `y` 行的有效像素（不含填充），调用前需通过 `check`
  pub fn row(&self, y: u32) -> &[u8] {
    let start = y as usize * self.stride;
    &self.data[start..start + self.width as usize * BGR_CHANNELS]
  }

  /// 像素值，按 BGR 顺序
  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    let idx = y as usize * self.stride + x as usize * BGR_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 转为 RGB 图像，丢弃行填充，调用前需通过 `check`
  pub fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let [b, g, r] = self.pixel(x, y);
      Rgb([r, g, b])
    })
  }
}

impl From<&RgbImage> for BgrFrame {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let mut data = Vec::with_capacity(width as usize * height as usize * BGR_CHANNELS);
    for pixel in image.pixels() {
      data.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
    }
    BgrFrame::packed(width, height, data)
  }
}

impl AsRef<[u8]> for BgrFrame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn check_rejects_degenerate_frames() {
    assert!(BgrFrame::packed(0, 4, vec![]).check().is_err());
    assert!(BgrFrame::packed(4, 0, vec![]).check().is_err());
    assert!(BgrFrame::new(4, 2, 8, vec![0; 64]).check().is_err());
    assert!(BgrFrame::packed(4, 2, vec![0; 23]).check().is_err());
    assert!(BgrFrame::packed(4, 2, vec![0; 24]).check().is_ok());
  }

  #[test]
  fn rgb_image_is_reordered_to_bgr() {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([1, 2, 3]));
    image.put_pixel(1, 0, Rgb([4, 5, 6]));
    let frame = BgrFrame::from(&image);
    assert_eq!(frame.pixel(0, 0), [3, 2, 1]);
    assert_eq!(frame.pixel(1, 0), [6, 5, 4]);
    assert_eq!(frame.to_rgb_image(), image);
  }

  #[test]
  fn padded_stride_skips_padding_bytes() {
    // 2x2 图像，每行填充 2 字节
    let data = vec![1, 2, 3, 4, 5, 6, 0xEE, 0xEE, 7, 8, 9, 10, 11, 12];
    let frame = BgrFrame::new(2, 2, 8, data);
    assert!(frame.check().is_ok());
    assert_eq!(frame.row(1), &[7, 8, 9, 10, 11, 12]);
    assert_eq!(frame.pixel(1, 0), [4, 5, 6]);
    assert_eq!(*frame.to_rgb_image().get_pixel(0, 1), Rgb([9, 8, 7]));
  }

  #[test]
  fn filled_repeats_color() {
    let frame = BgrFrame::filled(3, 2, [10, 20, 30]);
    assert_eq!(frame.pixel(2, 1), [10, 20, 30]);
    assert_eq!(frame.as_ref().len(), 18);
  }
}
