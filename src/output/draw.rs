// 该文件是 TLD Detector （交通灯检测） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化与记录
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{frame::BgrFrame, model::DetectResult};

const BOX_THICKNESS: i32 = 2;
// 按类别循环使用的边框颜色
const CLASS_COLORS: [[u8; 3]; 12] = [
  [255, 56, 56],   // 红色
  [255, 157, 151], // 粉色
  [255, 112, 31],  // 橙色
  [255, 178, 29],  // 橙黄
  [207, 210, 49],  // 黄绿
  [72, 249, 10],   // 绿色
  [26, 147, 52],   // 深绿
  [0, 212, 187],   // 青色
  [52, 69, 147],   // 深蓝
  [0, 0, 255],     // 蓝色
  [132, 56, 255],  // 紫色
  [255, 55, 199],  // 品红
];

pub struct Draw {
  colors: Vec<Rgb<u8>>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      colors: CLASS_COLORS.iter().copied().map(Rgb).collect(),
    }
  }
}

impl Draw {
  pub fn color_of(&self, class_id: u32) -> Rgb<u8> {
    self.colors[class_id as usize % self.colors.len()]
  }

  pub fn draw_detection(&self, frame: &BgrFrame, result: &DetectResult) -> RgbImage {
    let mut image = frame.to_rgb_image();
    for item in result.items.iter() {
      let color = self.color_of(item.class_id);
      let [x_min, y_min, x_max, y_max] = item.bbox;
      let (x, y) = (x_min.floor() as i32, y_min.floor() as i32);
      let (x2, y2) = (x_max.ceil() as i32, y_max.ceil() as i32);

      // 加粗为 2 像素
      for t in 0..BOX_THICKNESS {
        let w = x2 - x - 2 * t + 1;
        let h = y2 - y - 2 * t + 1;
        if w <= 0 || h <= 0 {
          break;
        }
        let rect = Rect::at(x + t, y + t).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(&mut image, rect, color);
      }
    }
    image
  }
}

/// 文本或 JSON 形式的检测记录
#[cfg(feature = "directory_record")]
pub struct Record {
  pub json: bool,
}

#[cfg(feature = "directory_record")]
impl Record {
  pub fn format(&self, result: &DetectResult) -> String {
    if self.json {
      let items: Vec<serde_json::Value> = result
        .items
        .iter()
        .map(|item| {
          serde_json::json!({
            "class_id": item.class_id,
            "score": item.score,
            "bbox": item.bbox,
            "distance": item.distance,
          })
        })
        .collect();
      serde_json::Value::Array(items).to_string()
    } else {
      result
        .items
        .iter()
        .map(|item| {
          format!(
            "{}, {:.4}, {:.1}, {:.1}, {:.1}, {:.1}",
            item.class_id, item.score, item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3]
          )
        })
        .collect::<Vec<_>>()
        .join("\n")
    }
  }

  pub fn extension(&self) -> &'static str {
    if self.json { "json" } else { "txt" }
  }
}
