//! 画板配置

use crate::coords::Viewport;
use serde::{Deserialize, Serialize};

/// 输入设备，决定命中测试的容差
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputDevice {
    #[default]
    Mouse,
    Touch,
    Pen,
}

/// 各输入设备的命中容差（像素）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Precision {
    pub mouse: f64,
    pub touch: f64,
    pub pen: f64,
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            mouse: 4.0,
            touch: 30.0,
            pen: 4.0,
        }
    }
}

impl Precision {
    pub fn for_device(&self, device: InputDevice) -> f64 {
        match device {
            InputDevice::Mouse => self.mouse,
            InputDevice::Touch => self.touch,
            InputDevice::Pen => self.pen,
        }
    }
}

/// 画板配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// 视口
    pub viewport: Viewport,
    /// 命中容差
    pub precision: Precision,
    /// moveTo / visit / moveAlong 的步进间隔（毫秒）
    pub animation_delay_ms: u64,
    /// 滑动点自动播放的步进间隔（毫秒）
    pub glide_delay_ms: u64,
    /// 没有刻度元素时，网格吸附使用的默认步长
    pub default_tick_step: f64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            precision: Precision::default(),
            animation_delay_ms: 35,
            glide_delay_ms: 250,
            default_tick_step: 1.0,
        }
    }
}

impl BoardConfig {
    /// 从 JSON 文本读取，缺省字段取默认值
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = BoardConfig::from_json(r#"{ "animation_delay_ms": 10, "precision": { "touch": 20.0 } }"#).unwrap();
        assert_eq!(config.animation_delay_ms, 10);
        assert_eq!(config.precision.touch, 20.0);
        assert_eq!(config.precision.mouse, 4.0);
        assert_eq!(config.glide_delay_ms, 250);
    }

    #[test]
    fn test_precision_per_device() {
        let p = Precision::default();
        assert_eq!(p.for_device(InputDevice::Touch), 30.0);
        assert_eq!(p.for_device(InputDevice::Mouse), 4.0);
    }
}
