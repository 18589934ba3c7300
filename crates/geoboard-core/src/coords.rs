//! 坐标表示
//!
//! 每个坐标同时保存屏幕坐标系与用户坐标系下的齐次三元组，
//! 两者通过视口的仿射映射（原点、单位长度、y 轴翻转）保持一致。
//! 修改任何一侧都会重新计算另一侧。

use crate::math::{Homogeneous, EPSILON};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// 坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordFrame {
    /// 用户坐标（仿射坐标）
    User,
    /// 屏幕坐标（像素，y 轴向下）
    Screen,
}

/// 视口：用户坐标与屏幕坐标之间的仿射映射
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// 用户坐标原点在屏幕上的位置（像素）
    pub origin_x: f64,
    pub origin_y: f64,
    /// 每个用户单位对应的像素数
    pub unit_x: f64,
    pub unit_y: f64,
    /// 画布尺寸（像素）
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            origin_x: 250.0,
            origin_y: 250.0,
            unit_x: 50.0,
            unit_y: 50.0,
            width: 500.0,
            height: 500.0,
        }
    }
}

impl Viewport {
    /// 用户坐标 -> 屏幕坐标
    pub fn usr_to_scr(&self, usr: &Homogeneous) -> Homogeneous {
        Vector3::new(
            usr[0],
            usr[0] * self.origin_x + usr[1] * self.unit_x,
            usr[0] * self.origin_y - usr[2] * self.unit_y,
        )
    }

    /// 屏幕坐标 -> 用户坐标（结果总是 `w = 1`）
    pub fn scr_to_usr(&self, scr: &Homogeneous) -> Homogeneous {
        Vector3::new(
            1.0,
            (scr[1] - self.origin_x) / self.unit_x,
            (self.origin_y - scr[2]) / self.unit_y,
        )
    }

    /// 用户坐标系下的直线标准式换算到屏幕坐标系
    pub fn line_to_screen(&self, stdform: &Homogeneous) -> Homogeneous {
        Vector3::new(
            stdform[0] - stdform[1] * self.origin_x / self.unit_x
                + stdform[2] * self.origin_y / self.unit_y,
            stdform[1] / self.unit_x,
            -stdform[2] / self.unit_y,
        )
    }
}

/// 双坐标系下的齐次坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coords {
    /// 用户坐标 `(w, x, y)`
    pub usr_coords: Homogeneous,
    /// 屏幕坐标 `(w, x, y)`
    pub scr_coords: Homogeneous,
}

impl Coords {
    /// 由仿射坐标构造
    pub fn new(frame: CoordFrame, xy: [f64; 2], viewport: &Viewport) -> Self {
        Self::from_homogeneous(frame, Vector3::new(1.0, xy[0], xy[1]), viewport)
    }

    /// 由齐次坐标构造
    pub fn from_homogeneous(frame: CoordFrame, c: Homogeneous, viewport: &Viewport) -> Self {
        let mut coords = Self {
            usr_coords: Vector3::new(1.0, 0.0, 0.0),
            scr_coords: Vector3::new(1.0, 0.0, 0.0),
        };
        coords.set_homogeneous(frame, c, viewport);
        coords
    }

    /// 设置仿射坐标
    pub fn set(&mut self, frame: CoordFrame, xy: [f64; 2], viewport: &Viewport) {
        self.set_homogeneous(frame, Vector3::new(1.0, xy[0], xy[1]), viewport);
    }

    /// 设置齐次坐标
    ///
    /// 用户坐标在 `|w| > ε` 时归一化到 `w = 1`；屏幕坐标只取 x, y 分量。
    pub fn set_homogeneous(&mut self, frame: CoordFrame, c: Homogeneous, viewport: &Viewport) {
        match frame {
            CoordFrame::User => {
                self.usr_coords = c;
                self.normalize_usr_coords();
                self.scr_coords = viewport.usr_to_scr(&self.usr_coords);
            }
            CoordFrame::Screen => {
                self.scr_coords = Vector3::new(1.0, c[1], c[2]);
                self.usr_coords = viewport.scr_to_usr(&self.scr_coords);
            }
        }
    }

    fn normalize_usr_coords(&mut self) {
        let w = self.usr_coords[0];
        if w.abs() > EPSILON {
            self.usr_coords = Vector3::new(1.0, self.usr_coords[1] / w, self.usr_coords[2] / w);
        }
    }

    /// 视口变化后重算屏幕坐标
    pub fn refresh_screen(&mut self, viewport: &Viewport) {
        self.scr_coords = viewport.usr_to_scr(&self.usr_coords);
    }

    /// 指定坐标系下的距离
    ///
    /// 用户坐标系下，若两点的 w 分量差的平方超过 ε²（一有限一无穷远），距离为 +∞。
    pub fn distance(&self, frame: CoordFrame, other: &Coords) -> f64 {
        match frame {
            CoordFrame::User => {
                let c = &self.usr_coords;
                let o = &other.usr_coords;
                let dw = c[0] - o[0];
                let sum = dw * dw;
                if sum > EPSILON * EPSILON {
                    return f64::INFINITY;
                }
                (sum + (c[1] - o[1]).powi(2) + (c[2] - o[2]).powi(2)).sqrt()
            }
            CoordFrame::Screen => {
                let c = &self.scr_coords;
                let o = &other.scr_coords;
                ((c[1] - o[1]).powi(2) + (c[2] - o[2]).powi(2)).sqrt()
            }
        }
    }

    /// 有限且数值有效
    pub fn is_real(&self) -> bool {
        !(self.usr_coords[1] + self.usr_coords[2]).is_nan() && self.usr_coords[0].abs() > EPSILON
    }

    /// 是否为无穷远点
    pub fn is_ideal(&self) -> bool {
        self.usr_coords[0].abs() < EPSILON
    }

    pub fn x(&self) -> f64 {
        self.usr_coords[1]
    }

    pub fn y(&self) -> f64 {
        self.usr_coords[2]
    }

    pub fn user_xy(&self) -> [f64; 2] {
        [self.usr_coords[1], self.usr_coords[2]]
    }

    pub fn screen_xy(&self) -> [f64; 2] {
        [self.scr_coords[1], self.scr_coords[2]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_stay_consistent() {
        let vp = Viewport::default();
        let mut c = Coords::new(CoordFrame::User, [1.0, 2.0], &vp);
        assert_eq!(c.screen_xy(), [300.0, 150.0]);

        c.set(CoordFrame::Screen, [200.0, 300.0], &vp);
        assert!((c.x() + 1.0).abs() < EPSILON);
        assert!((c.y() + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_homogeneous_normalization() {
        let vp = Viewport::default();
        let c = Coords::from_homogeneous(CoordFrame::User, Vector3::new(2.0, 4.0, 6.0), &vp);
        assert_eq!(c.user_xy(), [2.0, 3.0]);
        assert!((c.usr_coords[0] - 1.0).abs() < EPSILON);

        // 无穷远点不做归一化
        let ideal = Coords::from_homogeneous(CoordFrame::User, Vector3::new(0.0, 1.0, 1.0), &vp);
        assert!(ideal.is_ideal());
        assert!(!ideal.is_real());
    }

    #[test]
    fn test_distance_to_ideal_point_is_infinite() {
        let vp = Viewport::default();
        let a = Coords::new(CoordFrame::User, [0.0, 0.0], &vp);
        let b = Coords::from_homogeneous(CoordFrame::User, Vector3::new(0.0, 1.0, 0.0), &vp);
        assert!(a.distance(CoordFrame::User, &b).is_infinite());

        let c = Coords::new(CoordFrame::User, [3.0, 4.0], &vp);
        assert!((a.distance(CoordFrame::User, &c) - 5.0).abs() < EPSILON);
        assert!((a.distance(CoordFrame::Screen, &c) - 250.0).abs() < EPSILON);
    }

    #[test]
    fn test_line_to_screen() {
        let vp = Viewport::default();
        // x = 1
        let l = Vector3::new(-1.0, 1.0, 0.0);
        let s = vp.line_to_screen(&l);
        let p = Coords::new(CoordFrame::User, [1.0, 7.0], &vp);
        let v = s[0] + s[1] * p.scr_coords[1] + s[2] * p.scr_coords[2];
        assert!(v.abs() < EPSILON);
    }
}
