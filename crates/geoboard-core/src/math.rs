//! 数学基础
//!
//! 齐次坐标统一用 `Vector3<f64>` 表示，分量顺序为 `(w, x, y)`；
//! 直线的标准式同样用 `Vector3<f64>` 表示，分量顺序为 `(C, A, B)`，
//! 满足 `A·x + B·y + C = 0`。

use nalgebra::{Matrix3, Vector3};
use std::f64::consts::PI;

/// 齐次坐标 `(w, x, y)`
pub type Homogeneous = Vector3<f64>;

/// 3x3 射影变换矩阵，作用于 `(w, x, y)` 列向量
pub type Matrix = Matrix3<f64>;

/// 退化情形判定使用的唯一阈值
pub const EPSILON: f64 = 1e-6;

/// 参数化直线中用来近似无穷远点的放大系数
pub const IDEAL_POINT_SCALE: f64 = 1e5;

/// 由仿射坐标构造齐次坐标
#[inline]
pub fn point(x: f64, y: f64) -> Homogeneous {
    Vector3::new(1.0, x, y)
}

/// 角 ABC（以 B 为顶点，从 BA 逆时针转到 BC），结果位于 [0, 2π)
pub fn rad(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    let phi = (c[1] - b[1]).atan2(c[0] - b[0]) - (a[1] - b[1]).atan2(a[0] - b[0]);
    if phi < 0.0 {
        phi + 2.0 * PI
    } else {
        phi
    }
}

/// 把直线标准式缩放到 `A² + B² = 1`
///
/// `(A, B)` 同时为零时（无穷远直线或退化直线）原样返回。
pub fn normalize_line(l: &Vector3<f64>) -> Vector3<f64> {
    let n = (l[1] * l[1] + l[2] * l[2]).sqrt();
    if n > 0.0 {
        *l / n
    } else {
        *l
    }
}

/// 齐次坐标归一化到 `w = 1`（无穷远点保持不变）
pub fn normalize_point(p: &Vector3<f64>) -> Vector3<f64> {
    if p[0].abs() > EPSILON {
        Vector3::new(1.0, p[1] / p[0], p[2] / p[0])
    } else {
        *p
    }
}

/// 两个仿射点的欧氏距离（只看 x, y 分量）
#[inline]
pub fn distance(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    ((a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

/// 二项式系数
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// 把数值四舍五入到 `step` 的整数倍
#[inline]
pub fn round_to(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}
