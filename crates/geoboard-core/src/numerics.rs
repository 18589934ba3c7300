//! 数值方法
//!
//! - 中心差分求导
//! - Neville 插值（重心形式）
//! - 一维有界极小化（黄金分割）

use crate::math::binomial;

/// 数值导数的步长
const DIFF_STEP: f64 = 1e-5;

/// 黄金分割搜索的最大迭代次数
const MINIMIZE_MAX_ITER: usize = 100;

/// 中心差分计算 `f'(x)`
pub fn derivative<F>(f: F, x: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    (f(x + DIFF_STEP) - f(x - DIFF_STEP)) / (2.0 * DIFF_STEP)
}

/// 穿过一组控制点的 Neville 插值曲线
///
/// 参数 `t` 的取值范围是 `[0, n - 1]`，`t = i` 时正好经过第 `i` 个控制点。
#[derive(Debug, Clone)]
pub struct NevillePath {
    points: Vec<[f64; 2]>,
    weights: Vec<f64>,
}

impl NevillePath {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        let n = points.len().saturating_sub(1);
        let weights = (0..points.len())
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                binomial(n, i) * sign
            })
            .collect();
        Self { points, weights }
    }

    /// 参数上限 `n - 1`
    pub fn max_t(&self) -> f64 {
        self.points.len().saturating_sub(1) as f64
    }

    /// 在参数 `t` 处求值
    pub fn eval(&self, t: f64) -> [f64; 2] {
        if self.points.is_empty() {
            return [f64::NAN, f64::NAN];
        }

        let mut num_x = 0.0;
        let mut num_y = 0.0;
        let mut den = 0.0;
        for (i, (p, w)) in self.points.iter().zip(&self.weights).enumerate() {
            let d = t - i as f64;
            if d.abs() < f64::EPSILON {
                return *p;
            }
            let s = w / d;
            num_x += s * p[0];
            num_y += s * p[1];
            den += s;
        }
        [num_x / den, num_y / den]
    }
}

/// 在 `[a, b]` 上求 `f` 的极小点（黄金分割搜索）
pub fn minimize<F>(f: F, mut a: f64, mut b: f64, tol: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);

    for _ in 0..MINIMIZE_MAX_ITER {
        if (b - a).abs() < tol {
            break;
        }
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = f(d);
        }
    }
    (a + b) / 2.0
}
