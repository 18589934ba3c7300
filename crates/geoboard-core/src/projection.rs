//! 投影
//!
//! 给定一个点和一个目标图形，求图形上离该点最近的点，必要时同时给出路径参数。
//! 所有函数都在用户坐标下工作，输入输出都是齐次坐标 `(w, x, y)`。

use crate::curve::{Curve, CurveData, Turtle};
use crate::math::{distance, normalize_point, Homogeneous, EPSILON};
use crate::numerics::minimize;
use nalgebra::Vector3;

/// 参数曲线粗搜索的分段数
const CURVE_SEARCH_STEPS: usize = 20;

/// 点到直线的距离
///
/// 直线为 `(C, A, B)`。点为无穷远点或直线退化时返回 NaN。
pub fn dist_point_line(p: &Homogeneous, l: &Homogeneous) -> f64 {
    let n = (l[1] * l[1] + l[2] * l[2]).sqrt();
    if n < EPSILON || p[0].abs() < EPSILON {
        return f64::NAN;
    }
    (l[0] + l[1] * p[1] / p[0] + l[2] * p[2] / p[0]).abs() / n
}

/// 点到直线的垂足
pub fn project_point_to_line(p: &Homogeneous, l: &Homogeneous) -> Homogeneous {
    // 过 p 且垂直于 l 的直线，与 l 求交
    let normal = Vector3::new(0.0, l[1], l[2]);
    let perp = normal.cross(p);
    normalize_point(&perp.cross(l))
}

/// 点到线段（所在直线）的投影，返回投影点和参数 λ（p1 处为 0，p2 处为 1，不截断）
pub fn project_coords_to_segment(p: &Homogeneous, p1: &Homogeneous, p2: &Homogeneous) -> (Homogeneous, f64) {
    let s = [p2[1] - p1[1], p2[2] - p1[2]];
    let v = [p[1] - p1[1], p[2] - p1[2]];
    let len2 = s[0] * s[0] + s[1] * s[1];
    if len2 < EPSILON * EPSILON {
        return (*p1, 0.0);
    }
    let lambda = (v[0] * s[0] + v[1] * s[1]) / len2;
    (
        Vector3::new(1.0, p1[1] + lambda * s[0], p1[2] + lambda * s[1]),
        lambda,
    )
}

/// 点到线段的最近点（截断到端点）
pub fn closest_point_on_segment(p: &Homogeneous, p1: &Homogeneous, p2: &Homogeneous) -> Homogeneous {
    let (q, lambda) = project_coords_to_segment(p, p1, p2);
    if lambda < 0.0 {
        *p1
    } else if lambda > 1.0 {
        *p2
    } else {
        q
    }
}

/// 点到圆的投影
///
/// 点与圆心重合时取圆心右侧的点。
pub fn project_point_to_circle(p: &Homogeneous, center: &Homogeneous, radius: f64) -> Homogeneous {
    let dx = p[1] - center[1];
    let dy = p[2] - center[2];
    let d = (dx * dx + dy * dy).sqrt();
    if d < EPSILON {
        return Vector3::new(1.0, center[1] + radius, center[2]);
    }
    Vector3::new(1.0, center[1] + radius * dx / d, center[2] + radius * dy / d)
}

/// 投影到另一个点，就是与它重合
pub fn project_point_to_point(target: &Homogeneous) -> Homogeneous {
    *target
}

/// 点 (x, y) 到曲线的投影，返回变换前的投影点与参数
///
/// - 参数曲线：先在参数区间上粗搜索，再在最优格点附近做一维极小化，结果循环回区间内
/// - 函数图像：参数就是 x
/// - 采样点折线：逐段投影，取最近的一段
///
/// `(x, y)` 应当已经位于曲线变换前的坐标系。
pub fn project_coords_to_curve(x: f64, y: f64, t0: f64, curve: &Curve) -> (Homogeneous, f64) {
    match &curve.data {
        CurveData::Parametric { .. } => {
            let (min_t, max_t) = (curve.min_t(), curve.max_t());
            let dist2 = |t: f64| {
                let [cx, cy] = curve.raw_point(t);
                (x - cx).powi(2) + (y - cy).powi(2)
            };

            let mut t = if t0.is_finite() { t0 } else { min_t };
            let mut best = dist2(t);
            let delta = (max_t - min_t) / CURVE_SEARCH_STEPS as f64;
            for i in 0..=CURVE_SEARCH_STEPS {
                let tn = min_t + delta * i as f64;
                let f = dist2(tn);
                if f < best {
                    best = f;
                    t = tn;
                }
            }
            t = minimize(dist2, t - delta, t + delta, EPSILON * EPSILON);

            if t < min_t {
                t = max_t + t - min_t;
            }
            if t > max_t {
                t = min_t + t - max_t;
            }
            let [cx, cy] = curve.raw_point(t);
            (Vector3::new(1.0, cx, cy), t)
        }
        CurveData::FunctionGraph { f, .. } => (Vector3::new(1.0, x, f(x)), x),
        CurveData::Plot { points, bezier_degree: 3 } => {
            let segments = points.len().saturating_sub(1) / 3;
            let dist2 = |t: f64| {
                let [cx, cy] = curve.raw_point(t);
                (x - cx).powi(2) + (y - cy).powi(2)
            };
            let mut best_t = 0.0;
            let mut best = f64::INFINITY;
            for seg in 0..segments {
                let t = minimize(dist2, seg as f64, seg as f64 + 1.0, EPSILON * EPSILON);
                let f = dist2(t);
                if f < best {
                    best = f;
                    best_t = t;
                }
            }
            let [cx, cy] = curve.raw_point(best_t);
            (Vector3::new(1.0, cx, cy), best_t)
        }
        CurveData::Plot { points, .. } => project_coords_to_polyline(x, y, points),
    }
}

/// 点到折线的投影，参数为采样序号加段内比例
fn project_coords_to_polyline(x: f64, y: f64, points: &[[f64; 2]]) -> (Homogeneous, f64) {
    let v = Vector3::new(1.0, x, y);
    let Some(first) = points.first() else {
        return (Vector3::new(1.0, f64::NAN, f64::NAN), 0.0);
    };

    let mut best = (Vector3::new(1.0, first[0], first[1]), 0.0);
    let mut mindist = distance(&best.0, &v);
    let n = points.len();
    for i in 0..n.saturating_sub(1) {
        let p1 = Vector3::new(1.0, points[i][0], points[i][1]);
        let p2 = Vector3::new(1.0, points[i + 1][0], points[i + 1][1]);
        let (q, lambda) = project_coords_to_segment(&v, &p1, &p2);
        let (q, t) = if lambda < 0.0 {
            (p1, i as f64)
        } else if lambda > 1.0 {
            (p2, (i + 1) as f64)
        } else {
            (q, i as f64 + lambda)
        };
        let d = distance(&q, &v);
        if d < mindist {
            mindist = d;
            best = (q, t);
        }
    }
    best
}

/// 点到曲线（含变换）的投影，返回变换后的投影点与参数
pub fn project_point_to_curve(p: &Homogeneous, t0: f64, curve: &Curve) -> (Homogeneous, f64) {
    let local = if curve.is_transformed() {
        match curve.matrix().try_inverse() {
            Some(inv) => normalize_point(&(inv * p)),
            None => *p,
        }
    } else {
        *p
    };
    let (q, t) = project_coords_to_curve(local[1], local[2], t0, curve);
    (normalize_point(&(curve.matrix() * q)), t)
}

/// 点到海龟路径的投影
///
/// 逐条折线投影，参数加上该折线在全局中的起始序号。
pub fn project_point_to_turtle(p: &Homogeneous, turtle: &Turtle) -> (Homogeneous, f64) {
    let mut best = (Vector3::new(1.0, f64::NAN, f64::NAN), 0.0);
    let mut mindist = f64::INFINITY;
    let mut offset = 0.0;
    for run in &turtle.runs {
        let (q, t) = project_coords_to_polyline(p[1], p[2], run);
        let d = distance(&q, p);
        if d < mindist {
            mindist = d;
            best = (q, t + offset);
        }
        offset += run.len() as f64;
    }
    best
}

/// 点到多边形边界的最近点
pub fn project_coords_to_polygon(p: &Homogeneous, vertices: &[Homogeneous]) -> Homogeneous {
    let n = vertices.len();
    if n == 0 {
        return Vector3::new(1.0, f64::NAN, f64::NAN);
    }
    let mut best = vertices[0];
    let mut mindist = f64::INFINITY;
    for i in 0..n {
        let q = closest_point_on_segment(p, &vertices[i], &vertices[(i + 1) % n]);
        let d = distance(&q, p);
        if d < mindist {
            mindist = d;
            best = q;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::point;

    #[test]
    fn test_line_projection_and_distance() {
        // y = 1
        let l = Vector3::new(-1.0, 0.0, 1.0);
        let p = point(3.0, 4.0);
        assert!((dist_point_line(&p, &l) - 3.0).abs() < EPSILON);
        let q = project_point_to_line(&p, &l);
        assert!((q[1] - 3.0).abs() < EPSILON);
        assert!((q[2] - 1.0).abs() < EPSILON);
        assert!(dist_point_line(&Vector3::new(0.0, 1.0, 0.0), &l).is_nan());
    }

    #[test]
    fn test_segment_projection() {
        let (q, lambda) = project_coords_to_segment(&point(3.0, 1.0), &point(0.0, 0.0), &point(2.0, 0.0));
        assert!((lambda - 1.5).abs() < EPSILON);
        assert_eq!((q[1], q[2]), (3.0, 0.0));
        let c = closest_point_on_segment(&point(3.0, 1.0), &point(0.0, 0.0), &point(2.0, 0.0));
        assert_eq!((c[1], c[2]), (2.0, 0.0));
    }

    #[test]
    fn test_circle_projection() {
        let q = project_point_to_circle(&point(3.0, 4.0), &point(0.0, 0.0), 1.0);
        assert!((q[1] - 0.6).abs() < EPSILON);
        assert!((q[2] - 0.8).abs() < EPSILON);
        let c = project_point_to_circle(&point(1.0, 1.0), &point(1.0, 1.0), 2.0);
        assert_eq!((c[1], c[2]), (3.0, 1.0));
    }

    #[test]
    fn test_parametric_curve_projection() {
        let curve = Curve::new(CurveData::parametric(f64::cos, f64::sin, 0.0, 2.0 * std::f64::consts::PI));
        let (q, t) = project_coords_to_curve(0.0, 2.0, 0.0, &curve);
        assert!((t - std::f64::consts::FRAC_PI_2).abs() < 1e-4);
        assert!(q[1].abs() < 1e-4);
        assert!((q[2] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_polyline_and_polygon_projection() {
        let curve = Curve::new(CurveData::plot(vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0]]));
        let (q, t) = project_coords_to_curve(3.0, 1.0, 0.0, &curve);
        assert!((t - 1.5).abs() < EPSILON);
        assert_eq!((q[1], q[2]), (2.0, 1.0));

        let square = [point(0.0, 0.0), point(1.0, 0.0), point(1.0, 1.0), point(0.0, 1.0)];
        let q = project_coords_to_polygon(&point(0.5, 0.4), &square);
        assert!((q[1] - 0.5).abs() < EPSILON);
        assert!(q[2].abs() < EPSILON);
    }

    #[test]
    fn test_turtle_projection_offsets_runs() {
        let turtle = Turtle::new(vec![
            vec![[0.0, 0.0], [1.0, 0.0]],
            vec![[0.0, 5.0], [1.0, 5.0]],
        ]);
        let (q, t) = project_point_to_turtle(&point(0.5, 4.0), &turtle);
        assert!((t - 2.5).abs() < EPSILON);
        assert_eq!((q[1], q[2]), (0.5, 5.0));
        let back = turtle.point_at(t);
        assert_eq!(back, [0.5, 5.0]);
    }
}
