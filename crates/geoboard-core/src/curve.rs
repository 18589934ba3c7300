//! 曲线与海龟路径
//!
//! 曲线有三种数据来源：参数方程 `(X(t), Y(t))`、函数图像 `y = f(x)`、采样点折线（可选三次 Bezier）。
//! 曲线可以带一组变换，更新时合成为一个矩阵，`point_at` 返回变换后的点。
//!
//! 海龟路径是若干条折线，参数是全局采样序号加小数部分。

use crate::board::Board;
use crate::element::{ElementId, ElementType, Shape};
use crate::error::{BoardError, BoardResult, ConstructionError};
use crate::math::{binomial, Homogeneous, Matrix};
use crate::transform::{compose, Transform};
use nalgebra::Vector3;
use std::fmt;
use std::rc::Rc;

/// 单变量函数
pub type CurveFn = Rc<dyn Fn(f64) -> f64>;

/// 曲线数据
#[derive(Clone)]
pub enum CurveData {
    /// 参数曲线，`t ∈ [min_t, max_t]`
    Parametric {
        x: CurveFn,
        y: CurveFn,
        min_t: f64,
        max_t: f64,
    },
    /// 函数图像，参数就是 x
    FunctionGraph { f: CurveFn, min_x: f64, max_x: f64 },
    /// 采样点。`bezier_degree` 为 3 时每三段为一组控制点
    Plot {
        points: Vec<[f64; 2]>,
        bezier_degree: u8,
    },
}

impl CurveData {
    pub fn parametric<X, Y>(x: X, y: Y, min_t: f64, max_t: f64) -> Self
    where
        X: Fn(f64) -> f64 + 'static,
        Y: Fn(f64) -> f64 + 'static,
    {
        CurveData::Parametric {
            x: Rc::new(x),
            y: Rc::new(y),
            min_t,
            max_t,
        }
    }

    pub fn function_graph<F>(f: F, min_x: f64, max_x: f64) -> Self
    where
        F: Fn(f64) -> f64 + 'static,
    {
        CurveData::FunctionGraph {
            f: Rc::new(f),
            min_x,
            max_x,
        }
    }

    pub fn plot(points: Vec<[f64; 2]>) -> Self {
        CurveData::Plot {
            points,
            bezier_degree: 1,
        }
    }

    pub fn bezier(points: Vec<[f64; 2]>) -> Self {
        CurveData::Plot {
            points,
            bezier_degree: 3,
        }
    }
}

impl fmt::Debug for CurveData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveData::Parametric { min_t, max_t, .. } => write!(f, "Parametric([{min_t}, {max_t}])"),
            CurveData::FunctionGraph { min_x, max_x, .. } => write!(f, "FunctionGraph([{min_x}, {max_x}])"),
            CurveData::Plot { points, bezier_degree } => {
                write!(f, "Plot({} points, degree {bezier_degree})", points.len())
            }
        }
    }
}

/// 曲线
#[derive(Debug, Clone)]
pub struct Curve {
    pub data: CurveData,
    pub(crate) transformations: Vec<Transform>,
    /// 变换合成后的矩阵，每次更新时重算
    pub(crate) matrix: Matrix,
}

impl Curve {
    pub fn new(data: CurveData) -> Self {
        Self {
            data,
            transformations: Vec::new(),
            matrix: Matrix::identity(),
        }
    }

    pub fn is_transformed(&self) -> bool {
        !self.transformations.is_empty()
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn min_t(&self) -> f64 {
        match &self.data {
            CurveData::Parametric { min_t, .. } => *min_t,
            CurveData::FunctionGraph { min_x, .. } => *min_x,
            CurveData::Plot { .. } => 0.0,
        }
    }

    pub fn max_t(&self) -> f64 {
        match &self.data {
            CurveData::Parametric { max_t, .. } => *max_t,
            CurveData::FunctionGraph { max_x, .. } => *max_x,
            CurveData::Plot { points, bezier_degree: 3 } => (points.len().saturating_sub(1) / 3) as f64,
            CurveData::Plot { points, .. } => points.len().saturating_sub(1) as f64,
        }
    }

    /// 变换前的 x 坐标
    pub fn x(&self, t: f64) -> f64 {
        self.raw_point(t)[0]
    }

    /// 变换前的 y 坐标
    pub fn y(&self, t: f64) -> f64 {
        self.raw_point(t)[1]
    }

    /// 变换前的点
    pub fn raw_point(&self, t: f64) -> [f64; 2] {
        match &self.data {
            CurveData::Parametric { x, y, .. } => [x(t), y(t)],
            CurveData::FunctionGraph { f, .. } => [t, f(t)],
            CurveData::Plot { points, bezier_degree: 3 } => bezier_point(points, t),
            CurveData::Plot { points, .. } => polyline_point(points, t),
        }
    }

    /// 变换后的点（齐次坐标，已归一化）
    pub fn point_at(&self, t: f64) -> Homogeneous {
        let [x, y] = self.raw_point(t);
        crate::math::normalize_point(&(self.matrix * Vector3::new(1.0, x, y)))
    }

    /// 采样点（只对 Plot 有意义）
    pub fn points(&self) -> &[[f64; 2]] {
        match &self.data {
            CurveData::Plot { points, .. } => points,
            _ => &[],
        }
    }

    pub fn bezier_degree(&self) -> u8 {
        match &self.data {
            CurveData::Plot { bezier_degree, .. } => *bezier_degree,
            _ => 1,
        }
    }

    /// 三次 Bezier 在参数 t 处的导数 `(dx/dt, dy/dt)`
    pub(crate) fn bezier_derivative(&self, t: f64) -> [f64; 2] {
        let pts = self.points();
        let Some((seg, s)) = bezier_segment(pts, t) else {
            return [f64::NAN, f64::NAN];
        };
        let p = &pts[seg * 3..seg * 3 + 4];
        let mut d = [0.0; 2];
        for (k, w) in [
            3.0 * (1.0 - s) * (1.0 - s),
            6.0 * (1.0 - s) * s,
            3.0 * s * s,
        ]
        .iter()
        .enumerate()
        {
            d[0] += w * (p[k + 1][0] - p[k][0]);
            d[1] += w * (p[k + 1][1] - p[k][1]);
        }
        d
    }
}

fn polyline_point(points: &[[f64; 2]], t: f64) -> [f64; 2] {
    match points.len() {
        0 => [f64::NAN, f64::NAN],
        1 => points[0],
        n => {
            let t = t.clamp(0.0, (n - 1) as f64);
            let i = (t.floor() as usize).min(n - 2);
            let s = t - i as f64;
            let (a, b) = (points[i], points[i + 1]);
            [a[0] + (b[0] - a[0]) * s, a[1] + (b[1] - a[1]) * s]
        }
    }
}

/// 参数 t 所在的 Bezier 段及段内参数
fn bezier_segment(points: &[[f64; 2]], t: f64) -> Option<(usize, f64)> {
    let segments = points.len().saturating_sub(1) / 3;
    if segments == 0 {
        return None;
    }
    let t = t.clamp(0.0, segments as f64);
    let seg = (t.floor() as usize).min(segments - 1);
    Some((seg, t - seg as f64))
}

fn bezier_point(points: &[[f64; 2]], t: f64) -> [f64; 2] {
    let Some((seg, s)) = bezier_segment(points, t) else {
        return points.first().copied().unwrap_or([f64::NAN, f64::NAN]);
    };
    let mut out = [0.0; 2];
    for k in 0..4 {
        let w = binomial(3, k) * s.powi(k as i32) * (1.0 - s).powi(3 - k as i32);
        out[0] += w * points[seg * 3 + k][0];
        out[1] += w * points[seg * 3 + k][1];
    }
    out
}

/// 海龟路径
#[derive(Debug, Clone, Default)]
pub struct Turtle {
    /// 每次落笔画出的一条折线
    pub runs: Vec<Vec<[f64; 2]>>,
}

impl Turtle {
    pub fn new(runs: Vec<Vec<[f64; 2]>>) -> Self {
        Self { runs }
    }

    /// 采样点总数
    pub fn number_points(&self) -> usize {
        self.runs.iter().map(Vec::len).sum()
    }

    pub fn max_t(&self) -> f64 {
        self.number_points().saturating_sub(1) as f64
    }

    /// 全局参数 t 处的点。第 k 条折线占据 `[offset_k, offset_k + len_k - 1]`
    pub fn point_at(&self, t: f64) -> [f64; 2] {
        let mut offset = 0.0;
        let last = self.runs.len().saturating_sub(1);
        for (k, run) in self.runs.iter().enumerate() {
            let len = run.len() as f64;
            if t < offset + len || k == last {
                return polyline_point(run, t - offset);
            }
            offset += len;
        }
        [f64::NAN, f64::NAN]
    }
}

/// 海龟绘图指令，生成 [`Turtle`] 的折线
///
/// 初始位置在原点，朝向 y 轴正方向，笔落下。
#[derive(Debug, Clone)]
pub struct TurtleBuilder {
    pos: [f64; 2],
    /// 朝向（度）
    heading: f64,
    pen_down: bool,
    runs: Vec<Vec<[f64; 2]>>,
}

impl Default for TurtleBuilder {
    fn default() -> Self {
        Self {
            pos: [0.0, 0.0],
            heading: 90.0,
            pen_down: true,
            runs: vec![vec![[0.0, 0.0]]],
        }
    }
}

impl TurtleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(mut self, len: f64) -> Self {
        let (s, c) = self.heading.to_radians().sin_cos();
        let next = [self.pos[0] + len * c, self.pos[1] + len * s];
        self.line_to(next);
        self
    }

    pub fn back(self, len: f64) -> Self {
        self.forward(-len)
    }

    pub fn left(mut self, degrees: f64) -> Self {
        self.heading += degrees;
        self
    }

    pub fn right(self, degrees: f64) -> Self {
        self.left(-degrees)
    }

    pub fn pen_up(mut self) -> Self {
        self.pen_down = false;
        self
    }

    pub fn pen_down(mut self) -> Self {
        if !self.pen_down {
            self.pen_down = true;
            self.runs.push(vec![self.pos]);
        }
        self
    }

    /// 移动到指定位置（不改变朝向）
    pub fn move_to(mut self, xy: [f64; 2]) -> Self {
        self.line_to(xy);
        self
    }

    fn line_to(&mut self, xy: [f64; 2]) {
        self.pos = xy;
        if self.pen_down {
            if let Some(run) = self.runs.last_mut() {
                run.push(xy);
            }
        }
    }

    pub fn build(self) -> Turtle {
        Turtle::new(self.runs.into_iter().filter(|r| r.len() > 1).collect())
    }
}

impl Board {
    /// 曲线
    pub fn create_curve(&mut self, data: CurveData) -> BoardResult<ElementId> {
        self.create_transformed_curve(data, Vec::new())
    }

    /// 带变换的曲线
    pub fn create_transformed_curve(
        &mut self,
        data: CurveData,
        transformations: Vec<Transform>,
    ) -> BoardResult<ElementId> {
        if let CurveData::Plot { points, bezier_degree } = &data {
            match bezier_degree {
                1 => {}
                3 if points.len() >= 4 && (points.len() - 1) % 3 == 0 => {}
                3 => {
                    return Err(ConstructionError::Arity {
                        what: "bezier curve",
                        expected: "3k + 1 points",
                        got: points.len(),
                    }
                    .into())
                }
                _ => {
                    return Err(ConstructionError::WrongParents {
                        what: "curve",
                        found: format!("bezier degree {bezier_degree}"),
                        expected: "degree 1 or 3",
                    }
                    .into())
                }
            }
        }

        let mut deps: Vec<ElementId> = transformations.iter().flat_map(Transform::deps).collect();
        deps.sort();
        deps.dedup();

        let mut curve = Curve::new(data);
        curve.transformations = transformations;
        let id = self.add_element(ElementType::Curve, Shape::Curve(curve), &deps)?;
        self.full_update(id)?;
        Ok(id)
    }

    /// 海龟路径
    pub fn create_turtle(&mut self, turtle: Turtle) -> BoardResult<ElementId> {
        let id = self.add_element(ElementType::Turtle, Shape::Turtle(turtle), &[])?;
        self.full_update(id)?;
        Ok(id)
    }

    pub fn curve(&self, id: ElementId) -> BoardResult<&Curve> {
        let el = self.element(id)?;
        el.as_curve().ok_or(BoardError::WrongKind {
            id,
            expected: "curve",
            found: el.elem_type.name(),
        })
    }

    pub fn turtle(&self, id: ElementId) -> BoardResult<&Turtle> {
        let el = self.element(id)?;
        match &el.shape {
            Shape::Turtle(t) => Ok(t),
            _ => Err(BoardError::WrongKind {
                id,
                expected: "turtle",
                found: el.elem_type.name(),
            }),
        }
    }

    /// 重算变换矩阵
    pub(crate) fn update_curve(&mut self, id: ElementId) -> BoardResult<()> {
        let c = self.curve(id)?;
        if !c.is_transformed() {
            return Ok(());
        }
        let m = compose(&c.transformations, self);
        if let Shape::Curve(c) = &mut self.element_mut(id)?.shape {
            c.matrix = m;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CoordFrame;
    use crate::math::EPSILON;

    #[test]
    fn test_plot_interpolation() {
        let c = Curve::new(CurveData::plot(vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0]]));
        assert_eq!(c.max_t(), 2.0);
        assert_eq!(c.raw_point(0.5), [1.0, 0.0]);
        assert_eq!(c.raw_point(1.5), [2.0, 1.0]);
        // 超出范围按端点处理
        assert_eq!(c.raw_point(5.0), [2.0, 2.0]);
    }

    #[test]
    fn test_bezier_endpoints_and_derivative() {
        let pts = vec![[0.0, 0.0], [1.0, 1.0], [2.0, 1.0], [3.0, 0.0]];
        let c = Curve::new(CurveData::bezier(pts));
        assert_eq!(c.max_t(), 1.0);
        assert_eq!(c.raw_point(0.0), [0.0, 0.0]);
        assert_eq!(c.raw_point(1.0), [3.0, 0.0]);

        let d = c.bezier_derivative(0.0);
        assert!((d[0] - 3.0).abs() < EPSILON);
        assert!((d[1] - 3.0).abs() < EPSILON);
        let mid = c.bezier_derivative(0.5);
        assert!(mid[1].abs() < EPSILON);
    }

    #[test]
    fn test_bezier_point_count_is_checked() {
        let mut board = Board::default();
        let err = board
            .create_curve(CurveData::bezier(vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]]))
            .unwrap_err();
        assert!(matches!(err, BoardError::Construction(ConstructionError::Arity { got: 3, .. })));
    }

    #[test]
    fn test_transformed_curve_follows_point() {
        let mut board = Board::default();
        let p = board.create_point([1.0, 0.0]).unwrap();
        let dx = crate::term::Term::function(vec![p], move |b: &Board| b.coords(p).map(|c| c.x()).unwrap_or(0.0));
        let id = board
            .create_transformed_curve(
                CurveData::function_graph(|x| x * x, -2.0, 2.0),
                vec![Transform::translate(dx, 0.0)],
            )
            .unwrap();
        let q = board.curve(id).unwrap().point_at(1.0);
        assert!((q[1] - 2.0).abs() < EPSILON);
        assert!((q[2] - 1.0).abs() < EPSILON);

        board.set_position(p, CoordFrame::User, [3.0, 0.0]).unwrap();
        let q = board.curve(id).unwrap().point_at(1.0);
        assert!((q[1] - 4.0).abs() < EPSILON);
    }

    #[test]
    fn test_turtle_builder() {
        let t = TurtleBuilder::new()
            .forward(2.0)
            .right(90.0)
            .forward(1.0)
            .pen_up()
            .forward(1.0)
            .pen_down()
            .forward(1.0)
            .build();
        assert_eq!(t.runs.len(), 2);
        assert_eq!(t.number_points(), 5);

        let p = t.point_at(1.5);
        assert!((p[0] - 0.5).abs() < EPSILON);
        assert!((p[1] - 2.0).abs() < EPSILON);

        // 第二条折线从全局序号 3 开始
        let q = t.point_at(3.5);
        assert!((q[0] - 2.5).abs() < EPSILON);
        assert!((q[1] - 2.0).abs() < EPSILON);
    }
}
