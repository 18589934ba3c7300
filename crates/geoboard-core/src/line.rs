//! 直线
//!
//! 直线由两个端点（点元素）定义，标准式 `stdform = (C, A, B)` 是两端点齐次坐标的叉积，
//! 归一化到 `A² + B² = 1`。线段和射线通过 `straight_first`/`straight_last` 区分。
//!
//! 定长线段在每次更新时判断是哪个端点刚被移动，然后沿当前方向移动另一个端点，
//! 恢复目标长度。

use crate::board::Board;
use crate::coords::{CoordFrame, Coords};
use crate::element::{ElementId, ElementType, Shape};
use crate::error::BoardResult;
use crate::math::{distance, normalize_line, Homogeneous, EPSILON, IDEAL_POINT_SCALE};
use crate::point::CoordRule;
use crate::term::Term;
use nalgebra::Vector3;
use std::rc::Rc;
use tracing::{debug, warn};

/// 返回仿射坐标的函数
pub type EndpointFn = Rc<dyn Fn(&Board) -> [f64; 2]>;

/// 返回一对端点元素的函数
pub type SelectFn = Rc<dyn Fn(&Board) -> (ElementId, ElementId)>;

/// 返回直线齐次系数 `(C, A, B)` 的函数
pub type HomogeneousFn = Rc<dyn Fn(&Board) -> Homogeneous>;

/// 直线端点的来源
#[derive(Clone)]
pub enum LineEnd {
    /// 已有的点
    Element(ElementId),
    /// 在该位置新建一个自由点
    Coordinates([f64; 2]),
    /// 新建一个坐标由函数决定的点
    Function { deps: Vec<ElementId>, f: EndpointFn },
}

impl LineEnd {
    pub fn function<F>(deps: impl Into<Vec<ElementId>>, f: F) -> Self
    where
        F: Fn(&Board) -> [f64; 2] + 'static,
    {
        LineEnd::Function {
            deps: deps.into(),
            f: Rc::new(f),
        }
    }
}

impl From<ElementId> for LineEnd {
    fn from(id: ElementId) -> Self {
        LineEnd::Element(id)
    }
}

impl From<[f64; 2]> for LineEnd {
    fn from(xy: [f64; 2]) -> Self {
        LineEnd::Coordinates(xy)
    }
}

/// 直线的构造参数
#[derive(Clone)]
pub enum LineParents {
    /// 两个端点
    Points(LineEnd, LineEnd),
    /// 每次更新时由函数挑选两个已有的点作端点
    Select { deps: Vec<ElementId>, f: SelectFn },
    /// 三个系数 `C + A·x + B·y = 0`
    Coefficients(Term, Term, Term),
    /// 一个返回 `(C, A, B)` 的函数
    Homogeneous { deps: Vec<ElementId>, f: HomogeneousFn },
}

impl LineParents {
    pub fn points(a: impl Into<LineEnd>, b: impl Into<LineEnd>) -> Self {
        LineParents::Points(a.into(), b.into())
    }

    pub fn select<F>(deps: impl Into<Vec<ElementId>>, f: F) -> Self
    where
        F: Fn(&Board) -> (ElementId, ElementId) + 'static,
    {
        LineParents::Select {
            deps: deps.into(),
            f: Rc::new(f),
        }
    }

    pub fn homogeneous<F>(deps: impl Into<Vec<ElementId>>, f: F) -> Self
    where
        F: Fn(&Board) -> Homogeneous + 'static,
    {
        LineParents::Homogeneous {
            deps: deps.into(),
            f: Rc::new(f),
        }
    }
}

/// 定长约束
#[derive(Debug, Clone)]
pub struct FixedLength {
    pub length: Term,
    /// 两个端点上一次记录的位置
    pub(crate) last: [Homogeneous; 2],
}

/// 直线
#[derive(Clone)]
pub struct Line {
    pub point1: ElementId,
    pub point2: ElementId,
    /// `(C, A, B)`，`A·x + B·y + C = 0`
    pub stdform: Homogeneous,
    pub straight_first: bool,
    pub straight_last: bool,
    pub(crate) select: Option<SelectFn>,
    pub fixed_length: Option<FixedLength>,
    /// 目标长度为负时按 0 处理，而不是取绝对值
    pub nonnegative_only: bool,
    /// 作为多边形的边时所属的多边形
    pub parent_polygon: Option<ElementId>,
    pub stroke_width: f64,
    /// 切线/法线所依附的点
    pub glider: Option<ElementId>,
}

impl Line {
    fn new(point1: ElementId, point2: ElementId) -> Self {
        Self {
            point1,
            point2,
            stdform: Vector3::new(0.0, 0.0, 0.0),
            straight_first: true,
            straight_last: true,
            select: None,
            fixed_length: None,
            nonnegative_only: false,
            parent_polygon: None,
            stroke_width: 2.0,
            glider: None,
        }
    }

    pub fn is_real(&self) -> bool {
        let s = &self.stdform;
        s.iter().all(|v| v.is_finite()) && s[1].abs() + s[2].abs() > EPSILON
    }

    pub fn has_fixed_length(&self) -> bool {
        self.fixed_length.is_some()
    }

    /// 斜率 `-A/B`，竖直时为 +∞
    pub fn slope(&self) -> f64 {
        let (a, b) = (self.stdform[1], self.stdform[2]);
        if b.abs() < EPSILON {
            f64::INFINITY
        } else {
            -a / b
        }
    }

    /// y 轴截距 `-C/B`，竖直时为 +∞
    pub fn rise(&self) -> f64 {
        let (c, b) = (self.stdform[0], self.stdform[2]);
        if b.abs() < EPSILON {
            f64::INFINITY
        } else {
            -c / b
        }
    }

    /// 与 x 轴正方向的夹角
    pub fn angle(&self) -> f64 {
        (-self.stdform[1]).atan2(self.stdform[2])
    }
}

impl std::fmt::Debug for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("point1", &self.point1)
            .field("point2", &self.point2)
            .field("stdform", &self.stdform)
            .field("straight_first", &self.straight_first)
            .field("straight_last", &self.straight_last)
            .field("fixed_length", &self.fixed_length)
            .finish()
    }
}

impl Board {
    // === 构造 ===

    /// 直线
    pub fn create_line(&mut self, parents: LineParents) -> BoardResult<ElementId> {
        self.create_line_typed(parents, ElementType::Line)
    }

    pub(crate) fn create_line_typed(&mut self, parents: LineParents, elem_type: ElementType) -> BoardResult<ElementId> {
        let (p1, p2, select, extra) = match parents {
            LineParents::Points(a, b) => {
                let p1 = self.resolve_line_end(a)?;
                let p2 = self.resolve_line_end(b)?;
                (p1, p2, None, Vec::new())
            }
            LineParents::Select { deps, f } => {
                let (p1, p2) = f(self);
                self.require_point("line", p1, "[point, point]")?;
                self.require_point("line", p2, "[point, point]")?;
                (p1, p2, Some(f), deps)
            }
            LineParents::Coefficients(c, a, b) => {
                let draggable = c.is_constant() && a.is_constant() && b.is_constant();
                let mut deps = c.deps();
                deps.extend(a.deps());
                deps.extend(b.deps());
                let f: HomogeneousFn = Rc::new(move |board: &Board| {
                    Vector3::new(c.eval(board), a.eval(board), b.eval(board))
                });
                let (p1, p2) = self.points_from_coefficients(deps, f, draggable)?;
                (p1, p2, None, Vec::new())
            }
            LineParents::Homogeneous { deps, f } => {
                let (p1, p2) = self.points_from_coefficients(deps, f, false)?;
                (p1, p2, None, Vec::new())
            }
        };

        let mut line = Line::new(p1, p2);
        line.select = select;
        let mut parents = vec![p1, p2];
        parents.extend(extra);
        parents.sort();
        parents.dedup();

        let id = self.add_element(elem_type, Shape::Line(line), &parents)?;
        self.full_update(id)?;
        Ok(id)
    }

    /// 线段
    pub fn create_segment(&mut self, a: impl Into<LineEnd>, b: impl Into<LineEnd>) -> BoardResult<ElementId> {
        let id = self.create_line_typed(LineParents::points(a, b), ElementType::Segment)?;
        let line = self.line_mut(id)?;
        line.straight_first = false;
        line.straight_last = false;
        self.full_update(id)?;
        Ok(id)
    }

    /// 定长线段
    pub fn create_fixed_segment(
        &mut self,
        a: impl Into<LineEnd>,
        b: impl Into<LineEnd>,
        length: impl Into<Term>,
    ) -> BoardResult<ElementId> {
        let id = self.create_segment(a, b)?;
        let length = length.into();
        for d in length.deps() {
            self.add_child(d, id)?;
        }
        let (p1, p2) = {
            let l = self.line(id)?;
            (self.coords(l.point1)?.usr_coords, self.coords(l.point2)?.usr_coords)
        };
        self.line_mut(id)?.fixed_length = Some(FixedLength {
            length,
            last: [p1, p2],
        });
        self.update(None);
        Ok(id)
    }

    fn resolve_line_end(&mut self, end: LineEnd) -> BoardResult<ElementId> {
        match end {
            LineEnd::Element(id) => {
                self.require_point("line", id, "[point, point], [[x1, y1], [x2, y2]], [a, b, c]")?;
                Ok(id)
            }
            LineEnd::Coordinates(xy) => {
                let id = self.create_point(xy)?;
                self.element_mut(id)?.visible = false;
                Ok(id)
            }
            LineEnd::Function { deps, f } => {
                let rule = CoordRule::coordinates(deps, move |board: &Board| {
                    let [x, y] = f(board);
                    Vector3::new(1.0, x, y)
                });
                let id = self.create_constrained_point(rule)?;
                self.element_mut(id)?.visible = false;
                Ok(id)
            }
        }
    }

    /// 由系数 `(C, A, B)` 生成直线上的两个辅助点
    ///
    /// 第二个点是 `(A²+B², -A·C + B, -B·C - A)`，第一个点在它基础上沿 `(B, -A)` 方向再走一步，
    /// 因而两点都是有限点。
    fn points_from_coefficients(
        &mut self,
        deps: Vec<ElementId>,
        f: HomogeneousFn,
        draggable: bool,
    ) -> BoardResult<(ElementId, ElementId)> {
        fn first(l: &Homogeneous) -> Homogeneous {
            let (c, a, b) = (l[0], l[1], l[2]);
            Vector3::new(b * b + a * a, b - a * c + b, -a - b * c - a)
        }
        fn second(l: &Homogeneous) -> Homogeneous {
            let (c, a, b) = (l[0], l[1], l[2]);
            Vector3::new(b * b + a * a, -a * c + b, -b * c - a)
        }

        let mut ids = [ElementId(0); 2];
        let makers: [fn(&Homogeneous) -> Homogeneous; 2] = [first, second];
        for (slot, make) in ids.iter_mut().zip(makers) {
            let id = if draggable {
                let c = Coords::from_homogeneous(CoordFrame::User, make(&f(self)), self.viewport());
                self.create_point(c.user_xy())?
            } else {
                let f = f.clone();
                let rule = CoordRule::coordinates(deps.clone(), move |board: &Board| make(&f(board)));
                self.create_constrained_point(rule)?
            };
            self.element_mut(id)?.visible = false;
            *slot = id;
        }
        Ok((ids[0], ids[1]))
    }

    // === 更新 ===

    pub(crate) fn update_line(&mut self, id: ElementId) -> BoardResult<()> {
        self.update_line_endpoints(id)?;
        self.update_segment_fixed_length(id)?;
        self.update_stdform(id)
    }

    /// 端点选择函数
    fn update_line_endpoints(&mut self, id: ElementId) -> BoardResult<()> {
        let Some(select) = self.line(id)?.select.clone() else {
            return Ok(());
        };
        let (p1, p2) = select(self);
        if !(self.element(p1)?.is_point() && self.element(p2)?.is_point()) {
            return Ok(());
        }

        let l = self.line(id)?;
        if (l.point1, l.point2) != (p1, p2) {
            debug!("line {} now runs through {} and {}", id, p1, p2);
            let l = self.line_mut(id)?;
            l.point1 = p1;
            l.point2 = p2;
            // 候选点都已是父元素，这里只补上函数返回的新点
            self.add_child(p1, id)?;
            self.add_child(p2, id)?;
        }
        Ok(())
    }

    /// `stdform = p1 × p2`，归一化到 `A² + B² = 1`
    pub(crate) fn update_stdform(&mut self, id: ElementId) -> BoardResult<()> {
        let l = self.line(id)?;
        let v = self
            .coords(l.point1)?
            .usr_coords
            .cross(&self.coords(l.point2)?.usr_coords);
        self.line_mut(id)?.stdform = normalize_line(&v);
        Ok(())
    }

    /// 定长线段的维护
    fn update_segment_fixed_length(&mut self, id: ElementId) -> BoardResult<()> {
        let l = self.line(id)?;
        let Some(fl) = &l.fixed_length else {
            return Ok(());
        };
        let (point1, point2) = (l.point1, l.point2);

        let target = fl.length.eval(self);
        let target = if l.nonnegative_only {
            target.max(0.0)
        } else {
            target.abs()
        };

        let p1c = self.coords(point1)?.usr_coords;
        let p2c = self.coords(point2)?.usr_coords;
        let d = distance(&p1c, &p2c);
        let d1 = distance(&fl.last[0], &p1c);
        let d2 = distance(&fl.last[1], &p2c);
        let drag1 = self.coords_element(point1)?.is_movable();
        let drag2 = self.coords_element(point2)?.is_movable();

        if d > EPSILON {
            if (d1 > d2 && drag2) || (d1 <= d2 && drag2 && !drag1) {
                let k = target / d;
                self.move_endpoint(point2, [p1c[1] + (p2c[1] - p1c[1]) * k, p1c[2] + (p2c[2] - p1c[2]) * k])?;
            } else if (d1 <= d2 && drag1) || (d1 > d2 && drag1 && !drag2) {
                let k = target / d;
                self.move_endpoint(point1, [p2c[1] + (p1c[1] - p2c[1]) * k, p2c[2] + (p1c[2] - p2c[2]) * k])?;
            }
        } else {
            let x = rand::random::<f64>() - 0.5;
            let y = rand::random::<f64>() - 0.5;
            let n = (x * x + y * y).sqrt();
            warn!("fixed-length segment {} has coinciding endpoints, picking a random direction", id);
            if drag2 {
                self.move_endpoint(point2, [p1c[1] + x * target / n, p1c[2] + y * target / n])?;
            } else if drag1 {
                self.move_endpoint(point1, [p2c[1] + x * target / n, p2c[2] + y * target / n])?;
            }
        }

        let last = [self.coords(point1)?.usr_coords, self.coords(point2)?.usr_coords];
        if let Some(fl) = self.line_mut(id)?.fixed_length.as_mut() {
            fl.last = last;
        }
        Ok(())
    }

    /// 更新中移动端点：端点自身立即更新，其余依赖者留给后续遍历
    fn move_endpoint(&mut self, point: ElementId, xy: [f64; 2]) -> BoardResult<()> {
        self.set_position_directly(point, CoordFrame::User, xy)?;
        self.full_update(point)?;
        for d in self.descendants(point) {
            self.element_mut(d)?.needs_update = true;
        }
        Ok(())
    }

    // === 查询 ===

    /// 屏幕坐标 (x, y) 是否落在直线上
    ///
    /// 容差为当前输入设备的精度加半个线宽。线段/射线还要求垂足落在有效范围内。
    pub fn line_has_point(&self, id: ElementId, x: f64, y: f64) -> BoardResult<bool> {
        let l = self.line(id)?;
        let vp = self.viewport();
        let prec = self.precision() + l.stroke_width * 0.5;

        let c = vp.line_to_screen(&l.stdform);
        let v = Vector3::new(1.0, x, y);
        let s = crate::projection::dist_point_line(&v, &c);
        if s.is_nan() || s > prec {
            return Ok(false);
        }
        if l.straight_first && l.straight_last {
            return Ok(true);
        }

        let p1 = self.coords(l.point1)?;
        let p2 = self.coords(l.point2)?;

        // 垂足
        let normal = Vector3::new(0.0, c[1], c[2]);
        let proj = normal.cross(&v).cross(&c);
        let proj = Coords::new(CoordFrame::Screen, [proj[1] / proj[0], proj[2] / proj[0]], vp).usr_coords;

        let d = p1.distance(CoordFrame::User, p2);
        let mut p1c = p1.usr_coords;
        let mut p2c = p2.usr_coords;

        let pos = if d < EPSILON {
            0.0
        } else {
            if d.is_infinite() {
                let far = 1.0 / EPSILON;
                if p2c[0].abs() < EPSILON {
                    let k = far / (p2c[1] * p2c[1] + p2c[2] * p2c[2]).sqrt();
                    p2c = Vector3::new(1.0, p1c[1] + p2c[1] * k, p1c[2] + p2c[2] * k);
                } else {
                    let k = far / (p1c[1] * p1c[1] + p1c[2] * p1c[2]).sqrt();
                    p1c = Vector3::new(1.0, p2c[1] + p1c[1] * k, p2c[2] + p1c[2] * k);
                }
            }
            let mut i = 1;
            let mut span = p2c[i] - p1c[i];
            if span.abs() < EPSILON {
                i = 2;
                span = p2c[i] - p1c[i];
            }
            (proj[i] - p1c[i]) / span
        };

        if !l.straight_first && pos < 0.0 {
            return Ok(false);
        }
        Ok(!(!l.straight_last && pos > 1.0))
    }

    /// 方向向量
    pub fn line_direction(&self, id: ElementId) -> BoardResult<[f64; 2]> {
        let l = self.line(id)?;
        let c1 = self.coords(l.point1)?.usr_coords;
        let c2 = self.coords(l.point2)?.usr_coords;
        let ideal1 = c1[0].abs() < EPSILON;
        let ideal2 = c2[0].abs() < EPSILON;

        Ok(if ideal2 && !ideal1 {
            [c2[1], c2[2]]
        } else if ideal1 && !ideal2 {
            [-c1[1], -c1[2]]
        } else {
            [c2[1] - c1[1], c2[2] - c1[2]]
        })
    }

    pub fn line_is_vertical(&self, id: ElementId) -> BoardResult<bool> {
        let [dx, dy] = self.line_direction(id)?;
        Ok(dx.abs() < EPSILON && dy.abs() >= EPSILON)
    }

    pub fn line_is_horizontal(&self, id: ElementId) -> BoardResult<bool> {
        let [dx, dy] = self.line_direction(id)?;
        Ok(dy.abs() < EPSILON && dx.abs() >= EPSILON)
    }

    /// 两端点的距离
    pub fn line_length(&self, id: ElementId) -> BoardResult<f64> {
        let l = self.line(id)?;
        Ok(self.coords(l.point1)?.distance(CoordFrame::User, self.coords(l.point2)?))
    }

    pub fn line_slope(&self, id: ElementId) -> BoardResult<f64> {
        Ok(self.line(id)?.slope())
    }

    pub fn line_rise(&self, id: ElementId) -> BoardResult<f64> {
        Ok(self.line(id)?.rise())
    }

    pub fn line_angle(&self, id: ElementId) -> BoardResult<f64> {
        Ok(self.line(id)?.angle())
    }

    /// 修改目标长度。没有定长约束的直线忽略此调用
    pub fn set_fixed_length(&mut self, id: ElementId, length: impl Into<Term>) -> BoardResult<()> {
        if !self.line(id)?.has_fixed_length() {
            return Ok(());
        }
        let length = length.into();
        for d in length.deps() {
            self.add_child(d, id)?;
        }
        if let Some(fl) = self.line_mut(id)?.fixed_length.as_mut() {
            fl.length = length;
        }
        self.update(None);
        Ok(())
    }

    /// 设置两端是否延长
    pub fn set_straight(&mut self, id: ElementId, first: bool, last: bool) -> BoardResult<()> {
        let l = self.line_mut(id)?;
        l.straight_first = first;
        l.straight_last = last;
        self.element_mut(id)?.needs_render = true;
        self.update_renderer();
        Ok(())
    }

    /// 包围盒 `[min_x, max_y, max_x, min_y]`
    pub fn line_bounds(&self, id: ElementId) -> BoardResult<[f64; 4]> {
        let l = self.line(id)?;
        let a = self.coords(l.point1)?.usr_coords;
        let b = self.coords(l.point2)?.usr_coords;
        Ok([a[1].min(b[1]), a[2].max(b[2]), a[1].max(b[1]), a[2].min(b[2])])
    }

    /// 把直线看作参数曲线，`t ∈ [0, 1]` 从 point1 走到 point2
    ///
    /// 端点为无穷远点时，沿直线方向放大一个很大的倍数来近似。
    pub fn line_point_at(&self, id: ElementId, t: f64) -> BoardResult<Homogeneous> {
        let l = self.line(id)?;
        let c1 = self.coords(l.point1)?.usr_coords;
        let c2 = self.coords(l.point2)?.usr_coords;
        let (a, b) = (l.stdform[1], l.stdform[2]);

        let (x, y) = if c1[0] != 0.0 {
            if c2[0] != 0.0 {
                (c1[1] + (c2[1] - c1[1]) * t, c1[2] + (c2[2] - c1[2]) * t)
            } else {
                (c1[1] + b * IDEAL_POINT_SCALE * t, c1[2] - a * IDEAL_POINT_SCALE * t)
            }
        } else {
            (c2[1] + b * IDEAL_POINT_SCALE * t, c2[2] - a * IDEAL_POINT_SCALE * t)
        };
        let z = if t == 1.0 && c1[0] * c2[0] == 0.0 { 0.0 } else { 1.0 };
        Ok(Vector3::new(z, x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputDevice;
    use crate::error::{BoardError, ConstructionError};

    fn assert_on_line(board: &Board, line: ElementId, p: ElementId) {
        let s = board.line(line).unwrap().stdform;
        let c = board.coords(p).unwrap().usr_coords;
        assert!((s[0] + s[1] * c[1] + s[2] * c[2]).abs() < 1e-9);
    }

    #[test]
    fn test_stdform_normalized() {
        let mut board = Board::default();
        let a = board.create_point([1.0, 2.0]).unwrap();
        let b = board.create_point([4.0, -2.0]).unwrap();
        let l = board.create_line(LineParents::points(a, b)).unwrap();

        let s = board.line(l).unwrap().stdform;
        assert!((s[1] * s[1] + s[2] * s[2] - 1.0).abs() < EPSILON);
        assert_on_line(&board, l, a);
        assert_on_line(&board, l, b);

        board.set_position(b, CoordFrame::User, [-3.0, 7.0]).unwrap();
        let s = board.line(l).unwrap().stdform;
        assert!((s[1] * s[1] + s[2] * s[2] - 1.0).abs() < EPSILON);
        assert_on_line(&board, l, b);
    }

    #[test]
    fn test_line_from_coefficients() {
        let mut board = Board::default();
        // x + y - 2 = 0
        let l = board
            .create_line(LineParents::Coefficients((-2.0).into(), 1.0.into(), 1.0.into()))
            .unwrap();
        let line = board.line(l).unwrap();
        assert_on_line(&board, l, line.point1);
        assert_on_line(&board, l, line.point2);
        assert!(board.coords(line.point1).unwrap().is_real());
        assert!(board.coords_element(line.point1).unwrap().is_draggable);
        assert!(!board.element(line.point1).unwrap().visible);
    }

    #[test]
    fn test_line_from_coordinates_and_functions() {
        let mut board = Board::default();
        let a = board.create_point([1.0, 1.0]).unwrap();
        let l = board
            .create_line(LineParents::points(
                [0.0, 0.0],
                LineEnd::function(vec![a], move |b: &Board| {
                    let c = b.coords(a).map(|c| c.user_xy()).unwrap_or([f64::NAN; 2]);
                    [c[0] * 2.0, c[1] * 2.0]
                }),
            ))
            .unwrap();
        assert!((board.line_slope(l).unwrap() - 1.0).abs() < EPSILON);

        board.set_position(a, CoordFrame::User, [1.0, -1.0]).unwrap();
        assert!((board.line_slope(l).unwrap() + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_line_requires_points() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let c = board.create_circle(a, 1.0).unwrap();
        let err = board.create_line(LineParents::points(a, c)).unwrap_err();
        assert!(matches!(
            err,
            BoardError::Construction(ConstructionError::WrongParents { what: "line", .. })
        ));
    }

    #[test]
    fn test_select_swaps_endpoints() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([1.0, 0.0]).unwrap();
        let c = board.create_point([0.0, 1.0]).unwrap();
        let l = board
            .create_line(LineParents::select(vec![a, b, c], move |board: &Board| {
                let far = board.coords(a).map(|p| p.x() > 0.5).unwrap_or(false);
                if far {
                    (a, c)
                } else {
                    (a, b)
                }
            }))
            .unwrap();
        assert!(board.line_is_horizontal(l).unwrap());

        board.set_position(a, CoordFrame::User, [1.0, 1.0]).unwrap();
        assert_eq!(board.line(l).unwrap().point2, c);
        assert!(board.line_is_horizontal(l).unwrap());
        assert_on_line(&board, l, c);
    }

    #[test]
    fn test_accessors() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 1.0]).unwrap();
        let b = board.create_point([2.0, 5.0]).unwrap();
        let l = board.create_line(LineParents::points(a, b)).unwrap();

        assert!((board.line_slope(l).unwrap() - 2.0).abs() < EPSILON);
        assert!((board.line_rise(l).unwrap() - 1.0).abs() < EPSILON);
        assert!((board.line_angle(l).unwrap() - 2.0_f64.atan()).abs() < EPSILON);
        assert_eq!(board.line_direction(l).unwrap(), [2.0, 4.0]);
        assert!((board.line_length(l).unwrap() - 20.0_f64.sqrt()).abs() < EPSILON);
        assert_eq!(board.line_bounds(l).unwrap(), [0.0, 5.0, 2.0, 1.0]);

        let mid = board.line_point_at(l, 0.5).unwrap();
        assert_eq!((mid[1], mid[2]), (1.0, 3.0));

        let v = board.create_point([0.0, 7.0]).unwrap();
        let vertical = board.create_line(LineParents::points(a, v)).unwrap();
        assert!(board.line_slope(vertical).unwrap().is_infinite());
        assert!(board.line_is_vertical(vertical).unwrap());
    }

    #[test]
    fn test_has_point_segment_boundedness() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([2.0, 0.0]).unwrap();
        let seg = board.create_segment(a, b).unwrap();

        // 用户坐标 (3, 0) 在屏幕上是 (400, 250)，垂足参数 1.5
        assert!(!board.line_has_point(seg, 400.0, 250.0).unwrap());
        assert!(board.line_has_point(seg, 300.0, 252.0).unwrap());

        board.set_straight(seg, true, true).unwrap();
        assert!(board.line_has_point(seg, 400.0, 250.0).unwrap());

        // 离得太远
        assert!(!board.line_has_point(seg, 300.0, 270.0).unwrap());
        board.set_input_device(InputDevice::Touch);
        assert!(board.line_has_point(seg, 300.0, 270.0).unwrap());
    }

    #[test]
    fn test_fixed_length_moves_other_endpoint() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([3.0, 0.0]).unwrap();
        let s = board.create_fixed_segment(a, b, 2.0).unwrap();
        assert!((board.line_length(s).unwrap() - 2.0).abs() < EPSILON);

        // 拖 a，b 跟随
        board.set_position(a, CoordFrame::User, [-1.0, 1.0]).unwrap();
        assert!((board.line_length(s).unwrap() - 2.0).abs() < EPSILON);
        assert_eq!(board.coords(a).unwrap().user_xy(), [-1.0, 1.0]);

        // 拖 b，a 跟随
        board.set_position(b, CoordFrame::User, [5.0, 5.0]).unwrap();
        assert!((board.line_length(s).unwrap() - 2.0).abs() < EPSILON);
        assert_eq!(board.coords(b).unwrap().user_xy(), [5.0, 5.0]);

        board.set_fixed_length(s, 4.0).unwrap();
        assert!((board.line_length(s).unwrap() - 4.0).abs() < EPSILON);
    }

    #[test]
    fn test_fixed_length_moves_free_endpoint_when_other_is_fixed() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([3.0, 0.0]).unwrap();
        board.set_fixed(b, true).unwrap();
        let s = board.create_fixed_segment(a, b, 1.0).unwrap();

        board.set_position(b, CoordFrame::User, [4.0, 0.0]).unwrap();
        assert!((board.line_length(s).unwrap() - 1.0).abs() < EPSILON);
        let [x, _] = board.coords(a).unwrap().user_xy();
        assert!((x - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_fixed_length_coincident_endpoints() {
        let mut board = Board::default();
        let a = board.create_point([1.0, 1.0]).unwrap();
        let b = board.create_point([1.0, 1.0]).unwrap();
        let s = board.create_fixed_segment(a, b, 3.0).unwrap();
        assert!((board.line_length(s).unwrap() - 3.0).abs() < EPSILON);

        board.set_position(a, CoordFrame::User, board.coords(b).unwrap().user_xy()).unwrap();
        assert!((board.line_length(s).unwrap() - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_set_fixed_length_ignored_without_constraint() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([3.0, 0.0]).unwrap();
        let s = board.create_segment(a, b).unwrap();
        board.set_fixed_length(s, 1.0).unwrap();
        assert!((board.line_length(s).unwrap() - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_ideal_endpoint_parametric() {
        let mut board = Board::default();
        let a = board.create_point([1.0, 0.0]).unwrap();
        let ideal = board
            .create_constrained_point(CoordRule::Homogeneous(0.0.into(), 1.0.into(), 0.0.into()))
            .unwrap();
        let l = board.create_line(LineParents::points(a, ideal)).unwrap();
        assert!(board.line(l).unwrap().is_real());
        assert_eq!(board.line_direction(l).unwrap(), [1.0, 0.0]);

        let end = board.line_point_at(l, 1.0).unwrap();
        assert_eq!(end[0], 0.0);
        let far = board.line_point_at(l, 0.5).unwrap();
        assert!(far[1].abs() > 1e4);
    }
}
