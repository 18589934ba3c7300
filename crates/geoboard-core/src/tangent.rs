//! 切线、法线、极线、平行线
//!
//! 这些都是普通直线，系数由依附点和宿主图形按下面的规则算出：
//! - 直线：切线就是直线本身，法线沿 `(A, B)` 方向
//! - 圆、圆弧、二次曲线：切线取极线 `Q·p`，点不在曲线上时就是极线
//! - 参数曲线、函数图像：在滑动参数处数值求导，曲线带变换时先拉回原坐标系再推回
//! - 采样曲线：一次折线取割线，三次 Bezier 取段内导数
//! - 海龟路径：取所在折线段的割线

use crate::board::Board;
use crate::curve::CurveData;
use crate::element::{ElementId, ElementType, Shape};
use crate::error::{BoardResult, ConstructionError};
use crate::line::LineParents;
use crate::math::{normalize_point, Homogeneous};
use crate::numerics::derivative;
use crate::projection::{project_coords_to_curve, project_point_to_turtle};
use nalgebra::Vector3;
use tracing::debug;

const TANGENT_PARENTS: &str = "[glider], [point, line|curve|circle|conic]";
const NORMAL_PARENTS: &str = "[glider], [point, line|curve|circle|conic]";
const POLAR_PARENTS: &str = "[conic|circle, point], [point, conic|circle]";
const PARALLEL_PARENTS: &str = "[point, line], [line, point], [point, point, point]";

type LineFn = Box<dyn Fn(&Board) -> BoardResult<Homogeneous>>;

/// 宿主图形的种类
#[derive(Debug, Clone, Copy)]
enum Host {
    Line { point1: ElementId, point2: ElementId },
    Quadric,
    Curve,
    Turtle,
    Unsupported,
}

fn unreal_line() -> Homogeneous {
    Vector3::new(f64::NAN, f64::NAN, f64::NAN)
}

/// 过 `base` 沿 `(dx, dy)` 的直线
fn line_along(base: &Homogeneous, dx: f64, dy: f64) -> Homogeneous {
    Vector3::new(base[2] * dx - base[1] * dy, dy, -dx)
}

/// 过 `base` 且垂直于 `(dx, dy)` 的直线
fn line_across(base: &Homogeneous, dx: f64, dy: f64) -> Homogeneous {
    Vector3::new(-base[1] * dx - base[2] * dy, dx, dy)
}

impl Board {
    fn parent_types(&self, parents: &[ElementId]) -> String {
        parents
            .iter()
            .map(|id| self.element(*id).map(|el| el.elem_type.name()).unwrap_or("unknown"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn wrong_parents(&self, what: &'static str, parents: &[ElementId], expected: &'static str) -> ConstructionError {
        ConstructionError::WrongParents {
            what,
            found: self.parent_types(parents),
            expected,
        }
    }

    /// 拆出依附点和宿主图形
    ///
    /// 单个参数时必须是滑动点，宿主取它当前的滑动对象；两个参数时顺序任意。
    fn point_and_host(
        &self,
        what: &'static str,
        parents: &[ElementId],
        expected: &'static str,
    ) -> BoardResult<(ElementId, ElementId)> {
        match parents {
            [p] => {
                let slide = self
                    .coords_element(*p)
                    .ok()
                    .and_then(|c| c.glider())
                    .and_then(|g| g.slide_object());
                match slide {
                    Some(host) => Ok((*p, host)),
                    None => Err(self.wrong_parents(what, parents, expected).into()),
                }
            }
            [a, b] => {
                if self.element(*a)?.is_point() {
                    Ok((*a, *b))
                } else if self.element(*b)?.is_point() {
                    Ok((*b, *a))
                } else {
                    Err(self.wrong_parents(what, parents, expected).into())
                }
            }
            _ => Err(ConstructionError::Arity {
                what,
                expected: "1 or 2",
                got: parents.len(),
            }
            .into()),
        }
    }

    fn host_kind(&self, id: ElementId) -> BoardResult<Host> {
        Ok(match &self.element(id)?.shape {
            Shape::Line(l) => Host::Line {
                point1: l.point1,
                point2: l.point2,
            },
            Shape::Circle(_) | Shape::Arc(_) | Shape::Conic(_) => Host::Quadric,
            Shape::Curve(_) => Host::Curve,
            Shape::Turtle(_) => Host::Turtle,
            _ => Host::Unsupported,
        })
    }

    /// 依附点 `p` 在宿主上的参数：绑定在宿主上的滑动点直接取位置
    fn glider_parameter_on(&self, p: ElementId, host: ElementId) -> Option<f64> {
        let g = self.coords_element(p).ok()?.glider()?;
        (g.slide_object() == Some(host)).then_some(g.position)
    }

    /// 曲线在点 `p` 处的切线或法线
    fn curve_line_at(&self, p: ElementId, host: ElementId, normal: bool) -> BoardResult<Homogeneous> {
        let curve = self.curve(host)?;
        let m = *curve.matrix();
        let inv = m.try_inverse().unwrap_or(m);
        let po = normalize_point(&(inv * self.coords(p)?.usr_coords));

        let t = match self.glider_parameter_on(p, host) {
            Some(t) => t,
            None => match &curve.data {
                CurveData::FunctionGraph { .. } => po[1],
                _ => project_coords_to_curve(po[1], po[2], curve.min_t(), curve).1,
            },
        };

        let (base, dx, dy) = match &curve.data {
            CurveData::Parametric { .. } | CurveData::FunctionGraph { .. } => (
                po,
                derivative(|s| curve.x(s), t),
                derivative(|s| curve.y(s), t),
            ),
            CurveData::Plot { points, bezier_degree: 3 } if points.len() >= 4 => {
                let [dx, dy] = curve.bezier_derivative(t);
                (po, dx, dy)
            }
            CurveData::Plot { points, .. } => {
                if points.len() < 2 {
                    return Ok(Vector3::new(1.0, 0.0, 0.0));
                }
                let i = (t.floor().max(0.0) as usize).min(points.len() - 2);
                let (a, b) = (points[i], points[i + 1]);
                let base = if normal { po } else { Vector3::new(1.0, a[0], a[1]) };
                (base, b[0] - a[0], b[1] - a[1])
            }
        };

        let li = if normal {
            line_across(&base, dx, dy)
        } else {
            line_along(&base, dx, dy)
        };
        if curve.is_transformed() {
            Ok(inv.transpose() * li)
        } else {
            Ok(li)
        }
    }

    /// 海龟路径在点 `p` 处的切线或法线
    fn turtle_line_at(&self, p: ElementId, host: ElementId, normal: bool) -> BoardResult<Homogeneous> {
        let turtle = self.turtle(host)?;
        let po = self.coords(p)?.usr_coords;
        let t = self
            .glider_parameter_on(p, host)
            .unwrap_or_else(|| project_point_to_turtle(&po, turtle).1);

        let mut i = t.floor().max(0.0) as usize;
        let mut run = None;
        for r in &turtle.runs {
            run = Some(r);
            if i < r.len() {
                break;
            }
            i -= r.len();
        }
        let Some(run) = run else {
            return Ok(Vector3::new(1.0, 0.0, 0.0));
        };
        if run.len() < 2 {
            return Ok(Vector3::new(1.0, 0.0, 0.0));
        }
        let i = i.min(run.len() - 2);
        let (a, b) = (run[i], run[i + 1]);
        let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
        if normal {
            Ok(line_across(&po, dx, dy))
        } else {
            Ok(line_along(&Vector3::new(1.0, a[0], a[1]), dx, dy))
        }
    }

    /// 极线 `Q·p`
    fn polar_of(&self, host: ElementId, p: ElementId) -> BoardResult<Homogeneous> {
        Ok(self.quadratic_form(host)? * self.coords(p)?.usr_coords)
    }

    /// 由系数函数创建直线，系数求值失败时直线无实数解
    fn create_derived_line<F>(
        &mut self,
        deps: Vec<ElementId>,
        elem_type: ElementType,
        f: F,
    ) -> BoardResult<ElementId>
    where
        F: Fn(&Board) -> BoardResult<Homogeneous> + 'static,
    {
        self.create_line_typed(
            LineParents::homogeneous(deps, move |board: &Board| f(board).unwrap_or_else(|_| unreal_line())),
            elem_type,
        )
    }

    fn attach_line_to_point(&mut self, line: ElementId, p: ElementId) -> BoardResult<()> {
        self.line_mut(line)?.glider = Some(p);
        self.add_child(p, line)?;
        self.full_update(line)
    }

    /// 切线
    ///
    /// 参数为 `[glider]` 或 `[point, host]`（顺序任意）。宿主是圆或二次曲线而点不在曲线上时，
    /// 结果是极线。
    pub fn create_tangent(&mut self, parents: &[ElementId]) -> BoardResult<ElementId> {
        let (p, host) = self.point_and_host("tangent", parents, TANGENT_PARENTS)?;
        let id = match self.host_kind(host)? {
            Host::Line { point1, point2 } => {
                self.create_line_typed(LineParents::points(point1, point2), ElementType::Tangent)?
            }
            Host::Quadric => {
                self.create_derived_line(vec![p, host], ElementType::Tangent, move |b| b.polar_of(host, p))?
            }
            Host::Curve => self.create_derived_line(vec![p, host], ElementType::Tangent, move |b| {
                b.curve_line_at(p, host, false)
            })?,
            Host::Turtle => self.create_derived_line(vec![p, host], ElementType::Tangent, move |b| {
                b.turtle_line_at(p, host, false)
            })?,
            Host::Unsupported => return Err(self.wrong_parents("tangent", parents, TANGENT_PARENTS).into()),
        };
        self.attach_line_to_point(id, p)?;
        debug!("tangent {} at {} on {}", id, p, host);
        Ok(id)
    }

    /// 法线
    ///
    /// 直线的法线过点沿 `(A, B)` 方向；圆的法线过圆心和点。
    pub fn create_normal(&mut self, parents: &[ElementId]) -> BoardResult<ElementId> {
        let (p, host) = self.point_and_host("normal", parents, NORMAL_PARENTS)?;
        let circle_center = self.element(host)?.as_circle().map(|c| c.center);
        let id = match (self.host_kind(host)?, circle_center) {
            (Host::Line { .. }, _) => self.create_derived_line(vec![p, host], ElementType::Normal, move |b| {
                let s = b.line(host)?.stdform;
                Ok(b.coords(p)?.usr_coords.cross(&Vector3::new(0.0, s[1], s[2])))
            })?,
            (Host::Quadric, Some(center)) => {
                self.create_line_typed(LineParents::points(center, p), ElementType::Normal)?
            }
            (Host::Quadric, _) => self.create_derived_line(vec![p, host], ElementType::Normal, move |b| {
                let s = b.polar_of(host, p)?;
                Ok(b.coords(p)?.usr_coords.cross(&Vector3::new(0.0, s[1], s[2])))
            })?,
            (Host::Curve, _) => self.create_derived_line(vec![p, host], ElementType::Normal, move |b| {
                b.curve_line_at(p, host, true)
            })?,
            (Host::Turtle, _) => self.create_derived_line(vec![p, host], ElementType::Normal, move |b| {
                b.turtle_line_at(p, host, true)
            })?,
            (Host::Unsupported, _) => return Err(self.wrong_parents("normal", parents, NORMAL_PARENTS).into()),
        };
        self.attach_line_to_point(id, p)?;
        debug!("normal {} at {} on {}", id, p, host);
        Ok(id)
    }

    /// 点关于圆或二次曲线的极线，参数顺序任意
    pub fn create_polar_line(&mut self, parents: &[ElementId]) -> BoardResult<ElementId> {
        let [a, b] = parents else {
            return Err(ConstructionError::Arity {
                what: "polar line",
                expected: "2",
                got: parents.len(),
            }
            .into());
        };
        let (a, b) = (*a, *b);
        let is_quadric = |board: &Board, id| matches!(board.host_kind(id), Ok(Host::Quadric));
        let (host, p) = if is_quadric(self, a) && self.element(b)?.is_point() {
            (a, b)
        } else if is_quadric(self, b) && self.element(a)?.is_point() {
            (b, a)
        } else {
            return Err(self.wrong_parents("polar line", parents, POLAR_PARENTS).into());
        };

        let id = self.create_derived_line(vec![p, host], ElementType::Polar, move |board| board.polar_of(host, p))?;
        self.attach_line_to_point(id, p)?;
        Ok(id)
    }

    /// 平行线
    ///
    /// `[point, line]` 或 `[line, point]`：过点平行于直线；
    /// `[p1, p2, p3]`：过 p3 平行于 p1p2。
    pub fn create_parallel(&mut self, parents: &[ElementId]) -> BoardResult<ElementId> {
        let wrong = |board: &Board| -> BoardResult<ElementId> {
            Err(board.wrong_parents("parallel", parents, PARALLEL_PARENTS).into())
        };

        let (p, deps, direction): (ElementId, Vec<ElementId>, LineFn) =
            match *parents {
                [a, b, c] => {
                    for id in [a, b, c] {
                        if !self.element(id)?.is_point() {
                            return wrong(self);
                        }
                    }
                    (
                        c,
                        vec![a, b, c],
                        Box::new(move |board: &Board| {
                            Ok(board.coords(a)?.usr_coords.cross(&board.coords(b)?.usr_coords))
                        }) as LineFn,
                    )
                }
                [a, b] => {
                    let (p, l) = if self.element(a)?.is_point() { (a, b) } else { (b, a) };
                    if !self.element(p)?.is_point() || self.element(l)?.as_line().is_none() {
                        return wrong(self);
                    }
                    (p, vec![p, l], Box::new(move |board: &Board| Ok(board.line(l)?.stdform)) as LineFn)
                }
                _ => {
                    return Err(ConstructionError::Arity {
                        what: "parallel",
                        expected: "2 or 3",
                        got: parents.len(),
                    }
                    .into())
                }
            };

        let id = self.create_derived_line(deps, ElementType::Parallel, move |board| {
            let li = direction(board)?;
            // 直线的无穷远点就是它的方向
            let ideal = Vector3::new(1.0, 0.0, 0.0).cross(&li);
            Ok(board.coords(p)?.usr_coords.cross(&ideal))
        })?;
        self.line_mut(id)?.glider = Some(p);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::TurtleBuilder;
    use crate::error::BoardError;
    use crate::math::{Matrix, EPSILON};
    use crate::transform::Transform;

    fn on_line(board: &Board, id: ElementId, x: f64, y: f64) -> bool {
        let s = board.line(id).unwrap().stdform;
        (s[0] + s[1] * x + s[2] * y).abs() < 1e-6
    }

    #[test]
    fn test_tangent_to_line_reuses_endpoints() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([1.0, 1.0]).unwrap();
        let l = board.create_line(LineParents::points(a, b)).unwrap();
        let g = board.create_glider([2.0, 2.0], l).unwrap();
        let t = board.create_tangent(&[g]).unwrap();

        let line = board.line(t).unwrap();
        assert_eq!((line.point1, line.point2), (a, b));
        assert_eq!(line.glider, Some(g));
        assert_eq!(board.element(t).unwrap().elem_type, ElementType::Tangent);
    }

    #[test]
    fn test_tangent_to_circle_follows_glider() {
        let mut board = Board::default();
        let o = board.create_point([0.0, 0.0]).unwrap();
        let circle = board.create_circle(o, 2.0).unwrap();
        let g = board.create_glider([3.0, 0.0], circle).unwrap();
        let t = board.create_tangent(&[g]).unwrap();
        assert!(on_line(&board, t, 2.0, 5.0));
        assert!(on_line(&board, t, 2.0, -1.0));

        board.set_glider_position(g, 0.25).unwrap();
        let [x, y] = board.coords(g).unwrap().user_xy();
        assert!(x.abs() < EPSILON && (y - 2.0).abs() < EPSILON);
        assert!(on_line(&board, t, 7.0, 2.0));
    }

    #[test]
    fn test_polar_line_either_order() {
        let mut board = Board::default();
        let o = board.create_point([0.0, 0.0]).unwrap();
        let circle = board.create_circle(o, 1.0).unwrap();
        let p = board.create_point([2.0, 0.0]).unwrap();

        // 单位圆关于 (2, 0) 的极线是 x = 1/2
        let first = board.create_polar_line(&[circle, p]).unwrap();
        let second = board.create_polar_line(&[p, circle]).unwrap();
        for id in [first, second] {
            assert!(on_line(&board, id, 0.5, 3.0));
            assert!(on_line(&board, id, 0.5, -3.0));
            assert_eq!(board.element(id).unwrap().elem_type, ElementType::Polar);
        }

        board.set_position(p, crate::coords::CoordFrame::User, [4.0, 0.0]).unwrap();
        assert!(on_line(&board, first, 0.25, 1.0));
    }

    #[test]
    fn test_tangent_and_normal_to_conic() {
        let mut board = Board::default();
        // x² + y² - 1 = 0
        let q = Matrix::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let conic = board.create_conic(q).unwrap();
        let p = board.create_point([0.0, 1.0]).unwrap();
        let t = board.create_tangent(&[conic, p]).unwrap();
        assert!(on_line(&board, t, 3.0, 1.0));
        let n = board.create_normal(&[p, conic]).unwrap();
        assert!(on_line(&board, n, 0.0, -4.0));
    }

    #[test]
    fn test_tangent_and_normal_to_function_graph() {
        let mut board = Board::default();
        let parabola = board
            .create_curve(CurveData::function_graph(|x| x * x, -5.0, 5.0))
            .unwrap();
        let g = board.create_glider([1.0, 1.0], parabola).unwrap();

        let t = board.create_tangent(&[g]).unwrap();
        assert!(on_line(&board, t, 1.0, 1.0));
        assert!(on_line(&board, t, 2.0, 3.0));

        let n = board.create_normal(&[g]).unwrap();
        assert!(on_line(&board, n, 1.0, 1.0));
        assert!(on_line(&board, n, -1.0, 2.0));
    }

    #[test]
    fn test_tangent_to_transformed_curve() {
        let mut board = Board::default();
        let curve = board
            .create_transformed_curve(
                CurveData::function_graph(|x| x * x, -5.0, 5.0),
                vec![Transform::translate(0.0, 1.0)],
            )
            .unwrap();
        // 点不是滑动点：投影后求参数
        let p = board.create_point([1.0, 2.0]).unwrap();
        let t = board.create_tangent(&[p, curve]).unwrap();
        assert!(on_line(&board, t, 1.0, 2.0));
        assert!(on_line(&board, t, 0.0, 0.0));
    }

    #[test]
    fn test_tangent_to_plot_and_turtle() {
        let mut board = Board::default();
        let plot = board
            .create_curve(CurveData::plot(vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0]]))
            .unwrap();
        let g = board.create_glider([2.5, 1.0], plot).unwrap();
        let t = board.create_tangent(&[g]).unwrap();
        assert!(on_line(&board, t, 2.0, 10.0));
        let n = board.create_normal(&[g]).unwrap();
        assert!(on_line(&board, n, -3.0, 1.0));

        let bezier = board
            .create_curve(CurveData::bezier(vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]]))
            .unwrap();
        let p = board.create_point([1.5, 0.5]).unwrap();
        let bt = board.create_tangent(&[p, bezier]).unwrap();
        assert!(on_line(&board, bt, 10.0, 0.5));

        let turtle = board
            .create_turtle(TurtleBuilder::new().forward(2.0).right(90.0).forward(2.0).build())
            .unwrap();
        let q = board.create_glider([0.1, 1.0], turtle).unwrap();
        let tt = board.create_tangent(&[q]).unwrap();
        assert!(on_line(&board, tt, 0.0, -7.0));
    }

    #[test]
    fn test_normal_to_line_and_circle() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([1.0, 1.0]).unwrap();
        let l = board.create_line(LineParents::points(a, b)).unwrap();
        let p = board.create_point([0.0, 2.0]).unwrap();
        let n = board.create_normal(&[l, p]).unwrap();
        assert!(on_line(&board, n, 0.0, 2.0));
        assert!(on_line(&board, n, 1.0, 1.0));

        let circle = board.create_circle(a, 1.0).unwrap();
        let g = board.create_glider([1.0, 1.0], circle).unwrap();
        let cn = board.create_normal(&[g]).unwrap();
        let line = board.line(cn).unwrap();
        assert_eq!((line.point1, line.point2), (a, g));
    }

    #[test]
    fn test_parallel() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([1.0, 2.0]).unwrap();
        let l = board.create_line(LineParents::points(a, b)).unwrap();
        let p = board.create_point([3.0, 0.0]).unwrap();

        let par = board.create_parallel(&[p, l]).unwrap();
        assert!(on_line(&board, par, 4.0, 2.0));
        let par3 = board.create_parallel(&[a, b, p]).unwrap();
        assert!(on_line(&board, par3, 2.0, -2.0));

        board.set_position(b, crate::coords::CoordFrame::User, [1.0, 0.0]).unwrap();
        assert!(on_line(&board, par, 10.0, 0.0));
        assert!(on_line(&board, par3, -10.0, 0.0));
    }

    #[test]
    fn test_wrong_parents() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([1.0, 0.0]).unwrap();
        let l = board.create_line(LineParents::points(a, b)).unwrap();
        let circle = board.create_circle(a, 1.0).unwrap();

        // 自由点没有滑动对象
        assert!(matches!(
            board.create_tangent(&[a]),
            Err(BoardError::Construction(ConstructionError::WrongParents { .. }))
        ));
        // 两个参数都不是点
        assert!(matches!(
            board.create_tangent(&[l, circle]),
            Err(BoardError::Construction(ConstructionError::WrongParents { .. }))
        ));
        // 宿主是点
        assert!(matches!(
            board.create_normal(&[a, b]),
            Err(BoardError::Construction(ConstructionError::WrongParents { .. }))
        ));
        assert!(matches!(
            board.create_tangent(&[a, b, l]),
            Err(BoardError::Construction(ConstructionError::Arity { got: 3, .. }))
        ));
        assert!(matches!(
            board.create_polar_line(&[l, a]),
            Err(BoardError::Construction(ConstructionError::WrongParents { .. }))
        ));
        assert!(matches!(
            board.create_polar_line(&[circle]),
            Err(BoardError::Construction(ConstructionError::Arity { .. }))
        ));
        assert!(matches!(
            board.create_parallel(&[a, circle]),
            Err(BoardError::Construction(ConstructionError::WrongParents { .. }))
        ));
    }
}
