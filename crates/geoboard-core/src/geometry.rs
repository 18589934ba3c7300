//! 几何图元
//!
//! 滑动点和磁吸可以绑定的宿主图形：
//! - 圆 (Circle)
//! - 圆弧/扇形 (Arc)
//! - 二次曲线 (Conic)
//! - 多边形 (Polygon)
//! - 刻度 (Ticks)，不可作为滑动对象
//!
//! 曲线与海龟轨迹见 [`crate::curve`]。

use crate::board::Board;
use crate::element::{ElementId, ElementType, Shape};
use crate::error::{BoardError, BoardResult, ConstructionError};
use crate::math::{distance, Homogeneous, Matrix, EPSILON};
use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 圆的半径来源
#[derive(Debug, Clone)]
pub enum RadiusSource {
    Term(Term),
    /// 圆周上的一点
    Point(ElementId),
}

/// 圆
#[derive(Debug, Clone)]
pub struct Circle {
    pub center: ElementId,
    pub radius_source: RadiusSource,
    /// 最近一次更新得到的半径
    pub radius: f64,
}

impl Circle {
    /// 圆的二次型矩阵（作用于 `(w, x, y)`）
    pub fn quadratic_form(&self, center: &Homogeneous) -> Matrix {
        circle_matrix(center, self.radius)
    }
}

fn circle_matrix(center: &Homogeneous, r: f64) -> Matrix {
    let (m, n) = (center[1], center[2]);
    Matrix::new(
        m * m + n * n - r * r, -m, -n,
        -m, 1.0, 0.0,
        -n, 0.0, 1.0,
    )
}

/// 圆弧取哪一段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArcSelection {
    /// 从半径点逆时针到角度点
    #[default]
    Auto,
    /// 劣弧
    Minor,
    /// 优弧
    Major,
}

/// 圆弧或扇形
#[derive(Debug, Clone)]
pub struct Arc {
    pub center: ElementId,
    pub radius_point: ElementId,
    pub angle_point: ElementId,
    pub selection: ArcSelection,
    pub sector: bool,
    pub radius: f64,
}

/// 由二次型矩阵给出的二次曲线
#[derive(Debug, Clone)]
pub struct Conic {
    pub quadratic_form: Matrix,
}

/// 多边形，边是多边形拥有的线段
#[derive(Debug, Clone, Default)]
pub struct Polygon {
    pub vertices: Vec<ElementId>,
    pub borders: Vec<ElementId>,
}

/// 直线上的刻度
#[derive(Debug, Clone)]
pub struct Ticks {
    pub line: ElementId,
    /// 主刻度间距
    pub distance: f64,
    /// 两个主刻度之间的次刻度数
    pub minor_ticks: u32,
}

impl Ticks {
    /// 最小刻度步长
    pub fn step(&self) -> f64 {
        self.distance / (self.minor_ticks as f64 + 1.0)
    }
}

/// 圆弧在绑定时用到的几何量（用户坐标）
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArcGeometry {
    pub center: Homogeneous,
    pub radius_point: Homogeneous,
    pub radius: f64,
    /// 角度范围 [alpha, beta]，以半径点方向为 0
    pub alpha: f64,
    pub beta: f64,
    /// 半径点相对 x 轴正方向的角度
    pub base_angle: f64,
}

impl ArcGeometry {
    pub fn delta(&self) -> f64 {
        self.beta - self.alpha
    }

    /// 角度超出范围时夹到较近的端点，返回 (角度, 是否被夹)
    pub fn clamp_angle(&self, angle: f64) -> (f64, bool) {
        if angle >= self.alpha && angle <= self.beta {
            return (angle, false);
        }
        let to_alpha = (self.alpha - angle).rem_euclid(2.0 * PI);
        let to_beta = (angle - self.beta).rem_euclid(2.0 * PI);
        if to_alpha < to_beta {
            (self.alpha, true)
        } else {
            (self.beta, true)
        }
    }
}

impl Board {
    // === 构造 ===

    /// 圆心 + 半径
    pub fn create_circle(&mut self, center: ElementId, radius: impl Into<Term>) -> BoardResult<ElementId> {
        let radius = radius.into();
        self.require_point("circle", center, "[point, number|function]")?;
        let mut parents = vec![center];
        parents.extend(radius.deps());
        let circle = Circle {
            center,
            radius_source: RadiusSource::Term(radius),
            radius: f64::NAN,
        };
        let id = self.add_element(ElementType::Circle, Shape::Circle(circle), &parents)?;
        self.full_update(id)?;
        Ok(id)
    }

    /// 圆心 + 圆周上一点
    pub fn create_circle_through(&mut self, center: ElementId, on: ElementId) -> BoardResult<ElementId> {
        self.require_point("circle", center, "[point, point]")?;
        self.require_point("circle", on, "[point, point]")?;
        let circle = Circle {
            center,
            radius_source: RadiusSource::Point(on),
            radius: f64::NAN,
        };
        let id = self.add_element(ElementType::Circle, Shape::Circle(circle), &[center, on])?;
        self.full_update(id)?;
        Ok(id)
    }

    /// 圆弧：圆心、半径点、角度点
    pub fn create_arc(
        &mut self,
        center: ElementId,
        radius_point: ElementId,
        angle_point: ElementId,
        selection: ArcSelection,
    ) -> BoardResult<ElementId> {
        self.create_arc_like(center, radius_point, angle_point, selection, false)
    }

    /// 扇形
    pub fn create_sector(
        &mut self,
        center: ElementId,
        radius_point: ElementId,
        angle_point: ElementId,
        selection: ArcSelection,
    ) -> BoardResult<ElementId> {
        self.create_arc_like(center, radius_point, angle_point, selection, true)
    }

    fn create_arc_like(
        &mut self,
        center: ElementId,
        radius_point: ElementId,
        angle_point: ElementId,
        selection: ArcSelection,
        sector: bool,
    ) -> BoardResult<ElementId> {
        let what = if sector { "sector" } else { "arc" };
        for p in [center, radius_point, angle_point] {
            self.require_point(what, p, "[point, point, point]")?;
        }
        let arc = Arc {
            center,
            radius_point,
            angle_point,
            selection,
            sector,
            radius: f64::NAN,
        };
        let elem_type = if sector { ElementType::Sector } else { ElementType::Arc };
        let id = self.add_element(elem_type, Shape::Arc(arc), &[center, radius_point, angle_point])?;
        self.full_update(id)?;
        Ok(id)
    }

    /// 二次曲线
    pub fn create_conic(&mut self, quadratic_form: Matrix) -> BoardResult<ElementId> {
        let sym = (quadratic_form + quadratic_form.transpose()) * 0.5;
        let id = self.add_element(
            ElementType::Conic,
            Shape::Conic(Conic { quadratic_form: sym }),
            &[],
        )?;
        self.full_update(id)?;
        Ok(id)
    }

    /// 多边形，同时创建首尾相接的边
    pub fn create_polygon(&mut self, vertices: &[ElementId]) -> BoardResult<ElementId> {
        if vertices.len() < 3 {
            return Err(ConstructionError::Arity {
                what: "polygon",
                expected: "at least 3",
                got: vertices.len(),
            }
            .into());
        }
        for v in vertices {
            self.require_point("polygon", *v, "[point, point, point, ...]")?;
        }

        let poly = Polygon {
            vertices: vertices.to_vec(),
            borders: Vec::new(),
        };
        let id = self.add_element(ElementType::Polygon, Shape::Polygon(poly), vertices)?;

        let mut borders = Vec::with_capacity(vertices.len());
        for (i, v) in vertices.iter().enumerate() {
            let next = vertices[(i + 1) % vertices.len()];
            let border = self.create_segment(*v, next)?;
            self.line_mut(border)?.parent_polygon = Some(id);
            self.add_child(id, border)?;
            borders.push(border);
        }
        if let Shape::Polygon(p) = &mut self.element_mut(id)?.shape {
            p.borders = borders;
        }
        self.full_update(id)?;
        Ok(id)
    }

    /// 直线上的刻度
    pub fn create_ticks(&mut self, line: ElementId, distance: f64, minor_ticks: u32) -> BoardResult<ElementId> {
        self.line(line)?;
        let ticks = Ticks {
            line,
            distance,
            minor_ticks,
        };
        let id = self.add_element(ElementType::Ticks, Shape::Ticks(ticks), &[line])?;
        self.full_update(id)?;
        Ok(id)
    }

    /// 指定网格吸附使用哪组刻度的步长
    pub fn set_grid_ticks(&mut self, ticks: Option<ElementId>) -> BoardResult<()> {
        if let Some(t) = ticks {
            self.ticks(t)?;
        }
        self.grid_ticks = ticks;
        Ok(())
    }

    pub(crate) fn require_point(&self, what: &'static str, id: ElementId, expected: &'static str) -> BoardResult<()> {
        let el = self.element(id)?;
        if el.is_point() {
            Ok(())
        } else {
            Err(ConstructionError::WrongParents {
                what,
                found: el.elem_type.name().to_string(),
                expected,
            }
            .into())
        }
    }

    // === 访问 ===

    pub fn circle(&self, id: ElementId) -> BoardResult<&Circle> {
        let el = self.element(id)?;
        el.as_circle().ok_or(BoardError::WrongKind {
            id,
            expected: "circle",
            found: el.elem_type.name(),
        })
    }

    pub fn arc(&self, id: ElementId) -> BoardResult<&Arc> {
        let el = self.element(id)?;
        match &el.shape {
            Shape::Arc(a) => Ok(a),
            _ => Err(BoardError::WrongKind {
                id,
                expected: "arc",
                found: el.elem_type.name(),
            }),
        }
    }

    pub fn polygon(&self, id: ElementId) -> BoardResult<&Polygon> {
        let el = self.element(id)?;
        match &el.shape {
            Shape::Polygon(p) => Ok(p),
            _ => Err(BoardError::WrongKind {
                id,
                expected: "polygon",
                found: el.elem_type.name(),
            }),
        }
    }

    pub fn ticks(&self, id: ElementId) -> BoardResult<&Ticks> {
        let el = self.element(id)?;
        match &el.shape {
            Shape::Ticks(t) => Ok(t),
            _ => Err(BoardError::WrongKind {
                id,
                expected: "ticks",
                found: el.elem_type.name(),
            }),
        }
    }

    /// 圆心（用户坐标）与半径
    pub fn circle_params(&self, id: ElementId) -> BoardResult<(Homogeneous, f64)> {
        let c = self.circle(id)?;
        Ok((self.coords(c.center)?.usr_coords, c.radius))
    }

    /// 圆、圆弧所在圆或二次曲线的二次型矩阵
    pub fn quadratic_form(&self, id: ElementId) -> BoardResult<Matrix> {
        let el = self.element(id)?;
        match &el.shape {
            Shape::Circle(c) => Ok(c.quadratic_form(&self.coords(c.center)?.usr_coords)),
            Shape::Arc(_) => {
                let geo = self.arc_geometry(id)?;
                Ok(circle_matrix(&geo.center, geo.radius))
            }
            Shape::Conic(c) => Ok(c.quadratic_form),
            _ => Err(BoardError::WrongKind {
                id,
                expected: "circle, arc or conic",
                found: el.elem_type.name(),
            }),
        }
    }

    pub(crate) fn arc_geometry(&self, id: ElementId) -> BoardResult<ArcGeometry> {
        let a = self.arc(id)?;
        let center = self.coords(a.center)?.usr_coords;
        let radius_point = self.coords(a.radius_point)?.usr_coords;
        let angle_point = self.coords(a.angle_point)?.usr_coords;
        let c = [center[1], center[2]];
        let rp = [radius_point[1], radius_point[2]];

        let mut alpha = 0.0;
        let mut beta = crate::math::rad(rp, c, [angle_point[1], angle_point[2]]);
        let swap = match a.selection {
            ArcSelection::Minor => beta > PI,
            ArcSelection::Major => beta < PI,
            ArcSelection::Auto => false,
        };
        if swap {
            alpha = beta;
            beta = 2.0 * PI;
        }

        Ok(ArcGeometry {
            center,
            radius_point,
            radius: a.radius,
            alpha,
            beta,
            base_angle: crate::math::rad([c[0] + 1.0, c[1]], c, rp),
        })
    }

    /// 网格吸附的刻度步长
    pub(crate) fn tick_step(&self) -> f64 {
        self.grid_ticks
            .and_then(|t| self.ticks(t).ok())
            .map(Ticks::step)
            .filter(|s| *s > EPSILON)
            .unwrap_or(self.config.default_tick_step)
    }

    // === 更新 ===

    pub(crate) fn update_circle(&mut self, id: ElementId) -> BoardResult<()> {
        let c = self.circle(id)?;
        let radius = match &c.radius_source {
            RadiusSource::Term(t) => t.eval(self).abs(),
            RadiusSource::Point(p) => {
                distance(&self.coords(c.center)?.usr_coords, &self.coords(*p)?.usr_coords)
            }
        };
        if let Shape::Circle(c) = &mut self.element_mut(id)?.shape {
            c.radius = radius;
        }
        Ok(())
    }

    pub(crate) fn update_arc(&mut self, id: ElementId) -> BoardResult<()> {
        let a = self.arc(id)?;
        let radius = distance(&self.coords(a.center)?.usr_coords, &self.coords(a.radius_point)?.usr_coords);
        if let Shape::Arc(a) = &mut self.element_mut(id)?.shape {
            a.radius = radius;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CoordFrame;
    use nalgebra::Vector3;

    #[test]
    fn test_circle_radius_follows_point() {
        let mut board = Board::default();
        let m = board.create_point([0.0, 0.0]).unwrap();
        let p = board.create_point([3.0, 4.0]).unwrap();
        let c = board.create_circle_through(m, p).unwrap();
        assert!((board.circle(c).unwrap().radius - 5.0).abs() < EPSILON);

        board.set_position(p, CoordFrame::User, [1.0, 0.0]).unwrap();
        assert!((board.circle(c).unwrap().radius - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_circle_quadratic_form() {
        let mut board = Board::default();
        let m = board.create_point([1.0, 2.0]).unwrap();
        let c = board.create_circle(m, 2.0).unwrap();
        let q = board.quadratic_form(c).unwrap();
        let on = Vector3::new(1.0, 3.0, 2.0);
        assert!((on.dot(&(q * on))).abs() < EPSILON);
    }

    #[test]
    fn test_circle_requires_point_center() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let c = board.create_circle(a, 1.0).unwrap();
        let err = board.create_circle(c, 1.0).unwrap_err();
        assert!(matches!(err, BoardError::Construction(ConstructionError::WrongParents { .. })));
    }

    #[test]
    fn test_polygon_borders() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([4.0, 0.0]).unwrap();
        let c = board.create_point([0.0, 3.0]).unwrap();
        let poly = board.create_polygon(&[a, b, c]).unwrap();
        let borders = board.polygon(poly).unwrap().borders.clone();
        assert_eq!(borders.len(), 3);
        for border in &borders {
            assert_eq!(board.line(*border).unwrap().parent_polygon, Some(poly));
        }
        assert!(board.create_polygon(&[a, b]).is_err());
    }

    #[test]
    fn test_arc_geometry_selection() {
        let mut board = Board::default();
        let m = board.create_point([0.0, 0.0]).unwrap();
        let r = board.create_point([1.0, 0.0]).unwrap();
        let a = board.create_point([0.0, -1.0]).unwrap();

        let auto = board.create_arc(m, r, a, ArcSelection::Auto).unwrap();
        let g = board.arc_geometry(auto).unwrap();
        assert!((g.beta - 1.5 * PI).abs() < EPSILON);
        assert_eq!(g.alpha, 0.0);

        let minor = board.create_arc(m, r, a, ArcSelection::Minor).unwrap();
        let g = board.arc_geometry(minor).unwrap();
        assert!((g.alpha - 1.5 * PI).abs() < EPSILON);
        assert!((g.beta - 2.0 * PI).abs() < EPSILON);
    }

    #[test]
    fn test_tick_step() {
        let mut board = Board::default();
        assert_eq!(board.tick_step(), 1.0);
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([1.0, 0.0]).unwrap();
        let axis = board.create_line(crate::line::LineParents::points(a, b)).unwrap();
        let ticks = board.create_ticks(axis, 1.0, 1).unwrap();
        board.set_grid_ticks(Some(ticks)).unwrap();
        assert_eq!(board.tick_step(), 0.5);
    }
}
