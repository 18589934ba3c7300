//! 滑动点
//!
//! 滑动点绑定在一个滑动对象上（直线、圆、圆弧、曲线、海龟路径或另一个点），
//! 用一个标量 `position` 描述它在对象上的位置。
//!
//! 两个方向的计算必须互逆：
//! - `update_glider`：滑动点自己被移动，由坐标求 `position`
//! - `update_glider_from_parent`：滑动对象变了，由 `position` 求坐标
//!
//! 直线参数的约定：
//! - 两端都是有限点：point1 处为 0，point2 处为 1
//! - point2 是无穷远点：`position ∈ (-1, 1)`，0 对应 point1，±1 对应 point2
//! - point1 是无穷远点：`position ∈ (0, 2)`，1 对应 point2，0 和 2 对应 point1

use crate::board::Board;
use crate::coords::CoordFrame;
use crate::element::{ElementId, ElementType, Shape};
use crate::error::{BoardError, BoardResult, GliderError};
use crate::math::{point, rad, round_to, Homogeneous, EPSILON};
use crate::point::{Constraint, GliderState, PointAttributes};
use crate::projection::{
    closest_point_on_segment, project_point_to_circle, project_point_to_curve, project_point_to_line,
    project_point_to_point, project_point_to_turtle,
};
use std::f64::consts::PI;
use tracing::{debug, trace};

/// 直线上的参数，按坐标变化较大的轴计算
fn axis_parameter(q: &Homogeneous, from: &Homogeneous, dir: &Homogeneous) -> f64 {
    let i = if dir[1].abs() < EPSILON { 2 } else { 1 };
    (q[i] - from[i]) / dir[i]
}

/// 直线上一点 `q` 的参数
pub(crate) fn line_parameter(q: &Homogeneous, p1: &Homogeneous, p2: &Homogeneous) -> f64 {
    if p2[0].abs() < EPSILON {
        let d = axis_parameter(q, p1, p2);
        let sgn = if d >= 0.0 { 1.0 } else { -1.0 };
        let d = d.abs();
        sgn * d / (d + 1.0)
    } else if p1[0].abs() < EPSILON {
        let d = axis_parameter(q, p2, p1);
        if d < 0.0 {
            (1.0 - 2.0 * d) / (1.0 - d)
        } else {
            1.0 / (d + 1.0)
        }
    } else {
        axis_parameter(q, p1, &(p2 - p1))
    }
}

/// `line_parameter` 的逆
pub(crate) fn line_point(position: f64, p1: &Homogeneous, p2: &Homogeneous) -> Homogeneous {
    if p2[0].abs() < EPSILON {
        let mut l = position.abs().min(1.0 - EPSILON);
        l /= 1.0 - l;
        if position < 0.0 {
            l = -l;
        }
        p1 + p2 * l
    } else if p1[0].abs() < EPSILON {
        let l = position.clamp(EPSILON, 2.0 - EPSILON);
        let l = if l > 1.0 { (l - 1.0) / (l - 2.0) } else { (1.0 - l) / l };
        p2 + p1 * l
    } else {
        p1 + (p2 - p1) * position
    }
}

/// 滑块的取值吸附：先看吸附值列表，再看步长。返回吸附后的参数
fn snap_glider_position(position: f64, attrs: &PointAttributes) -> Option<f64> {
    let (smin, smax) = attrs.slider_range.unwrap_or((0.0, 1.0));
    let span = smax - smin;
    if span.abs() < EPSILON {
        return None;
    }

    let value = smin + position * span;
    let nearest = attrs
        .snap_values
        .iter()
        .copied()
        .min_by(|a, b| (value - a).abs().total_cmp(&(value - b).abs()));
    if let Some(target) = nearest {
        if (value - target).abs() < attrs.snap_value_distance {
            return Some((target - smin) / span);
        }
    }

    let width = attrs.snap_width.filter(|w| *w > 0.0)?;
    let value = smin + position.clamp(0.0, 1.0) * span;
    Some((round_to(value, width) - smin) / span)
}

impl Board {
    /// 在 `xy` 处创建一个绑定到 `slide` 的滑动点
    pub fn create_glider(&mut self, xy: [f64; 2], slide: ElementId) -> BoardResult<ElementId> {
        let id = self.create_point(xy)?;
        self.make_glider(id, slide)?;
        Ok(id)
    }

    /// 把点变成滑动点，`target` 压入滑动对象栈
    ///
    /// 多边形会被替换成离点最近的边，并开启沿边界行走。刻度、二次曲线、文本不能作为滑动对象。
    pub fn make_glider(&mut self, id: ElementId, target: ElementId) -> BoardResult<()> {
        let p = self.coords(id)?.usr_coords;
        let target_el = self.element(target)?;
        let (slide, on_polygon) = match &target_el.shape {
            Shape::Polygon(poly) => {
                let border = self.nearest_border(&p, &poly.borders)?;
                (border, true)
            }
            Shape::Ticks(_) | Shape::Conic(_) => {
                return Err(GliderError::NotGlidable {
                    id: target,
                    kind: target_el.elem_type.name(),
                }
                .into())
            }
            Shape::Coords(c) if c.is_text_like() => {
                return Err(GliderError::NotGlidable {
                    id: target,
                    kind: target_el.elem_type.name(),
                }
                .into())
            }
            _ => (target, false),
        };

        if slide == id || self.descendants(id).contains(&slide) {
            return Err(BoardError::Cycle { parent: slide, child: id });
        }

        if !self.coords_element(id)?.is_glider() {
            self.detach_mode(id)?;
        }
        let c = self.coords_element_mut(id)?;
        match c.glider_mut() {
            Some(g) => {
                g.slides.push(slide);
                g.on_polygon = on_polygon;
            }
            None => c.mode = Constraint::Glider(GliderState::new(slide, on_polygon)),
        }
        c.attrs.snap_width = None;
        c.is_draggable = true;
        self.element_mut(id)?.elem_type = ElementType::Glider;
        self.add_child(slide, id)?;

        self.update_glider(id)?;
        self.set_needs_update_from_parent(id, true)?;
        self.update_glider_from_parent(id)?;
        debug!("{} glides on {}", id, slide);
        self.update(None);
        Ok(())
    }

    /// 离 `p` 最近的多边形边
    fn nearest_border(&self, p: &Homogeneous, borders: &[ElementId]) -> BoardResult<ElementId> {
        let mut best = None;
        let mut mindist = f64::INFINITY;
        for b in borders {
            let l = self.line(*b)?;
            let q = closest_point_on_segment(p, &self.coords(l.point1)?.usr_coords, &self.coords(l.point2)?.usr_coords);
            let d = crate::math::distance(&q, p);
            if d < mindist || best.is_none() {
                mindist = d;
                best = Some(*b);
            }
        }
        best.ok_or(BoardError::Construction(crate::error::ConstructionError::Arity {
            what: "polygon",
            expected: "at least 3",
            got: 0,
        }))
    }

    /// 弹出当前滑动对象
    ///
    /// 栈空时回到自由状态，类型恢复为创建时的类型；否则在新的栈顶上重算。
    pub fn pop_slide_object(&mut self, id: ElementId) -> BoardResult<()> {
        let c = self.coords_element_mut(id)?;
        let Some(g) = c.glider_mut() else {
            return Ok(());
        };
        let Some(top) = g.slides.pop() else {
            return Ok(());
        };
        let still_used = g.slides.contains(&top);
        let empty = g.slides.is_empty();
        if empty {
            c.mode = Constraint::Free;
        }
        if !still_used {
            self.remove_child(top, id);
        }
        debug!("{} released from {}", id, top);

        if empty {
            self.restore_type(id)
        } else {
            self.update_glider(id)
        }
    }

    /// 从滑动对象栈中移除某个对象（对象被删除时使用）
    pub(crate) fn drop_slide_object(&mut self, id: ElementId, slide: ElementId) -> BoardResult<()> {
        let c = self.coords_element_mut(id)?;
        let Some(g) = c.glider_mut() else {
            return Ok(());
        };
        g.slides.retain(|s| *s != slide);
        let empty = g.slides.is_empty();
        if empty {
            c.mode = Constraint::Free;
        }
        self.remove_child(slide, id);
        debug!("{} lost slide object {}", id, slide);
        if empty {
            self.restore_type(id)
        } else {
            self.update_glider(id)
        }
    }

    fn restore_type(&mut self, id: ElementId) -> BoardResult<()> {
        let el = self.element_mut(id)?;
        el.elem_type = match el.org_type {
            ElementType::Glider => ElementType::Point,
            t => t,
        };
        Ok(())
    }

    /// 直接设置滑动点的参数，然后更新画板
    pub fn set_glider_position(&mut self, id: ElementId, position: f64) -> BoardResult<()> {
        let g = self
            .coords_element_mut(id)?
            .glider_mut()
            .ok_or(GliderError::NotAGlider(id))?;
        g.position = position;
        g.needs_update_from_parent = true;
        self.update_glider_from_parent(id)?;
        self.update(None);
        Ok(())
    }

    pub fn glider_position(&self, id: ElementId) -> BoardResult<f64> {
        self.coords_element(id)?
            .glider()
            .map(|g| g.position)
            .ok_or_else(|| GliderError::NotAGlider(id).into())
    }

    fn set_needs_update_from_parent(&mut self, id: ElementId, value: bool) -> BoardResult<()> {
        if let Some(g) = self.coords_element_mut(id)?.glider_mut() {
            g.needs_update_from_parent = value;
        }
        Ok(())
    }

    // === 由坐标求参数 ===

    /// 滑动点被直接移动后，投影到滑动对象上并重新计算参数
    pub(crate) fn update_glider(&mut self, id: ElementId) -> BoardResult<()> {
        let c = self.coords_element(id)?;
        let Some(g) = c.glider() else {
            return Ok(());
        };
        let Some(slide) = g.slide_object() else {
            return Ok(());
        };
        let p = c.coords.usr_coords;
        let old_position = g.position;

        let (new_slide, coords, position, resync) = match &self.element(slide)?.shape {
            Shape::Circle(circle) => {
                let center = self.coords(circle.center)?.usr_coords;
                let q = project_point_to_circle(&p, &center, circle.radius);
                let pos = rad([center[1] + 1.0, center[2]], [center[1], center[2]], [q[1], q[2]]) / (2.0 * PI);
                (slide, q, pos, false)
            }
            Shape::Line(_) => self.glide_on_line(id, slide, &p)?,
            Shape::Arc(_) => {
                let geo = self.arc_geometry(slide)?;
                let q = project_point_to_circle(&p, &geo.center, geo.radius);
                let angle = rad(
                    [geo.radius_point[1], geo.radius_point[2]],
                    [geo.center[1], geo.center[2]],
                    [p[1], p[2]],
                );
                let (angle, clamped) = geo.clamp_angle(angle);
                let delta = geo.delta();
                let pos = if delta.abs() > EPSILON { angle / delta } else { angle };
                (slide, q, pos, clamped)
            }
            Shape::Curve(curve) => {
                let (q, t) = project_point_to_curve(&p, old_position, curve);
                (slide, q, t, false)
            }
            Shape::Turtle(turtle) => {
                let (q, t) = project_point_to_turtle(&p, turtle);
                (slide, q, t, false)
            }
            Shape::Coords(target) => (slide, project_point_to_point(&target.coords.usr_coords), old_position, false),
            _ => return Ok(()),
        };

        let vp = *self.viewport();
        let c = self.coords_element_mut(id)?;
        c.coords.set_homogeneous(CoordFrame::User, coords, &vp);
        if let Some(g) = c.glider_mut() {
            g.position = position;
            g.needs_update_from_parent = false;
            if let Some(top) = g.slides.last_mut() {
                *top = new_slide;
            }
        }

        if new_slide != slide {
            let still_used = self
                .coords_element(id)?
                .glider()
                .is_some_and(|g| g.slides.contains(&slide));
            if !still_used {
                self.remove_child(slide, id);
            }
            self.add_child(new_slide, id)?;
            trace!("{} walked from {} to {}", id, slide, new_slide);
        }

        if resync {
            self.set_needs_update_from_parent(id, true)?;
            self.update_glider_from_parent(id)?;
            self.set_needs_update_from_parent(id, false)?;
        }
        Ok(())
    }

    /// 直线上的投影、参数、吸附与端点截断
    ///
    /// 返回 (实际滑动的直线, 坐标, 参数, 是否需要按参数回写坐标)。
    fn glide_on_line(
        &self,
        id: ElementId,
        slide: ElementId,
        p: &Homogeneous,
    ) -> BoardResult<(ElementId, Homogeneous, f64, bool)> {
        let c = self.coords_element(id)?;
        let on_polygon = c.glider().is_some_and(|g| g.on_polygon);
        let mut slide = slide;

        if on_polygon {
            let l = self.line(slide)?;
            if let Some(poly) = l.parent_polygon {
                let p1 = self.coords(l.point1)?.usr_coords;
                let p2 = self.coords(l.point2)?.usr_coords;
                let q = project_point_to_line(p, &l.stdform);
                let pos = axis_parameter(&q, &p1, &(p2 - p1));
                let borders = &self.polygon(poly)?.borders;
                if let Some(i) = borders.iter().position(|b| *b == slide) {
                    let n = borders.len();
                    if pos < 0.0 {
                        slide = borders[(i + n - 1) % n];
                    } else if pos > 1.0 {
                        slide = borders[(i + 1) % n];
                    }
                }
            }
        }

        let l = self.line(slide)?;
        let p1 = self.coords(l.point1)?;
        let p2 = self.coords(l.point2)?;

        let (mut q, mut pos) = if p1.distance(CoordFrame::User, p2) < EPSILON {
            (p1.usr_coords, 0.0)
        } else {
            let q = project_point_to_line(p, &l.stdform);
            (q, line_parameter(&q, &p1.usr_coords, &p2.usr_coords))
        };

        let mut resync = false;
        if let Some(snapped) = snap_glider_position(pos, &c.attrs) {
            pos = snapped;
            resync = true;
        }

        if !l.straight_first && !p1.is_ideal() && pos < 0.0 {
            q = p1.usr_coords;
            pos = 0.0;
        }
        if !l.straight_last && !p2.is_ideal() && pos > 1.0 {
            q = p2.usr_coords;
            pos = 1.0;
        }
        Ok((slide, q, pos, resync))
    }

    // === 由参数求坐标 ===

    /// 滑动对象变化后，按保存的参数重算坐标
    ///
    /// 同一遍更新中刚做过 `update_glider` 时跳过一次。
    pub(crate) fn update_glider_from_parent(&mut self, id: ElementId) -> BoardResult<()> {
        let c = self.coords_element_mut(id)?;
        let Some(g) = c.glider_mut() else {
            return Ok(());
        };
        if !g.needs_update_from_parent {
            g.needs_update_from_parent = true;
            return Ok(());
        }
        let Some(slide) = g.slide_object() else {
            return Ok(());
        };
        let position = g.position;

        let mut new_position = None;
        let coords = match &self.element(slide)?.shape {
            Shape::Circle(circle) => {
                let center = self.coords(circle.center)?.usr_coords;
                let (s, co) = (2.0 * PI * position).sin_cos();
                point(center[1] + circle.radius * co, center[2] + circle.radius * s)
            }
            Shape::Line(l) => line_point(
                position,
                &self.coords(l.point1)?.usr_coords,
                &self.coords(l.point2)?.usr_coords,
            ),
            Shape::Arc(_) => {
                let geo = self.arc_geometry(slide)?;
                let delta = geo.delta();
                let (angle, clamped) = geo.clamp_angle(position * delta);
                if clamped && delta.abs() > EPSILON {
                    new_position = Some(angle / delta);
                }
                let (s, co) = (angle + geo.base_angle).sin_cos();
                point(geo.center[1] + geo.radius * co, geo.center[2] + geo.radius * s)
            }
            Shape::Curve(curve) => curve.point_at(position),
            Shape::Turtle(turtle) => {
                let [x, y] = turtle.point_at(position);
                point(x, y)
            }
            Shape::Coords(target) => target.coords.usr_coords,
            _ => return Ok(()),
        };

        let vp = *self.viewport();
        let c = self.coords_element_mut(id)?;
        c.coords.set_homogeneous(CoordFrame::User, coords, &vp);
        if let (Some(pos), Some(g)) = (new_position, c.glider_mut()) {
            g.position = pos;
        }
        Ok(())
    }
}
