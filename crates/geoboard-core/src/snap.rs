//! 吸附与磁吸
//!
//! 自由设置坐标后依次执行：
//! 1. 网格吸附：坐标取到网格步长的整数倍
//! 2. 点吸附：落在某个可见点的吸附距离内时与它重合
//! 3. 磁吸：靠近磁吸对象时变成它上面的滑动点，远离到脱离距离以外时解除绑定

use crate::board::Board;
use crate::coords::{CoordFrame, Coords};
use crate::element::{ElementId, Shape};
use crate::error::BoardResult;
use crate::math::{round_to, Homogeneous};
use crate::projection::{
    project_coords_to_polygon, project_coords_to_segment, project_point_to_circle, project_point_to_curve,
    project_point_to_line, project_point_to_turtle,
};
use tracing::trace;

impl Board {
    /// 立即把点吸附到网格，不看 `snap_to_grid` 属性
    pub fn snap_to_grid(&mut self, id: ElementId) -> BoardResult<()> {
        self.snap_grid(id, true)?;
        self.update(Some(id));
        Ok(())
    }

    /// 立即把点吸附到最近的点，不看 `snap_to_points` 属性
    pub fn snap_to_points(&mut self, id: ElementId) -> BoardResult<()> {
        self.snap_points(id, true)?;
        self.update(Some(id));
        Ok(())
    }

    pub(crate) fn handle_snap_to_grid(&mut self, id: ElementId) -> BoardResult<()> {
        self.snap_grid(id, false)
    }

    pub(crate) fn handle_snap_to_points(&mut self, id: ElementId) -> BoardResult<()> {
        self.snap_points(id, false)
    }

    fn snap_grid(&mut self, id: ElementId, force: bool) -> BoardResult<()> {
        let c = self.coords_element(id)?;
        if !(c.attrs.snap_to_grid || force) {
            return Ok(());
        }

        let tick = self.tick_step();
        let sx = if c.attrs.snap_size_x <= 0.0 { tick } else { c.attrs.snap_size_x };
        let sy = if c.attrs.snap_size_y <= 0.0 { tick } else { c.attrs.snap_size_y };
        if sx <= 0.0 || sy <= 0.0 {
            return Ok(());
        }

        let [x, y] = c.coords.user_xy();
        let vp = *self.viewport();
        self.coords_element_mut(id)?
            .coords
            .set(CoordFrame::User, [round_to(x, sx), round_to(y, sy)], &vp);
        Ok(())
    }

    fn snap_points(&mut self, id: ElementId, force: bool) -> BoardResult<()> {
        let c = self.coords_element(id)?;
        if !(c.attrs.snap_to_points || force) {
            return Ok(());
        }
        let frame = c.attrs.attractor_unit.frame();
        let max = c.attrs.attractor_distance;

        let mut best: Option<(f64, Homogeneous)> = None;
        for el in self.elements() {
            if el.id == id || !el.visible || !el.is_point() || c.attrs.ignored_snap_to_points.contains(&el.id) {
                continue;
            }
            let Some(other) = el.as_coords() else {
                continue;
            };
            let d = other.coords.distance(frame, &c.coords);
            if d < max && best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, other.coords.usr_coords));
            }
        }

        if let Some((_, target)) = best {
            let vp = *self.viewport();
            self.coords_element_mut(id)?
                .coords
                .set_homogeneous(CoordFrame::User, target, &vp);
            trace!("{} snapped to a point", id);
        }
        Ok(())
    }

    /// 点到磁吸对象的投影
    fn project_to_attractor(&self, p: &Homogeneous, target: ElementId) -> BoardResult<Option<Homogeneous>> {
        let el = self.element(target)?;
        Ok(match &el.shape {
            Shape::Coords(c) if !c.is_text_like() => Some(c.coords.usr_coords),
            Shape::Line(l) => {
                let p1 = self.coords(l.point1)?.usr_coords;
                let p2 = self.coords(l.point2)?.usr_coords;
                let mut q = project_point_to_line(p, &l.stdform);
                if p1[0] != 0.0 && p2[0] != 0.0 {
                    let (_, lambda) = project_coords_to_segment(p, &p1, &p2);
                    if !l.straight_first && lambda < 0.0 {
                        q = p1;
                    } else if !l.straight_last && lambda > 1.0 {
                        q = p2;
                    }
                }
                Some(q)
            }
            Shape::Circle(circle) => Some(project_point_to_circle(
                p,
                &self.coords(circle.center)?.usr_coords,
                circle.radius,
            )),
            Shape::Arc(_) => {
                let geo = self.arc_geometry(target)?;
                Some(project_point_to_circle(p, &geo.center, geo.radius))
            }
            Shape::Curve(curve) => Some(project_point_to_curve(p, curve.min_t(), curve).0),
            Shape::Turtle(turtle) => Some(project_point_to_turtle(p, turtle).0),
            Shape::Polygon(poly) => {
                let vertices = poly
                    .vertices
                    .iter()
                    .map(|v| self.coords(*v).map(|c| c.usr_coords))
                    .collect::<BoardResult<Vec<_>>>()?;
                Some(project_coords_to_polygon(p, &vertices))
            }
            _ => None,
        })
    }

    /// 滑动对象是否就是磁吸对象；多边形上的滑动点实际绑定在它的某条边上
    fn slides_on(&self, slide: ElementId, target: ElementId) -> bool {
        slide == target
            || self
                .line(slide)
                .is_ok_and(|l| l.parent_polygon == Some(target))
    }

    /// 磁吸：绑定到列表中第一个足够近的对象
    pub(crate) fn handle_attractors(&mut self, id: ElementId) -> BoardResult<()> {
        let c = self.coords_element(id)?;
        if c.attrs.attractor_distance == 0.0 {
            return Ok(());
        }
        let attractors = c.attrs.attractors.clone();
        let frame = c.attrs.attractor_unit.frame();
        let (max, snatch) = (c.attrs.attractor_distance, c.attrs.snatch_distance);
        let vp = *self.viewport();

        for target in attractors {
            if target == id || !self.contains(target) {
                continue;
            }
            let c = self.coords_element(id)?;
            let p = c.coords;
            let bound = c
                .glider()
                .and_then(|g| g.slide_object())
                .is_some_and(|slide| self.slides_on(slide, target));
            let Some(q) = self.project_to_attractor(&p.usr_coords, target)? else {
                continue;
            };
            let d = Coords::from_homogeneous(CoordFrame::User, q, &vp).distance(frame, &p);

            if d < max {
                if !bound {
                    trace!("{} attracted by {}", id, target);
                    self.make_glider(id, target)?;
                }
                break;
            }
            if bound && d >= snatch {
                trace!("{} snatched away from {}", id, target);
                self.pop_slide_object(id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::LineParents;
    use crate::math::EPSILON;
    use crate::point::{AttractorUnit, PointAttributes};

    #[test]
    fn test_snap_to_grid() {
        let mut board = Board::default();
        let attrs = PointAttributes {
            snap_to_grid: true,
            snap_size_x: 0.5,
            snap_size_y: 2.0,
            ..Default::default()
        };
        let p = board.create_point_with([0.0, 0.0], attrs).unwrap();
        board.set_position(p, CoordFrame::User, [1.3, 2.9]).unwrap();
        assert_eq!(board.coords(p).unwrap().user_xy(), [1.5, 2.0]);
    }

    #[test]
    fn test_snap_to_grid_uses_tick_step() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([1.0, 0.0]).unwrap();
        let axis = board.create_line(LineParents::points(a, b)).unwrap();
        let ticks = board.create_ticks(axis, 2.0, 3).unwrap();
        board.set_grid_ticks(Some(ticks)).unwrap();

        let attrs = PointAttributes {
            snap_to_grid: true,
            snap_size_x: 0.0,
            snap_size_y: -1.0,
            ..Default::default()
        };
        let p = board.create_point_with([0.0, 0.0], attrs).unwrap();
        board.set_position(p, CoordFrame::User, [1.2, 0.7]).unwrap();
        assert_eq!(board.coords(p).unwrap().user_xy(), [1.0, 0.5]);
    }

    #[test]
    fn test_snap_to_points() {
        let mut board = Board::default();
        let a = board.create_point([1.0, 1.0]).unwrap();
        let b = board.create_point([3.0, 3.0]).unwrap();
        let attrs = PointAttributes {
            snap_to_points: true,
            attractor_distance: 0.5,
            ..Default::default()
        };
        let p = board.create_point_with([0.0, 0.0], attrs).unwrap();

        board.set_position(p, CoordFrame::User, [1.2, 0.9]).unwrap();
        assert_eq!(board.coords(p).unwrap().user_xy(), board.coords(a).unwrap().user_xy());

        // 忽略列表里的点不吸附
        board.attributes_mut(p).unwrap().ignored_snap_to_points = vec![b];
        board.set_position(p, CoordFrame::User, [3.1, 3.0]).unwrap();
        assert_eq!(board.coords(p).unwrap().user_xy(), [3.1, 3.0]);

        // 屏幕单位：0.5 像素内才吸附
        board.attributes_mut(p).unwrap().attractor_unit = AttractorUnit::Screen;
        board.set_position(p, CoordFrame::User, [1.2, 1.0]).unwrap();
        assert_eq!(board.coords(p).unwrap().user_xy(), [1.2, 1.0]);
    }

    #[test]
    fn test_attractor_binds_to_circle() {
        let mut board = Board::default();
        let o = board.create_point([0.0, 0.0]).unwrap();
        let circle = board.create_circle(o, 2.0).unwrap();
        let attrs = PointAttributes {
            attractors: vec![circle],
            attractor_distance: 0.1,
            snatch_distance: 1.0,
            ..Default::default()
        };
        let p = board.create_point_with([5.0, 5.0], attrs).unwrap();

        board.set_position(p, CoordFrame::User, [2.05, 0.0]).unwrap();
        let c = board.coords_element(p).unwrap();
        assert!(c.is_glider());
        assert_eq!(c.glider().unwrap().slide_object(), Some(circle));
        let [x, y] = board.coords(p).unwrap().user_xy();
        assert!((x.hypot(y) - 2.0).abs() < EPSILON);

        // 在脱离距离内仍然被吸在圆上
        board.set_position(p, CoordFrame::User, [0.0, 2.5]).unwrap();
        assert!(board.coords_element(p).unwrap().is_glider());
        let [x, y] = board.coords(p).unwrap().user_xy();
        assert!((x.hypot(y) - 2.0).abs() < EPSILON);

        // 拉远到脱离距离以外，恢复为自由点
        board.set_position(p, CoordFrame::User, [0.0, 4.0]).unwrap();
        assert!(!board.coords_element(p).unwrap().is_glider());
        assert_eq!(board.coords(p).unwrap().user_xy(), [0.0, 4.0]);
        assert!(board.element(p).unwrap().parents().is_empty());
    }

    #[test]
    fn test_attractor_on_segment_and_polygon() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([2.0, 0.0]).unwrap();
        let seg = board.create_segment(a, b).unwrap();
        let attrs = PointAttributes {
            attractors: vec![seg],
            attractor_distance: 0.2,
            snatch_distance: 0.5,
            ..Default::default()
        };
        let p = board.create_point_with([5.0, 5.0], attrs).unwrap();
        // 投影落在线段延长线上，按端点计算距离，不吸附
        board.set_position(p, CoordFrame::User, [3.0, 0.1]).unwrap();
        assert!(!board.coords_element(p).unwrap().is_glider());
        board.set_position(p, CoordFrame::User, [1.0, 0.1]).unwrap();
        assert!(board.coords_element(p).unwrap().is_glider());

        let vs: Vec<ElementId> = [[0.0, 3.0], [1.0, 3.0], [1.0, 4.0]]
            .iter()
            .map(|v| board.create_point(*v).unwrap())
            .collect();
        let poly = board.create_polygon(&vs).unwrap();
        let attrs = PointAttributes {
            attractors: vec![poly],
            attractor_distance: 0.2,
            ..Default::default()
        };
        let q = board.create_point_with([5.0, 5.0], attrs).unwrap();
        board.set_position(q, CoordFrame::User, [1.1, 3.5]).unwrap();
        let g = board.coords_element(q).unwrap().glider().unwrap().clone();
        assert!(g.on_polygon);
        assert_eq!(g.slide_object(), Some(board.polygon(poly).unwrap().borders[1]));
    }

    #[test]
    fn test_polygon_attractor_binds_once_and_releases() {
        let mut board = Board::default();
        let vs: Vec<ElementId> = [[0.0, 0.0], [4.0, 0.0], [2.0, 3.0]]
            .iter()
            .map(|v| board.create_point(*v).unwrap())
            .collect();
        let poly = board.create_polygon(&vs).unwrap();
        let bottom = board.polygon(poly).unwrap().borders[0];
        let attrs = PointAttributes {
            attractors: vec![poly],
            attractor_distance: 0.5,
            snatch_distance: 2.0,
            ..Default::default()
        };
        let p = board.create_point_with([2.0, -5.0], attrs).unwrap();

        for x in [1.0, 2.0, 3.0] {
            board.set_position(p, CoordFrame::User, [x, -0.2]).unwrap();
        }
        let g = board.coords_element(p).unwrap().glider().unwrap().clone();
        assert_eq!(g.slides, vec![bottom]);
        assert!(board.coords(p).unwrap().y().abs() < EPSILON);

        // 小于脱离距离时仍留在边上
        board.set_position(p, CoordFrame::User, [2.0, -1.0]).unwrap();
        assert!(board.coords_element(p).unwrap().is_glider());

        board.set_position(p, CoordFrame::User, [2.0, -10.0]).unwrap();
        assert!(!board.coords_element(p).unwrap().is_glider());
        assert_eq!(board.coords(p).unwrap().user_xy(), [2.0, -10.0]);
        assert!(!board.element(bottom).unwrap().children.contains(&p));
    }
}
