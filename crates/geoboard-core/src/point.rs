//! 带位置的元素
//!
//! 点、文本、图片共享同一套坐标逻辑：
//! - 三份坐标快照：当前坐标、变换前坐标、变换后坐标
//! - 约束模式：自由 / 符号约束 / 滑动点 / 锚定
//! - 变换列表
//!
//! 滑动点的状态机在 [`crate::glider`] 中，吸附与磁吸在 [`crate::snap`] 中。

use crate::board::Board;
use crate::coords::{CoordFrame, Coords};
use crate::element::{ElementClass, ElementId, ElementType, Shape};
use crate::error::{BoardError, BoardResult, ConstructionError};
use crate::math::{point, Homogeneous};
use crate::term::Term;
use crate::transform::{compose, Transform, TransformKind};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// 返回齐次用户坐标的函数
pub type CoordsFn = Rc<dyn Fn(&Board) -> Homogeneous>;

/// 符号约束：坐标的求值规则
#[derive(Clone)]
pub enum CoordRule {
    /// 一个函数直接给出齐次坐标
    Coordinates { deps: Vec<ElementId>, f: CoordsFn },
    /// (x, y)
    Euclidean(Term, Term),
    /// (z, x, y)
    Homogeneous(Term, Term, Term),
}

impl CoordRule {
    pub fn coordinates<F>(deps: impl Into<Vec<ElementId>>, f: F) -> Self
    where
        F: Fn(&Board) -> Homogeneous + 'static,
    {
        CoordRule::Coordinates {
            deps: deps.into(),
            f: Rc::new(f),
        }
    }

    pub fn eval(&self, board: &Board) -> Homogeneous {
        match self {
            CoordRule::Coordinates { f, .. } => f(board),
            CoordRule::Euclidean(x, y) => point(x.eval(board), y.eval(board)),
            CoordRule::Homogeneous(z, x, y) => {
                Vector3::new(z.eval(board), x.eval(board), y.eval(board))
            }
        }
    }

    pub fn deps(&self) -> Vec<ElementId> {
        match self {
            CoordRule::Coordinates { deps, .. } => deps.clone(),
            CoordRule::Euclidean(x, y) => [x.deps(), y.deps()].concat(),
            CoordRule::Homogeneous(z, x, y) => [z.deps(), x.deps(), y.deps()].concat(),
        }
    }
}

impl TryFrom<Vec<Term>> for CoordRule {
    type Error = ConstructionError;

    fn try_from(terms: Vec<Term>) -> Result<Self, Self::Error> {
        let got = terms.len();
        let mut it = terms.into_iter();
        match (it.next(), it.next(), it.next(), it.next()) {
            (Some(x), Some(y), None, None) => Ok(CoordRule::Euclidean(x, y)),
            (Some(z), Some(x), Some(y), None) => Ok(CoordRule::Homogeneous(z, x, y)),
            _ => Err(ConstructionError::Arity {
                what: "coordinate constraint",
                expected: "2 or 3",
                got,
            }),
        }
    }
}

impl fmt::Debug for CoordRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordRule::Coordinates { deps, .. } => write!(f, "Coordinates(deps: {deps:?})"),
            CoordRule::Euclidean(x, y) => write!(f, "Euclidean({x:?}, {y:?})"),
            CoordRule::Homogeneous(z, x, y) => write!(f, "Homogeneous({z:?}, {x:?}, {y:?})"),
        }
    }
}

/// 滑动点状态
#[derive(Debug, Clone, PartialEq)]
pub struct GliderState {
    /// 滑动对象栈，只有栈顶生效
    pub(crate) slides: Vec<ElementId>,
    /// 在滑动对象上的参数位置
    pub position: f64,
    /// 同一遍更新中已做过完整重算时置为 false，跳过下一次“从父元素更新”
    pub(crate) needs_update_from_parent: bool,
    /// 绑定在多边形边上，越过端点时走到相邻边
    pub on_polygon: bool,
}

impl GliderState {
    pub(crate) fn new(slide: ElementId, on_polygon: bool) -> Self {
        Self {
            slides: vec![slide],
            position: 0.0,
            needs_update_from_parent: true,
            on_polygon,
        }
    }

    /// 当前生效的滑动对象
    pub fn slide_object(&self) -> Option<ElementId> {
        self.slides.last().copied()
    }

    pub fn slide_objects(&self) -> &[ElementId] {
        &self.slides
    }
}

/// 锚定：文本/图片/标签相对另一个元素定位
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub element: ElementId,
    /// 相对坐标。标签用屏幕像素，其余用用户单位
    pub relative: [f64; 2],
    pub is_label: bool,
    /// 标签的额外像素偏移，y 向上为正
    pub offset: [f64; 2],
}

/// 约束模式，同一时刻只有一种生效
#[derive(Debug, Clone)]
pub enum Constraint {
    Free,
    Symbolic(CoordRule),
    Glider(GliderState),
    Anchored(Anchor),
}

impl Constraint {
    pub fn name(&self) -> &'static str {
        match self {
            Constraint::Free => "free",
            Constraint::Symbolic(_) => "symbolic",
            Constraint::Glider(_) => "glider",
            Constraint::Anchored(_) => "anchored",
        }
    }
}

/// 磁吸距离的度量单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttractorUnit {
    #[default]
    User,
    Screen,
}

impl AttractorUnit {
    pub fn frame(&self) -> CoordFrame {
        match self {
            AttractorUnit::User => CoordFrame::User,
            AttractorUnit::Screen => CoordFrame::Screen,
        }
    }
}

/// 点的行为属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointAttributes {
    /// 拖动时吸附到网格
    pub snap_to_grid: bool,
    /// 网格步长，非正值表示取刻度步长
    pub snap_size_x: f64,
    pub snap_size_y: f64,
    /// 拖动时吸附到附近的可见点
    pub snap_to_points: bool,
    pub ignored_snap_to_points: Vec<ElementId>,
    /// 磁吸对象
    pub attractors: Vec<ElementId>,
    /// 磁吸距离，为 0 时关闭磁吸
    pub attractor_distance: f64,
    /// 脱离距离：离开当前滑动对象超过该距离时解除绑定
    pub snatch_distance: f64,
    pub attractor_unit: AttractorUnit,
    /// 滑动位置的步长（按滑块值域计）
    pub snap_width: Option<f64>,
    /// 滑动位置的吸附值
    pub snap_values: Vec<f64>,
    pub snap_value_distance: f64,
    /// 滑块值域 [smin, smax]，缺省为 [0, 1]
    pub slider_range: Option<(f64, f64)>,
}

impl Default for PointAttributes {
    fn default() -> Self {
        Self {
            snap_to_grid: false,
            snap_size_x: 1.0,
            snap_size_y: 1.0,
            snap_to_points: false,
            ignored_snap_to_points: Vec::new(),
            attractors: Vec::new(),
            attractor_distance: 0.0,
            snatch_distance: 0.0,
            attractor_unit: AttractorUnit::User,
            snap_width: None,
            snap_values: Vec::new(),
            snap_value_distance: 0.0,
            slider_range: None,
        }
    }
}

/// 带位置元素的种类
#[derive(Debug, Clone, PartialEq)]
pub enum CoordsKind {
    Point,
    Text(String),
    Image { url: String, size: [f64; 2] },
}

/// 带位置的元素
#[derive(Debug, Clone)]
pub struct CoordsElement {
    /// 当前坐标
    pub coords: Coords,
    /// 变换前坐标（自由点带变换时用来反推输入）
    pub initial_coords: Coords,
    /// 变换后坐标（文本、图片由渲染器自行施加变换）
    pub actual_coords: Coords,
    pub(crate) mode: Constraint,
    pub(crate) transformations: Vec<Transform>,
    /// 变换的输入来源，`None` 表示没有变换
    pub(crate) base_element: Option<ElementId>,
    pub is_draggable: bool,
    pub fixed: bool,
    /// 冻结时不再执行符号约束
    pub frozen: bool,
    pub attrs: PointAttributes,
    pub kind: CoordsKind,
}

impl CoordsElement {
    pub fn new(coords: Coords, kind: CoordsKind) -> Self {
        Self {
            coords,
            initial_coords: coords,
            actual_coords: coords,
            mode: Constraint::Free,
            transformations: Vec::new(),
            base_element: None,
            is_draggable: true,
            fixed: false,
            frozen: false,
            attrs: PointAttributes::default(),
            kind,
        }
    }

    pub fn mode(&self) -> &Constraint {
        &self.mode
    }

    pub fn glider(&self) -> Option<&GliderState> {
        match &self.mode {
            Constraint::Glider(g) => Some(g),
            _ => None,
        }
    }

    pub(crate) fn glider_mut(&mut self) -> Option<&mut GliderState> {
        match &mut self.mode {
            Constraint::Glider(g) => Some(g),
            _ => None,
        }
    }

    pub fn is_glider(&self) -> bool {
        matches!(self.mode, Constraint::Glider(_))
    }

    pub fn is_constrained(&self) -> bool {
        matches!(self.mode, Constraint::Symbolic(_))
    }

    pub fn is_text_like(&self) -> bool {
        !matches!(self.kind, CoordsKind::Point)
    }

    /// 能否被拖动或被其他约束移动
    pub fn is_movable(&self) -> bool {
        self.is_draggable && !self.fixed && !self.is_glider()
    }

    pub fn transformations(&self) -> &[Transform] {
        &self.transformations
    }

    pub(crate) fn end_update_pass(&mut self) {
        if let Some(g) = self.glider_mut() {
            g.needs_update_from_parent = true;
        }
    }
}

impl Board {
    // === 构造 ===

    /// 自由点
    pub fn create_point(&mut self, xy: [f64; 2]) -> BoardResult<ElementId> {
        self.create_point_with(xy, PointAttributes::default())
    }

    /// 带属性的自由点
    pub fn create_point_with(&mut self, xy: [f64; 2], attrs: PointAttributes) -> BoardResult<ElementId> {
        let coords = Coords::new(CoordFrame::User, xy, self.viewport());
        let mut el = CoordsElement::new(coords, CoordsKind::Point);
        el.attrs = attrs;
        let id = self.add_element(ElementType::Point, Shape::Coords(el), &[])?;
        self.full_update(id)?;
        Ok(id)
    }

    /// 坐标由规则决定的点，不可拖动
    pub fn create_constrained_point(&mut self, rule: CoordRule) -> BoardResult<ElementId> {
        let id = self.create_point([0.0, 0.0])?;
        self.add_constraint(id, rule)?;
        Ok(id)
    }

    /// 两点的中点
    pub fn create_midpoint(&mut self, a: ElementId, b: ElementId) -> BoardResult<ElementId> {
        for p in [a, b] {
            if !self.element(p)?.is_point() {
                return Err(ConstructionError::WrongParents {
                    what: "midpoint",
                    found: self.element(p)?.elem_type.name().to_string(),
                    expected: "[point, point]",
                }
                .into());
            }
        }
        let rule = CoordRule::coordinates(vec![a, b], move |board: &Board| {
            match (board.coords(a), board.coords(b)) {
                (Ok(p), Ok(q)) => (p.usr_coords + q.usr_coords) * 0.5,
                _ => Vector3::new(f64::NAN, f64::NAN, f64::NAN),
            }
        });
        let id = self.create_constrained_point(rule)?;
        let el = self.element_mut(id)?;
        el.elem_type = ElementType::Midpoint;
        el.org_type = ElementType::Midpoint;
        Ok(id)
    }

    /// 对另一个点施加变换得到的点
    pub fn create_transformed_point(
        &mut self,
        base: ElementId,
        transforms: Vec<Transform>,
    ) -> BoardResult<ElementId> {
        let start = *self.coords(base)?;
        let mut deps = vec![base];
        deps.extend(transforms.iter().flat_map(Transform::deps));
        deps.sort();
        deps.dedup();

        let mut el = CoordsElement::new(start, CoordsKind::Point);
        el.transformations = transforms;
        el.base_element = Some(base);
        el.is_draggable = false;
        let id = self.add_element(ElementType::Point, Shape::Coords(el), &deps)?;
        self.full_update(id)?;
        Ok(id)
    }

    /// 文本
    pub fn create_text(&mut self, xy: [f64; 2], content: impl Into<String>) -> BoardResult<ElementId> {
        let coords = Coords::new(CoordFrame::User, xy, self.viewport());
        let el = CoordsElement::new(coords, CoordsKind::Text(content.into()));
        let id = self.add_element(ElementType::Text, Shape::Coords(el), &[])?;
        self.full_update(id)?;
        Ok(id)
    }

    /// 图片
    pub fn create_image(
        &mut self,
        xy: [f64; 2],
        url: impl Into<String>,
        size: [f64; 2],
    ) -> BoardResult<ElementId> {
        let coords = Coords::new(CoordFrame::User, xy, self.viewport());
        let kind = CoordsKind::Image {
            url: url.into(),
            size,
        };
        let id = self.add_element(ElementType::Image, Shape::Coords(CoordsElement::new(coords, kind)), &[])?;
        self.full_update(id)?;
        Ok(id)
    }

    pub fn attributes_mut(&mut self, id: ElementId) -> BoardResult<&mut PointAttributes> {
        Ok(&mut self.coords_element_mut(id)?.attrs)
    }

    pub fn set_fixed(&mut self, id: ElementId, fixed: bool) -> BoardResult<()> {
        self.coords_element_mut(id)?.fixed = fixed;
        Ok(())
    }

    // === 更新 ===

    /// 坐标更新：滑动点重算、符号约束、变换
    pub(crate) fn update_coords(&mut self, id: ElementId, from_parent: bool) -> BoardResult<()> {
        let (is_glider, frozen) = {
            let c = self.coords_element(id)?;
            (c.is_glider(), c.frozen)
        };

        if is_glider {
            if from_parent {
                self.update_glider_from_parent(id)?;
            } else {
                self.update_glider(id)?;
            }
        }
        if !frozen {
            self.update_constraint(id)?;
        }
        self.update_transform(id)
    }

    /// 执行符号约束或锚定规则
    fn update_constraint(&mut self, id: ElementId) -> BoardResult<()> {
        let vp = *self.viewport();
        let target = match &self.coords_element(id)?.mode {
            Constraint::Symbolic(rule) => Some((CoordFrame::User, rule.eval(self))),
            Constraint::Anchored(anchor) => Some(self.anchored_position(anchor)?),
            Constraint::Free | Constraint::Glider(_) => None,
        };
        if let Some((frame, c)) = target {
            self.coords_element_mut(id)?
                .coords
                .set_homogeneous(frame, c, &vp);
        }
        Ok(())
    }

    fn anchored_position(&self, anchor: &Anchor) -> BoardResult<(CoordFrame, Homogeneous)> {
        let base = self.text_anchor(anchor.element)?;
        if anchor.is_label {
            Ok((
                CoordFrame::Screen,
                Vector3::new(
                    1.0,
                    base.scr_coords[1] + anchor.relative[0] + anchor.offset[0],
                    base.scr_coords[2] + anchor.relative[1] - anchor.offset[1],
                ),
            ))
        } else {
            Ok((
                CoordFrame::User,
                point(
                    base.usr_coords[1] + anchor.relative[0],
                    base.usr_coords[2] + anchor.relative[1],
                ),
            ))
        }
    }

    /// 元素上用来挂文本/标签的位置
    pub fn text_anchor(&self, id: ElementId) -> BoardResult<Coords> {
        let vp = self.viewport();
        let el = self.element(id)?;
        let origin = Coords::new(CoordFrame::User, [0.0, 0.0], vp);
        Ok(match &el.shape {
            Shape::Coords(c) => c.coords,
            Shape::Line(l) => {
                let p1 = self.coords(l.point1)?;
                let p2 = self.coords(l.point2)?;
                if p1.is_real() && p2.is_real() {
                    Coords::from_homogeneous(
                        CoordFrame::User,
                        (p1.usr_coords + p2.usr_coords) * 0.5,
                        vp,
                    )
                } else if p1.is_real() {
                    *p1
                } else {
                    *p2
                }
            }
            Shape::Circle(c) => *self.coords(c.center)?,
            Shape::Arc(a) => *self.coords(a.center)?,
            Shape::Polygon(p) => match p.vertices.first() {
                Some(v) => *self.coords(*v)?,
                None => origin,
            },
            _ => origin,
        })
    }

    /// 施加变换列表
    ///
    /// 点：以基准元素（或自身的变换前坐标）为输入，结果写入当前坐标。
    /// 文本/图片：当前坐标保持不变，结果写入变换后坐标。
    fn update_transform(&mut self, id: ElementId) -> BoardResult<()> {
        let vp = *self.viewport();
        let c = self.coords_element(id)?;
        if c.transformations.is_empty() {
            let coords = c.coords;
            self.coords_element_mut(id)?.actual_coords = coords;
            return Ok(());
        }

        let m = compose(&c.transformations, self);
        if c.is_text_like() {
            let actual = Coords::from_homogeneous(CoordFrame::User, m * c.coords.usr_coords, &vp);
            self.coords_element_mut(id)?.actual_coords = actual;
            return Ok(());
        }

        let start = match c.base_element {
            Some(base) if base != id => self.coords(base)?.usr_coords,
            _ => c.initial_coords.usr_coords,
        };
        let coords = Coords::from_homogeneous(CoordFrame::User, m * start, &vp);
        let c = self.coords_element_mut(id)?;
        c.coords = coords;
        c.actual_coords = coords;
        Ok(())
    }

    // === 定位 ===

    /// 设置位置并更新整个画板
    pub fn set_position(&mut self, id: ElementId, frame: CoordFrame, xy: [f64; 2]) -> BoardResult<()> {
        self.set_position_directly(id, frame, xy)?;
        self.update(Some(id));
        Ok(())
    }

    /// 设置位置，只更新元素自身
    ///
    /// 依次执行网格吸附、点吸附、磁吸；带变换的自由点反推变换前坐标。
    /// 画板挂起时，滑动点的重算推迟到解除挂起。
    pub fn set_position_directly(&mut self, id: ElementId, frame: CoordFrame, xy: [f64; 2]) -> BoardResult<()> {
        self.set_position_homogeneous(id, frame, Vector3::new(1.0, xy[0], xy[1]))
    }

    pub(crate) fn set_position_homogeneous(
        &mut self,
        id: ElementId,
        frame: CoordFrame,
        target: Homogeneous,
    ) -> BoardResult<()> {
        let vp = *self.viewport();

        if self.shift_anchor(id, frame, target)? {
            return self.update_single(id, true);
        }

        self.coords_element_mut(id)?
            .coords
            .set_homogeneous(frame, target, &vp);

        self.handle_snap_to_grid(id)?;
        self.handle_snap_to_points(id)?;
        self.handle_attractors(id)?;

        let c = self.coords_element(id)?;
        if !c.transformations.is_empty() {
            let self_based = c.base_element.map_or(true, |b| b == id);
            if self_based || c.is_text_like() {
                let m = compose(&c.transformations, self);
                if let Some(inv) = m.try_inverse() {
                    let pulled = Coords::from_homogeneous(CoordFrame::User, inv * c.coords.usr_coords, &vp);
                    let c = self.coords_element_mut(id)?;
                    if c.is_text_like() {
                        c.coords = pulled;
                    } else {
                        c.initial_coords = pulled;
                    }
                }
            }
        }

        if self.is_suspended() && self.coords_element(id)?.is_glider() {
            self.pending_gliders.insert(id);
            return Ok(());
        }
        self.update_single(id, false)
    }

    /// 锚定元素被拖动时只改相对坐标
    fn shift_anchor(&mut self, id: ElementId, frame: CoordFrame, target: Homogeneous) -> BoardResult<bool> {
        let vp = *self.viewport();
        let c = self.coords_element_mut(id)?;
        let old = c.coords;
        let Constraint::Anchored(anchor) = &mut c.mode else {
            return Ok(false);
        };
        let new = Coords::from_homogeneous(frame, target, &vp);
        let (a, b) = if anchor.is_label {
            (new.screen_xy(), old.screen_xy())
        } else {
            (new.user_xy(), old.user_xy())
        };
        anchor.relative[0] += a[0] - b[0];
        anchor.relative[1] += a[1] - b[1];
        Ok(true)
    }

    /// 以平移变换的方式移动点
    pub fn set_position_by_transform(&mut self, id: ElementId, dx: f64, dy: f64) -> BoardResult<()> {
        let c = self.coords_element_mut(id)?;
        let merged = match c.transformations.last_mut() {
            Some(Transform {
                kind: TransformKind::Translate(Term::Constant(x), Term::Constant(y)),
            }) => {
                *x += dx;
                *y += dy;
                true
            }
            _ => false,
        };
        if !merged {
            self.add_transform(id, Transform::translate(dx, dy))?;
        }
        self.update_single(id, true)?;
        self.update(Some(id));
        Ok(())
    }

    /// 给自身追加一个变换（变换输入为自身的变换前坐标）
    pub fn add_transform(&mut self, id: ElementId, transform: Transform) -> BoardResult<()> {
        let deps = transform.deps();
        for d in &deps {
            self.add_child(*d, id)?;
        }
        let c = self.coords_element_mut(id)?;
        if c.base_element.is_none() {
            c.base_element = Some(id);
            c.initial_coords = c.coords;
        }
        c.transformations.push(transform);
        Ok(())
    }

    // === 模式切换 ===

    /// 拆除当前模式的依赖边并回到自由状态
    pub(crate) fn detach_mode(&mut self, id: ElementId) -> BoardResult<()> {
        let c = self.coords_element_mut(id)?;
        let old = std::mem::replace(&mut c.mode, Constraint::Free);
        let sources = match old {
            Constraint::Free => Vec::new(),
            Constraint::Symbolic(rule) => rule.deps(),
            Constraint::Glider(g) => g.slides,
            Constraint::Anchored(a) => vec![a.element],
        };
        for s in sources {
            self.remove_child(s, id);
        }
        Ok(())
    }

    /// 安装符号约束，元素变为不可拖动
    pub fn add_constraint(&mut self, id: ElementId, rule: CoordRule) -> BoardResult<()> {
        let deps = rule.deps();
        let descendants = self.descendants(id);
        for d in &deps {
            self.element(*d)?;
            if *d == id || descendants.contains(d) {
                return Err(BoardError::Cycle { parent: *d, child: id });
            }
        }

        self.detach_mode(id)?;
        let c = self.coords_element_mut(id)?;
        c.mode = Constraint::Symbolic(rule);
        c.is_draggable = false;
        let el = self.element_mut(id)?;
        if el.class() == ElementClass::Point {
            el.elem_type = ElementType::Cas;
        }
        for d in deps {
            self.add_child(d, id)?;
        }
        debug!("{} is now symbolically constrained", id);
        self.full_update(id)
    }

    /// 解除所有约束，成为自由点
    pub fn free(&mut self, id: ElementId) -> BoardResult<()> {
        let c = self.coords_element(id)?;
        if c.is_draggable && matches!(c.mode, Constraint::Free) && c.transformations.is_empty() {
            return Ok(());
        }

        self.detach_mode(id)?;
        let c = self.coords_element_mut(id)?;
        c.transformations.clear();
        c.base_element = None;
        c.is_draggable = true;

        let parents = self.element(id)?.parents.clone();
        for p in parents {
            self.remove_child(p, id);
        }
        let el = self.element_mut(id)?;
        el.elem_type = match el.class() {
            ElementClass::Point => ElementType::Point,
            _ => el.org_type,
        };
        debug!("{} freed", id);
        self.full_update(id)
    }

    /// 把文本/图片锚定到另一个元素上
    pub fn add_anchor(&mut self, id: ElementId, anchor_el: ElementId, is_label: bool) -> BoardResult<()> {
        let base = self.text_anchor(anchor_el)?;
        let descendants = self.descendants(id);
        if anchor_el == id || descendants.contains(&anchor_el) {
            return Err(BoardError::Cycle {
                parent: anchor_el,
                child: id,
            });
        }

        let c = self.coords_element(id)?;
        let relative = if is_label {
            let [x, y] = c.coords.screen_xy();
            [x - base.scr_coords[1], y - base.scr_coords[2]]
        } else {
            let [x, y] = c.coords.user_xy();
            [x - base.usr_coords[1], y - base.usr_coords[2]]
        };

        self.detach_mode(id)?;
        self.coords_element_mut(id)?.mode = Constraint::Anchored(Anchor {
            element: anchor_el,
            relative,
            is_label,
            offset: [0.0, 0.0],
        });
        self.add_child(anchor_el, id)?;
        self.full_update(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::EPSILON;

    #[test]
    fn test_free_point_set_position() {
        let mut board = Board::default();
        let p = board.create_point([1.0, 2.0]).unwrap();
        board.set_position(p, CoordFrame::Screen, [350.0, 150.0]).unwrap();
        let c = board.coords(p).unwrap();
        assert!((c.x() - 2.0).abs() < EPSILON);
        assert!((c.y() - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_constraint_terms() {
        let mut board = Board::default();
        let a = board.create_point([1.0, 1.0]).unwrap();
        let p = board.create_point([0.0, 0.0]).unwrap();
        let rule = CoordRule::try_from(vec![
            Term::function(vec![a], move |b: &Board| b.coords(a).map(|c| c.x() * 2.0).unwrap_or(f64::NAN)),
            Term::Constant(3.0),
        ])
        .unwrap();
        board.add_constraint(p, rule).unwrap();

        let c = board.coords_element(p).unwrap();
        assert!(c.is_constrained());
        assert!(!c.is_draggable);
        assert_eq!(board.element(p).unwrap().elem_type, ElementType::Cas);
        assert_eq!(board.coords(p).unwrap().user_xy(), [2.0, 3.0]);

        board.set_position(a, CoordFrame::User, [4.0, 0.0]).unwrap();
        assert_eq!(board.coords(p).unwrap().user_xy(), [8.0, 3.0]);
    }

    #[test]
    fn test_constraint_arity() {
        let err = CoordRule::try_from(vec![Term::Constant(1.0)]).unwrap_err();
        assert!(matches!(err, ConstructionError::Arity { got: 1, .. }));
    }

    #[test]
    fn test_homogeneous_constraint_normalizes() {
        let mut board = Board::default();
        let p = board
            .create_constrained_point(CoordRule::Homogeneous(2.0.into(), 4.0.into(), 6.0.into()))
            .unwrap();
        assert_eq!(board.coords(p).unwrap().user_xy(), [2.0, 3.0]);
    }

    #[test]
    fn test_constraint_cycle_is_rejected() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let m = board.create_midpoint(a, a).unwrap();
        let rule = CoordRule::coordinates(vec![m], move |b: &Board| b.coords(m).unwrap().usr_coords);
        assert!(matches!(board.add_constraint(a, rule), Err(BoardError::Cycle { .. })));
        assert!(!board.coords_element(a).unwrap().is_constrained());
    }

    #[test]
    fn test_free_drops_ancestors() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 0.0]).unwrap();
        let b = board.create_point([2.0, 2.0]).unwrap();
        let m = board.create_midpoint(a, b).unwrap();
        assert_eq!(board.coords(m).unwrap().user_xy(), [1.0, 1.0]);

        board.free(m).unwrap();
        assert!(board.ancestors(m).is_empty());
        assert!(!board.descendants(a).contains(&m));
        assert!(board.coords_element(m).unwrap().is_draggable);
        assert_eq!(board.element(m).unwrap().elem_type, ElementType::Point);

        // 自由后不再跟随
        board.set_position(a, CoordFrame::User, [4.0, 4.0]).unwrap();
        assert_eq!(board.coords(m).unwrap().user_xy(), [1.0, 1.0]);
    }

    #[test]
    fn test_transformed_point_follows_base() {
        let mut board = Board::default();
        let a = board.create_point([1.0, 0.0]).unwrap();
        let t = board
            .create_transformed_point(a, vec![Transform::translate(1.0, 1.0)])
            .unwrap();
        assert_eq!(board.coords(t).unwrap().user_xy(), [2.0, 1.0]);

        board.set_position(a, CoordFrame::User, [3.0, 3.0]).unwrap();
        assert_eq!(board.coords(t).unwrap().user_xy(), [4.0, 4.0]);
    }

    #[test]
    fn test_self_transform_recovers_initial_coords() {
        let mut board = Board::default();
        let p = board.create_point([1.0, 1.0]).unwrap();
        board.set_position_by_transform(p, 2.0, 0.0).unwrap();
        assert_eq!(board.coords(p).unwrap().user_xy(), [3.0, 1.0]);

        // 拖动后，变换前坐标由逆变换求出
        board.set_position(p, CoordFrame::User, [5.0, 5.0]).unwrap();
        let c = board.coords_element(p).unwrap();
        assert!((c.coords.x() - 5.0).abs() < EPSILON);
        assert!((c.initial_coords.x() - 3.0).abs() < EPSILON);
        assert_eq!(c.transformations().len(), 1);

        // 连续平移合并为一个变换
        board.set_position_by_transform(p, 1.0, 0.0).unwrap();
        let c = board.coords_element(p).unwrap();
        assert_eq!(c.transformations().len(), 1);
        assert!((c.coords.x() - 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_text_actual_coords() {
        let mut board = Board::default();
        let t = board.create_text([1.0, 1.0], "A").unwrap();
        board.add_transform(t, Transform::scale(2.0, 2.0)).unwrap();
        board.update(None);
        let c = board.coords_element(t).unwrap();
        assert_eq!(c.coords.user_xy(), [1.0, 1.0]);
        assert_eq!(c.actual_coords.user_xy(), [2.0, 2.0]);
        assert_eq!(board.element(t).unwrap().class(), ElementClass::Text);
    }

    #[test]
    fn test_anchored_text_moves_with_point() {
        let mut board = Board::default();
        let p = board.create_point([1.0, 1.0]).unwrap();
        let t = board.create_text([2.0, 1.0], "label").unwrap();
        board.add_anchor(t, p, false).unwrap();

        board.set_position(p, CoordFrame::User, [3.0, 0.0]).unwrap();
        assert_eq!(board.coords(t).unwrap().user_xy(), [4.0, 0.0]);

        // 拖动锚定文本只改相对位置
        board.set_position(t, CoordFrame::User, [5.0, 0.0]).unwrap();
        assert_eq!(board.coords(t).unwrap().user_xy(), [5.0, 0.0]);
        board.set_position(p, CoordFrame::User, [0.0, 0.0]).unwrap();
        assert_eq!(board.coords(t).unwrap().user_xy(), [2.0, 0.0]);
    }

    #[test]
    fn test_label_anchor_uses_screen_offset() {
        let mut board = Board::default();
        let p = board.create_point([0.0, 0.0]).unwrap();
        let t = board.create_text([0.0, 0.0], "P").unwrap();
        board.set_position(t, CoordFrame::Screen, [260.0, 240.0]).unwrap();
        board.add_anchor(t, p, true).unwrap();

        board.set_position(p, CoordFrame::User, [1.0, 0.0]).unwrap();
        assert_eq!(board.coords(t).unwrap().screen_xy(), [310.0, 240.0]);
    }
}
