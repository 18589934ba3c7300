//! 画板：元素仓库与更新调度
//!
//! 画板以 `ElementId` 为键保存所有元素，维护父子邻接表，
//! 并按拓扑序执行单遍更新。更新期间的可重入调用会被忽略，
//! 挂起期间的更新会推迟到解除挂起时统一执行。

use crate::animation::{Animation, AnimationId};
use crate::config::{BoardConfig, InputDevice};
use crate::coords::{Coords, Viewport};
use crate::element::{Element, ElementId, ElementType, Shape};
use crate::error::{BoardError, BoardResult};
use crate::line::Line;
use crate::math::EPSILON;
use crate::point::CoordsElement;
use crate::renderer::{NullRenderer, Renderer};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, trace, warn};

/// 一次更新中最多重复遍历的次数
///
/// 定长线段在更新中会移动另一个端点，拓扑序靠前的依赖者需要再走一遍。
const MAX_UPDATE_SWEEPS: usize = 3;

/// 画板
pub struct Board {
    pub(crate) config: BoardConfig,
    pub(crate) elements: BTreeMap<ElementId, Element>,
    names: HashMap<String, ElementId>,
    next_id: u64,
    order_cache: Option<Vec<ElementId>>,
    in_update: bool,
    suspended: bool,
    /// 挂起期间被改写坐标的滑动点
    pub(crate) pending_gliders: BTreeSet<ElementId>,
    renderer: Box<dyn Renderer>,
    pub(crate) animations: BTreeMap<AnimationId, Animation>,
    pub(crate) next_animation_id: u64,
    /// 为网格吸附提供步长的刻度
    pub(crate) grid_ticks: Option<ElementId>,
    device: InputDevice,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BoardConfig::default())
    }
}

impl Board {
    /// 创建画板
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            elements: BTreeMap::new(),
            names: HashMap::new(),
            next_id: 1,
            order_cache: None,
            in_update: false,
            suspended: false,
            pending_gliders: BTreeSet::new(),
            renderer: Box::new(NullRenderer),
            animations: BTreeMap::new(),
            next_animation_id: 1,
            grid_ticks: None,
            device: InputDevice::default(),
        }
    }

    /// 替换渲染器
    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.config.viewport
    }

    /// 修改视口（缩放/平移），所有带位置元素的屏幕坐标随之重算
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.config.viewport = viewport;
        for el in self.elements.values_mut() {
            if let Shape::Coords(c) = &mut el.shape {
                c.coords.refresh_screen(&viewport);
                c.initial_coords.refresh_screen(&viewport);
                c.actual_coords.refresh_screen(&viewport);
            }
        }
        self.update(None);
    }

    pub fn input_device(&self) -> InputDevice {
        self.device
    }

    pub fn set_input_device(&mut self, device: InputDevice) {
        self.device = device;
    }

    /// 当前输入设备的命中容差（像素）
    pub fn precision(&self) -> f64 {
        self.config.precision.for_device(self.device)
    }

    // === 元素管理 ===

    /// 插入新元素并登记父子关系
    pub(crate) fn add_element(
        &mut self,
        elem_type: ElementType,
        shape: Shape,
        parents: &[ElementId],
    ) -> BoardResult<ElementId> {
        for p in parents {
            self.element(*p)?;
        }

        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(id, Element::new(id, elem_type, shape));
        self.order_cache = None;

        for p in parents {
            self.add_child(*p, id)?;
        }
        trace!("created {} {}", elem_type.name(), id);
        Ok(id)
    }

    pub fn element(&self, id: ElementId) -> BoardResult<&Element> {
        self.elements.get(&id).ok_or(BoardError::ElementNotFound(id))
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> BoardResult<&mut Element> {
        self.elements
            .get_mut(&id)
            .ok_or(BoardError::ElementNotFound(id))
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.elements.keys().copied()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// 按名称查找
    pub fn by_name(&self, name: &str) -> Option<ElementId> {
        self.names.get(name).copied()
    }

    /// 设置唯一名称
    pub fn set_name(&mut self, id: ElementId, name: impl Into<String>) -> BoardResult<()> {
        let name = name.into();
        if let Some(other) = self.names.get(&name) {
            if *other != id {
                return Err(BoardError::DuplicateName(name));
            }
        }
        let el = self.element_mut(id)?;
        let old = std::mem::replace(&mut el.name, name.clone());
        self.names.remove(&old);
        self.names.insert(name, id);
        Ok(())
    }

    pub fn coords_element(&self, id: ElementId) -> BoardResult<&CoordsElement> {
        let el = self.element(id)?;
        el.as_coords().ok_or(BoardError::WrongKind {
            id,
            expected: "point",
            found: el.elem_type.name(),
        })
    }

    pub(crate) fn coords_element_mut(&mut self, id: ElementId) -> BoardResult<&mut CoordsElement> {
        let el = self.element_mut(id)?;
        let found = el.elem_type.name();
        match &mut el.shape {
            Shape::Coords(c) => Ok(c),
            _ => Err(BoardError::WrongKind {
                id,
                expected: "point",
                found,
            }),
        }
    }

    /// 带位置元素的当前坐标
    pub fn coords(&self, id: ElementId) -> BoardResult<&Coords> {
        self.coords_element(id).map(|c| &c.coords)
    }

    pub fn line(&self, id: ElementId) -> BoardResult<&Line> {
        let el = self.element(id)?;
        el.as_line().ok_or(BoardError::WrongKind {
            id,
            expected: "line",
            found: el.elem_type.name(),
        })
    }

    pub(crate) fn line_mut(&mut self, id: ElementId) -> BoardResult<&mut Line> {
        let el = self.element_mut(id)?;
        let found = el.elem_type.name();
        match &mut el.shape {
            Shape::Line(l) => Ok(l),
            _ => Err(BoardError::WrongKind {
                id,
                expected: "line",
                found,
            }),
        }
    }

    /// 删除元素及其后代
    ///
    /// 以被删除元素为滑动对象的滑动点不随之删除，只是失去这个滑动对象。
    pub fn remove(&mut self, id: ElementId) -> BoardResult<Vec<ElementId>> {
        self.element(id)?;
        let mut doomed = vec![id];
        let mut queue = VecDeque::from([id]);
        while let Some(cur) = queue.pop_front() {
            let children = self.element(cur)?.children.clone();
            for child in children {
                let glides_on_cur = self
                    .coords_element(child)
                    .ok()
                    .and_then(|c| c.glider())
                    .is_some_and(|g| g.slides.contains(&cur));
                if glides_on_cur {
                    self.drop_slide_object(child, cur)?;
                } else if !doomed.contains(&child) {
                    doomed.push(child);
                    queue.push_back(child);
                }
            }
        }

        for victim in &doomed {
            let Some(el) = self.elements.remove(victim) else {
                continue;
            };
            self.names.remove(&el.name);
            for p in &el.parents {
                if let Some(parent) = self.elements.get_mut(p) {
                    parent.children.retain(|c| c != victim);
                }
            }
            for c in &el.children {
                if let Some(child) = self.elements.get_mut(c) {
                    child.parents.retain(|p| p != victim);
                }
            }
            self.pending_gliders.remove(victim);
            self.renderer.hide(&el);
        }
        self.animations.retain(|_, a| !doomed.contains(&a.element));
        self.order_cache = None;
        debug!("removed {} element(s) starting at {}", doomed.len(), id);
        Ok(doomed)
    }

    // === 依赖图 ===

    /// 添加依赖边 `parent -> child`
    pub fn add_child(&mut self, parent: ElementId, child: ElementId) -> BoardResult<()> {
        self.element(child)?;
        if parent == child || self.descendants(child).contains(&parent) {
            return Err(BoardError::Cycle { parent, child });
        }

        let p = self.element_mut(parent)?;
        if !p.children.contains(&child) {
            p.children.push(child);
        }
        let c = self.element_mut(child)?;
        if !c.parents.contains(&parent) {
            c.parents.push(parent);
        }
        self.order_cache = None;
        Ok(())
    }

    /// 删除依赖边 `parent -> child`
    pub fn remove_child(&mut self, parent: ElementId, child: ElementId) {
        if let Some(p) = self.elements.get_mut(&parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.elements.get_mut(&child) {
            c.parents.retain(|p| *p != parent);
        }
        self.order_cache = None;
    }

    /// 所有后代（传递闭包）
    pub fn descendants(&self, id: ElementId) -> BTreeSet<ElementId> {
        self.closure(id, |el| &el.children)
    }

    /// 所有祖先（传递闭包）
    pub fn ancestors(&self, id: ElementId) -> BTreeSet<ElementId> {
        self.closure(id, |el| &el.parents)
    }

    fn closure<F>(&self, id: ElementId, next: F) -> BTreeSet<ElementId>
    where
        F: Fn(&Element) -> &Vec<ElementId>,
    {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(cur) = queue.pop_front() {
            if let Some(el) = self.elements.get(&cur) {
                for n in next(el) {
                    if seen.insert(*n) {
                        queue.push_back(*n);
                    }
                }
            }
        }
        seen.remove(&id);
        seen
    }

    /// 拓扑序（Kahn 算法，同层按 id 排序）
    pub fn update_order(&mut self) -> Vec<ElementId> {
        if let Some(order) = &self.order_cache {
            return order.clone();
        }

        let mut in_degree: BTreeMap<ElementId, usize> = self
            .elements
            .iter()
            .map(|(id, el)| (*id, el.parents.len()))
            .collect();
        let mut ready: BTreeSet<ElementId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.elements.len());

        while let Some(id) = ready.pop_first() {
            order.push(id);
            if let Some(el) = self.elements.get(&id) {
                for child in &el.children {
                    if let Some(d) = in_degree.get_mut(child) {
                        *d -= 1;
                        if *d == 0 {
                            ready.insert(*child);
                        }
                    }
                }
            }
        }

        self.order_cache = Some(order.clone());
        order
    }

    // === 更新 ===

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn in_update(&self) -> bool {
        self.in_update
    }

    /// 标记所有元素待更新
    pub fn prepare_update(&mut self) {
        for el in self.elements.values_mut() {
            el.needs_update = true;
        }
    }

    /// 按拓扑序更新整个画板
    ///
    /// `drag` 是被直接移动的元素：它的滑动点逻辑走完整重算，其余元素走“从父元素更新”。
    /// 挂起或已在更新中时直接返回。
    pub fn update(&mut self, drag: Option<ElementId>) {
        if self.in_update || self.suspended {
            return;
        }
        self.in_update = true;
        self.prepare_update();

        let order = self.update_order();
        for sweep in 0..MAX_UPDATE_SWEEPS {
            for &id in &order {
                let from_parent = drag != Some(id);
                if let Err(e) = self.update_element(id, from_parent) {
                    warn!("update of {} failed: {}", id, e);
                }
            }
            if !self.elements.values().any(|el| el.needs_update) {
                break;
            }
            trace!("update sweep {} left dirty elements", sweep + 1);
        }

        for el in self.elements.values_mut() {
            el.needs_update = false;
            if let Shape::Coords(c) = &mut el.shape {
                c.end_update_pass();
            }
        }

        self.update_renderer();
        self.in_update = false;
    }

    /// 单个元素的更新，按几何类别分派
    pub(crate) fn update_element(&mut self, id: ElementId, from_parent: bool) -> BoardResult<()> {
        let el = self.element(id)?;
        if !el.needs_update {
            return Ok(());
        }

        match &el.shape {
            Shape::Coords(_) => self.update_coords(id, from_parent)?,
            Shape::Line(_) => self.update_line(id)?,
            Shape::Circle(_) => self.update_circle(id)?,
            Shape::Arc(_) => self.update_arc(id)?,
            Shape::Curve(_) => self.update_curve(id)?,
            Shape::Conic(_) | Shape::Turtle(_) | Shape::Polygon(_) | Shape::Ticks(_) => {}
        }

        let real = self.compute_real(id)?;
        let el = self.element_mut(id)?;
        el.is_real = real;
        el.needs_update = false;
        el.needs_render = true;
        Ok(())
    }

    /// 只更新一个元素（不触发整体遍历）
    pub(crate) fn update_single(&mut self, id: ElementId, from_parent: bool) -> BoardResult<()> {
        self.element_mut(id)?.needs_update = true;
        self.update_element(id, from_parent)
    }

    /// 更新一个元素并立即重绘它
    pub(crate) fn full_update(&mut self, id: ElementId) -> BoardResult<()> {
        self.update_single(id, true)?;
        if !self.suspended {
            self.render_element(id);
        }
        Ok(())
    }

    fn compute_real(&self, id: ElementId) -> BoardResult<bool> {
        let el = self.element(id)?;
        Ok(match &el.shape {
            Shape::Coords(c) => c.coords.is_real(),
            Shape::Line(l) => l.is_real(),
            Shape::Circle(c) => c.radius.is_finite() && c.radius >= 0.0,
            Shape::Arc(a) => a.radius.is_finite(),
            _ => true,
        })
    }

    /// 渲染所有已变化的元素
    pub fn update_renderer(&mut self) {
        if self.suspended {
            return;
        }
        let ids: Vec<ElementId> = self
            .elements
            .values()
            .filter(|el| el.needs_render)
            .map(|el| el.id)
            .collect();
        for id in ids {
            self.render_element(id);
        }
    }

    fn render_element(&mut self, id: ElementId) {
        let Board {
            elements, renderer, ..
        } = self;
        let Some(el) = elements.get_mut(&id) else {
            return;
        };

        let visible = el.visible && el.is_real;
        if !visible {
            if el.shown {
                renderer.hide(el);
                el.shown = false;
            }
            el.needs_render = false;
            return;
        }
        if !el.shown {
            renderer.show(el);
            el.shown = true;
        }

        match &el.shape {
            Shape::Coords(c) => renderer.update_point(el, &c.actual_coords),
            Shape::Line(l) => renderer.update_line(el, l),
            _ => renderer.update_shape(el),
        }
        el.needs_render = false;
    }

    // === 批量更新 ===

    /// 挂起更新。正在更新中时无效
    pub fn suspend_update(&mut self) {
        if !self.in_update {
            self.suspended = true;
            debug!("board update suspended");
        }
    }

    /// 解除挂起：每个挂起期间被移动过的滑动点做一次完整重算，然后整体更新
    pub fn unsuspend_update(&mut self) {
        if !self.suspended {
            return;
        }
        self.suspended = false;

        let pending = std::mem::take(&mut self.pending_gliders);
        debug!("board update resumed, {} glider(s) pending", pending.len());
        for id in pending {
            let result = self
                .element_mut(id)
                .map(|el| el.needs_update = true)
                .and_then(|_| self.update_glider(id));
            if let Err(e) = result {
                warn!("deferred glider update of {} failed: {}", id, e);
            }
        }
        self.update(None);
    }

    /// 滑块的值：`smin + position * (smax - smin)`
    pub fn value(&self, id: ElementId) -> BoardResult<f64> {
        let c = self.coords_element(id)?;
        let glider = c.glider().ok_or(crate::error::GliderError::NotAGlider(id))?;
        let (smin, smax) = c.attrs.slider_range.unwrap_or((0.0, 1.0));
        Ok(smin + glider.position * (smax - smin))
    }

    /// 两点是否重合（用户坐标距离小于 ε）
    pub fn coincide(&self, a: ElementId, b: ElementId) -> BoardResult<bool> {
        let ca = self.coords(a)?;
        let cb = self.coords(b)?;
        Ok(ca.distance(crate::coords::CoordFrame::User, cb) < EPSILON)
    }
}
