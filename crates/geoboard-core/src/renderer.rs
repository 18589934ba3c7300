//! 渲染接口
//!
//! 引擎本身不绘图。每次更新结束后，画板把发生变化的元素交给 `Renderer`。

use crate::coords::Coords;
use crate::element::{Element, ElementId};
use crate::line::Line;
use std::cell::RefCell;
use std::rc::Rc;

/// 渲染器
pub trait Renderer {
    /// 点、文本、图片
    fn update_point(&mut self, _element: &Element, _coords: &Coords) {}

    /// 直线、线段
    fn update_line(&mut self, _element: &Element, _line: &Line) {}

    /// 其他图形
    fn update_shape(&mut self, _element: &Element) {}

    fn show(&mut self, _element: &Element) {}

    fn hide(&mut self, _element: &Element) {}
}

/// 什么都不画
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {}

/// 渲染事件
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Point(ElementId, [f64; 2]),
    Line(ElementId, [f64; 3]),
    Shape(ElementId),
    Show(ElementId),
    Hide(ElementId),
}

/// 记录渲染调用，主要用于测试和调试
///
/// 事件列表是共享的：把一个克隆交给画板，另一个留在手里查看。
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    events: Rc<RefCell<Vec<RenderEvent>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: RenderEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl Renderer for RecordingRenderer {
    fn update_point(&mut self, element: &Element, coords: &Coords) {
        self.push(RenderEvent::Point(element.id, coords.user_xy()));
    }

    fn update_line(&mut self, element: &Element, line: &Line) {
        let s = line.stdform;
        self.push(RenderEvent::Line(element.id, [s[0], s[1], s[2]]));
    }

    fn update_shape(&mut self, element: &Element) {
        self.push(RenderEvent::Shape(element.id));
    }

    fn show(&mut self, element: &Element) {
        self.push(RenderEvent::Show(element.id));
    }

    fn hide(&mut self, element: &Element) {
        self.push(RenderEvent::Hide(element.id));
    }
}
