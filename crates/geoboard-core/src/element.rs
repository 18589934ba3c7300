//! 图节点
//!
//! 画板上的每个可构造对象都是一个 `Element`：唯一标识、类型标签、
//! 父子邻接表、脏标记，以及按类别区分的几何数据 `Shape`。
//! 祖先/后代集合不单独存储，而是沿邻接表求传递闭包。

use crate::curve::{Curve, Turtle};
use crate::geometry::{Arc, Circle, Conic, Polygon, Ticks};
use crate::line::Line;
use crate::point::CoordsElement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 元素ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl ElementId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 元素类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementClass {
    Point,
    Line,
    Circle,
    Curve,
    Area,
    Text,
    Other,
}

/// 元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Point,
    Glider,
    /// 坐标由函数/表达式决定的点
    Cas,
    Midpoint,
    Line,
    Segment,
    Tangent,
    Normal,
    Polar,
    Parallel,
    Circle,
    Arc,
    Sector,
    Conic,
    Curve,
    Turtle,
    Polygon,
    Ticks,
    Text,
    Image,
}

impl ElementType {
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Point => "point",
            ElementType::Glider => "glider",
            ElementType::Cas => "cas",
            ElementType::Midpoint => "midpoint",
            ElementType::Line => "line",
            ElementType::Segment => "segment",
            ElementType::Tangent => "tangent",
            ElementType::Normal => "normal",
            ElementType::Polar => "polar",
            ElementType::Parallel => "parallel",
            ElementType::Circle => "circle",
            ElementType::Arc => "arc",
            ElementType::Sector => "sector",
            ElementType::Conic => "conic",
            ElementType::Curve => "curve",
            ElementType::Turtle => "turtle",
            ElementType::Polygon => "polygon",
            ElementType::Ticks => "ticks",
            ElementType::Text => "text",
            ElementType::Image => "image",
        }
    }
}

/// 按类别区分的几何数据
pub enum Shape {
    /// 点、文本、图片等带位置的元素
    Coords(CoordsElement),
    Line(Line),
    Circle(Circle),
    Arc(Arc),
    Conic(Conic),
    Curve(Curve),
    Turtle(Turtle),
    Polygon(Polygon),
    Ticks(Ticks),
}

impl Shape {
    pub fn class(&self) -> ElementClass {
        match self {
            Shape::Coords(c) if c.is_text_like() => ElementClass::Text,
            Shape::Coords(_) => ElementClass::Point,
            Shape::Line(_) => ElementClass::Line,
            Shape::Circle(_) | Shape::Conic(_) => ElementClass::Circle,
            Shape::Arc(_) | Shape::Curve(_) => ElementClass::Curve,
            Shape::Polygon(_) => ElementClass::Area,
            Shape::Turtle(_) | Shape::Ticks(_) => ElementClass::Other,
        }
    }
}

/// 图节点
pub struct Element {
    pub id: ElementId,
    pub name: String,
    pub elem_type: ElementType,
    /// 创建时的类型，滑动点解除绑定后恢复
    pub(crate) org_type: ElementType,
    pub visible: bool,
    /// 当前是否有实数解
    pub is_real: bool,
    pub(crate) needs_update: bool,
    pub(crate) needs_render: bool,
    /// 渲染器当前是否显示该元素
    pub(crate) shown: bool,
    pub(crate) parents: Vec<ElementId>,
    pub(crate) children: Vec<ElementId>,
    pub shape: Shape,
}

impl Element {
    pub fn new(id: ElementId, elem_type: ElementType, shape: Shape) -> Self {
        Self {
            id,
            name: String::new(),
            elem_type,
            org_type: elem_type,
            visible: true,
            is_real: true,
            needs_update: true,
            needs_render: true,
            shown: false,
            parents: Vec::new(),
            children: Vec::new(),
            shape,
        }
    }

    pub fn class(&self) -> ElementClass {
        self.shape.class()
    }

    /// 直接父元素
    pub fn parents(&self) -> &[ElementId] {
        &self.parents
    }

    /// 直接子元素
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn is_point(&self) -> bool {
        self.class() == ElementClass::Point
    }

    pub fn as_coords(&self) -> Option<&CoordsElement> {
        match &self.shape {
            Shape::Coords(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&Line> {
        match &self.shape {
            Shape::Line(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_circle(&self) -> Option<&Circle> {
        match &self.shape {
            Shape::Circle(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_curve(&self) -> Option<&Curve> {
        match &self.shape {
            Shape::Curve(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.elem_type)
            .field("parents", &self.parents)
            .field("children", &self.children)
            .finish()
    }
}
