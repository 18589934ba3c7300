//! Geoboard 核心引擎
//!
//! 交互式几何画板的约束与投影内核：点、直线、圆、曲线等元素组成依赖图，
//! 任何一个元素被移动后，画板按拓扑序重算所有后代。
//!
//! # 架构设计
//!
//! - `Board`: 元素仓库、依赖图与更新调度
//! - `Element`: 图节点，几何数据按类别放在 `Shape` 里
//! - 坐标元素（点、文本、图片）在自由、符号约束、滑动、锚定四种模式之间切换
//! - 滑动点用一个参数描述它在宿主图形上的位置，宿主变化时由参数反算坐标
//!
//! # 示例
//!
//! ```rust
//! use geoboard_core::prelude::*;
//!
//! let mut board = Board::default();
//! let a = board.create_point([0.0, 0.0]).unwrap();
//! let b = board.create_point([4.0, 0.0]).unwrap();
//! let seg = board.create_segment(a, b).unwrap();
//! let m = board.create_midpoint(a, b).unwrap();
//! let g = board.create_glider([1.0, 1.0], seg).unwrap();
//!
//! board.set_position(b, CoordFrame::User, [8.0, 0.0]).unwrap();
//! assert_eq!(board.coords(m).unwrap().user_xy(), [4.0, 0.0]);
//! assert!(board.coords(g).unwrap().y().abs() < 1e-9);
//! ```

pub mod animation;
pub mod board;
pub mod config;
pub mod coords;
pub mod curve;
pub mod element;
pub mod error;
pub mod geometry;
pub mod glider;
pub mod line;
pub mod math;
pub mod numerics;
pub mod point;
pub mod projection;
pub mod renderer;
pub mod snap;
pub mod tangent;
pub mod term;
pub mod transform;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::animation::{AnimationHandle, AnimationId, AnimationState, Effect, MoveOptions};
    pub use crate::board::Board;
    pub use crate::config::{BoardConfig, InputDevice, Precision};
    pub use crate::coords::{CoordFrame, Coords, Viewport};
    pub use crate::curve::{Curve, CurveData, Turtle, TurtleBuilder};
    pub use crate::element::{Element, ElementClass, ElementId, ElementType, Shape};
    pub use crate::error::{BoardError, BoardResult, ConstructionError, GliderError};
    pub use crate::geometry::{ArcSelection, Circle, Polygon};
    pub use crate::line::{Line, LineEnd, LineParents};
    pub use crate::math::{Homogeneous, Matrix, EPSILON};
    pub use crate::point::{AttractorUnit, Constraint, CoordRule, CoordsKind, GliderState, PointAttributes};
    pub use crate::renderer::{NullRenderer, RecordingRenderer, RenderEvent, Renderer};
    pub use crate::term::Term;
    pub use crate::transform::Transform;
}
