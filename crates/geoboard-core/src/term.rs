//! 数值来源
//!
//! 约束、定长线段、圆半径、变换参数都从 `Term` 取值：
//! 常量、依赖画板的函数、或者另一个滑块的当前值。

use crate::board::Board;
use crate::element::ElementId;
use std::fmt;
use std::rc::Rc;

/// 读取画板的标量函数
pub type ScalarFn = Rc<dyn Fn(&Board) -> f64>;

/// 数值来源
#[derive(Clone)]
pub enum Term {
    /// 常量
    Constant(f64),
    /// 函数，`deps` 列出函数读取的元素，用于建立依赖边
    Function { deps: Vec<ElementId>, f: ScalarFn },
    /// 滑块的值
    Value(ElementId),
}

impl Term {
    /// 由闭包构造函数项
    pub fn function<F>(deps: impl Into<Vec<ElementId>>, f: F) -> Self
    where
        F: Fn(&Board) -> f64 + 'static,
    {
        Term::Function {
            deps: deps.into(),
            f: Rc::new(f),
        }
    }

    /// 求值
    pub fn eval(&self, board: &Board) -> f64 {
        match self {
            Term::Constant(v) => *v,
            Term::Function { f, .. } => f(board),
            Term::Value(id) => board.value(*id).unwrap_or(f64::NAN),
        }
    }

    /// 依赖的元素
    pub fn deps(&self) -> Vec<ElementId> {
        match self {
            Term::Constant(_) => Vec::new(),
            Term::Function { deps, .. } => deps.clone(),
            Term::Value(id) => vec![*id],
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Constant(_))
    }
}

impl From<f64> for Term {
    fn from(v: f64) -> Self {
        Term::Constant(v)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Constant(v) => write!(f, "Constant({v})"),
            Term::Function { deps, .. } => write!(f, "Function(deps: {deps:?})"),
            Term::Value(id) => write!(f, "Value({id})"),
        }
    }
}
