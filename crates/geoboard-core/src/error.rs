//! 错误类型定义

use crate::element::ElementId;
use thiserror::Error;

/// 构造错误：父元素类型或数量不符合要求
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    #[error("can't create {what} with parent types [{found}]; possible parent types: {expected}")]
    WrongParents {
        what: &'static str,
        found: String,
        expected: &'static str,
    },

    #[error("{what} needs {expected} parents, got {got}")]
    Arity {
        what: &'static str,
        expected: &'static str,
        got: usize,
    },
}

/// 滑动点错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GliderError {
    #[error("element {id} ({kind}) can't be used as slide object")]
    NotGlidable { id: ElementId, kind: &'static str },

    #[error("element {0} is not a glider")]
    NotAGlider(ElementId),
}

/// 画板错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),

    #[error("element {id} is a {found}, expected {expected}")]
    WrongKind {
        id: ElementId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("name already in use: {0}")]
    DuplicateName(String),

    #[error("making {child} a child of {parent} would create a cycle")]
    Cycle { parent: ElementId, child: ElementId },

    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Glider(#[from] GliderError),
}

/// 画板操作结果
pub type BoardResult<T> = Result<T, BoardError>;
