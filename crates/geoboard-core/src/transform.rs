//! 射影变换
//!
//! 变换参数在更新时才求值，因此变换可以依赖滑块或其他点。
//! 矩阵作用于 `(w, x, y)` 列向量。

use crate::board::Board;
use crate::element::ElementId;
use crate::math::Matrix;
use crate::term::Term;

/// 变换类型
#[derive(Debug, Clone)]
pub enum TransformKind {
    /// 平移 (dx, dy)
    Translate(Term, Term),
    /// 以原点为中心的缩放 (sx, sy)
    Scale(Term, Term),
    /// 旋转，中心缺省为原点
    Rotate { angle: Term, center: Option<ElementId> },
    /// 关于直线的反射
    Reflect(ElementId),
    /// 一般 3x3 矩阵，按行给出
    Matrix(Box<[Term; 9]>),
}

/// 变换
#[derive(Debug, Clone)]
pub struct Transform {
    pub kind: TransformKind,
}

impl Transform {
    pub fn translate(dx: impl Into<Term>, dy: impl Into<Term>) -> Self {
        Self {
            kind: TransformKind::Translate(dx.into(), dy.into()),
        }
    }

    pub fn scale(sx: impl Into<Term>, sy: impl Into<Term>) -> Self {
        Self {
            kind: TransformKind::Scale(sx.into(), sy.into()),
        }
    }

    pub fn rotate(angle: impl Into<Term>, center: Option<ElementId>) -> Self {
        Self {
            kind: TransformKind::Rotate {
                angle: angle.into(),
                center,
            },
        }
    }

    pub fn reflect(line: ElementId) -> Self {
        Self {
            kind: TransformKind::Reflect(line),
        }
    }

    pub fn matrix(entries: [Term; 9]) -> Self {
        Self {
            kind: TransformKind::Matrix(Box::new(entries)),
        }
    }

    /// 变换依赖的元素
    pub fn deps(&self) -> Vec<ElementId> {
        match &self.kind {
            TransformKind::Translate(a, b) | TransformKind::Scale(a, b) => {
                let mut d = a.deps();
                d.extend(b.deps());
                d
            }
            TransformKind::Rotate { angle, center } => {
                let mut d = angle.deps();
                d.extend(center.iter().copied());
                d
            }
            TransformKind::Reflect(line) => vec![*line],
            TransformKind::Matrix(m) => m.iter().flat_map(Term::deps).collect(),
        }
    }

    /// 按画板当前状态求出变换矩阵
    pub fn eval(&self, board: &Board) -> Matrix {
        match &self.kind {
            TransformKind::Translate(dx, dy) => translation(dx.eval(board), dy.eval(board)),
            TransformKind::Scale(sx, sy) => Matrix::new(
                1.0, 0.0, 0.0,
                0.0, sx.eval(board), 0.0,
                0.0, 0.0, sy.eval(board),
            ),
            TransformKind::Rotate { angle, center } => {
                let a = angle.eval(board);
                let (s, c) = a.sin_cos();
                let r = Matrix::new(
                    1.0, 0.0, 0.0,
                    0.0, c, -s,
                    0.0, s, c,
                );
                match center.and_then(|id| board.coords(id).ok()) {
                    Some(p) => {
                        let [x, y] = p.user_xy();
                        translation(x, y) * r * translation(-x, -y)
                    }
                    None => r,
                }
            }
            TransformKind::Reflect(line) => match board.line(*line) {
                Ok(l) => {
                    let (c, a, b) = (l.stdform[0], l.stdform[1], l.stdform[2]);
                    Matrix::new(
                        1.0, 0.0, 0.0,
                        -2.0 * a * c, 1.0 - 2.0 * a * a, -2.0 * a * b,
                        -2.0 * b * c, -2.0 * a * b, 1.0 - 2.0 * b * b,
                    )
                }
                Err(_) => Matrix::identity(),
            },
            TransformKind::Matrix(m) => {
                let v: Vec<f64> = m.iter().map(|t| t.eval(board)).collect();
                Matrix::from_row_slice(&v)
            }
        }
    }
}

fn translation(dx: f64, dy: f64) -> Matrix {
    Matrix::new(
        1.0, 0.0, 0.0,
        dx, 1.0, 0.0,
        dy, 0.0, 1.0,
    )
}

/// 依次作用一组变换后的总矩阵 `T_n · … · T_1`
pub fn compose(transforms: &[Transform], board: &Board) -> Matrix {
    transforms
        .iter()
        .fold(Matrix::identity(), |acc, t| t.eval(board) * acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::point;
    use std::f64::consts::PI;

    #[test]
    fn test_translate_and_rotate() {
        let board = Board::default();
        let t = Transform::translate(1.0, 2.0).eval(&board);
        let p = t * point(1.0, 1.0);
        assert_eq!((p[1], p[2]), (2.0, 3.0));

        let r = Transform::rotate(PI / 2.0, None).eval(&board);
        let q = r * point(1.0, 0.0);
        assert!(q[1].abs() < 1e-12);
        assert!((q[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reflect_in_line() {
        let mut board = Board::default();
        let a = board.create_point([0.0, 1.0]).unwrap();
        let b = board.create_point([1.0, 2.0]).unwrap();
        let l = board
            .create_line(crate::line::LineParents::points(a, b))
            .unwrap();
        // y = x + 1
        let m = Transform::reflect(l).eval(&board);
        let p = m * point(1.0, 0.0);
        assert!((p[1] + 1.0).abs() < 1e-9);
        assert!((p[2] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_compose_order() {
        let board = Board::default();
        let ts = vec![Transform::scale(2.0, 2.0), Transform::translate(1.0, 0.0)];
        // 先缩放再平移
        let p = compose(&ts, &board) * point(1.0, 1.0);
        assert_eq!((p[1], p[2]), (3.0, 2.0));
    }
}
