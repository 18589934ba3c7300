//! 动画
//!
//! 动画是挂在画板上的步进任务，由宿主按固定间隔驱动：
//! - 路径动画（moveTo / visit / moveAlong）：预先算好坐标序列，每步直接定位一个采样点
//! - 滑动动画（startAnimation）：每步按直线距离、圆心角或屏幕 x 重新计算滑动点位置
//!
//! 步进本身是同步的。每个动画返回一个 [`AnimationHandle`]，
//! 可以查询状态、取消，或者 `await` 它的结束。

use crate::board::Board;
use crate::coords::CoordFrame;
use crate::element::{ElementId, Shape};
use crate::error::{BoardResult, ConstructionError, GliderError};
use crate::math::EPSILON;
use crate::numerics::NevillePath;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// 动画ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnimationId(pub u64);

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "animation#{}", self.0)
    }
}

/// 动画状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    Running,
    Finished,
    Cancelled,
}

/// 速度曲线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    #[serde(rename = "==")]
    Linear,
    /// 两头慢、中间快
    #[serde(rename = "<>")]
    EaseInOut,
    #[serde(rename = "<")]
    EaseIn,
    #[serde(rename = ">")]
    EaseOut,
}

impl Effect {
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "==" | "" => Some(Effect::Linear),
            "<>" => Some(Effect::EaseInOut),
            "<" => Some(Effect::EaseIn),
            ">" => Some(Effect::EaseOut),
            _ => None,
        }
    }

    /// 把进度 `t ∈ [0, 1]` 映射成位移比例
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Effect::Linear => t,
            Effect::EaseInOut => (t * PI / 2.0).sin().powi(2),
            Effect::EaseIn => 1.0 - (t * PI / 2.0).cos(),
            Effect::EaseOut => (t * PI / 2.0).sin(),
        }
    }
}

/// 动画结束回调，取消时不调用
pub type AnimationCallback = Box<dyn FnOnce()>;

/// 路径动画选项
pub struct MoveOptions {
    pub effect: Effect,
    /// visit 的往返次数
    pub repeat: u32,
    /// moveAlong 是否在控制点之间做 Neville 插值
    pub interpolate: bool,
    pub callback: Option<AnimationCallback>,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            effect: Effect::Linear,
            repeat: 1,
            interpolate: true,
            callback: None,
        }
    }
}

impl MoveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat.max(1);
        self
    }

    pub fn interpolate(mut self, interpolate: bool) -> Self {
        self.interpolate = interpolate;
        self
    }

    pub fn on_finished<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.callback = Some(Box::new(f));
        self
    }
}

#[derive(Debug, Clone)]
struct GlideState {
    direction: i32,
    steps: u32,
    count: u32,
    rounds: u32,
    max_rounds: Option<u32>,
}

#[derive(Debug, Clone)]
enum AnimationKind {
    /// 待定位的用户坐标
    Path(VecDeque<[f64; 2]>),
    Glide(GlideState),
}

/// 画板上的一个动画
pub struct Animation {
    pub element: ElementId,
    kind: AnimationKind,
    delay: Duration,
    /// 自上一步以来累计的时间
    elapsed: Duration,
    callback: Option<AnimationCallback>,
    cancel: Rc<Cell<bool>>,
    tx: watch::Sender<AnimationState>,
}

impl Animation {
    fn finish(mut self, state: AnimationState) {
        self.tx.send_replace(state);
        if state == AnimationState::Finished {
            if let Some(cb) = self.callback.take() {
                cb();
            }
        }
    }
}

impl Drop for Animation {
    fn drop(&mut self) {
        // 元素被删除等情况下动画被直接丢弃
        self.tx.send_if_modified(|s| {
            if *s == AnimationState::Running {
                *s = AnimationState::Cancelled;
                true
            } else {
                false
            }
        });
    }
}

impl fmt::Debug for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("element", &self.element)
            .field("kind", &self.kind)
            .field("delay", &self.delay)
            .finish()
    }
}

/// 动画句柄
#[derive(Debug)]
pub struct AnimationHandle {
    id: AnimationId,
    cancel: Rc<Cell<bool>>,
    rx: watch::Receiver<AnimationState>,
}

impl AnimationHandle {
    pub fn id(&self) -> AnimationId {
        self.id
    }

    pub fn state(&self) -> AnimationState {
        *self.rx.borrow()
    }

    /// 请求取消，下一步时生效。重复取消无副作用
    pub fn cancel(&self) {
        self.cancel.set(true);
    }

    /// 等待动画结束，返回结束状态
    pub async fn finished(mut self) -> AnimationState {
        loop {
            let state = *self.rx.borrow_and_update();
            if state != AnimationState::Running {
                return state;
            }
            if self.rx.changed().await.is_err() {
                return *self.rx.borrow();
            }
        }
    }
}

impl Board {
    fn alloc_animation_id(&mut self) -> AnimationId {
        let id = AnimationId(self.next_animation_id);
        self.next_animation_id += 1;
        id
    }

    fn register_animation(
        &mut self,
        element: ElementId,
        kind: AnimationKind,
        delay: Duration,
        callback: Option<AnimationCallback>,
    ) -> AnimationHandle {
        // 同一元素同时只有一条路径
        if matches!(kind, AnimationKind::Path(_)) {
            let replaced: Vec<AnimationId> = self
                .animations
                .iter()
                .filter(|(_, a)| a.element == element && matches!(a.kind, AnimationKind::Path(_)))
                .map(|(id, _)| *id)
                .collect();
            for id in replaced {
                self.stop_animation(id);
            }
        }

        let id = self.alloc_animation_id();
        let (tx, rx) = watch::channel(AnimationState::Running);
        let cancel = Rc::new(Cell::new(false));
        debug!("{} started on {}", id, element);
        self.animations.insert(
            id,
            Animation {
                element,
                kind,
                delay,
                elapsed: Duration::ZERO,
                callback,
                cancel: cancel.clone(),
                tx,
            },
        );
        AnimationHandle { id, cancel, rx }
    }

    /// 没有需要步进的内容时直接返回已结束的句柄
    fn finished_handle(&mut self, callback: Option<AnimationCallback>) -> AnimationHandle {
        let id = self.alloc_animation_id();
        let (_tx, rx) = watch::channel(AnimationState::Finished);
        if let Some(cb) = callback {
            cb();
        }
        AnimationHandle {
            id,
            cancel: Rc::new(Cell::new(false)),
            rx,
        }
    }

    fn path_delay(&self) -> Duration {
        Duration::from_millis(self.config.animation_delay_ms.max(1))
    }

    // === 驱动 ===

    /// 所有动画各走一步，返回仍在运行的动画数
    pub fn animate(&mut self) -> usize {
        let ids: Vec<AnimationId> = self.animations.keys().copied().collect();
        for id in ids {
            self.step_animation(id);
        }
        self.animations.len()
    }

    /// 时间推进 `dt`：每个动画按自己的间隔走若干步，返回仍在运行的动画数
    pub fn tick(&mut self, dt: Duration) -> usize {
        let ids: Vec<AnimationId> = self.animations.keys().copied().collect();
        for id in ids {
            let Some(anim) = self.animations.get_mut(&id) else {
                continue;
            };
            anim.elapsed += dt;
            loop {
                let Some(anim) = self.animations.get_mut(&id) else {
                    break;
                };
                if anim.elapsed < anim.delay {
                    break;
                }
                anim.elapsed -= anim.delay;
                if !self.step_animation(id) {
                    break;
                }
            }
        }
        self.animations.len()
    }

    /// 单步，返回动画是否仍在运行
    fn step_animation(&mut self, id: AnimationId) -> bool {
        let Some(mut anim) = self.animations.remove(&id) else {
            return false;
        };
        if anim.cancel.get() {
            debug!("{} cancelled", id);
            anim.finish(AnimationState::Cancelled);
            self.update(None);
            return false;
        }

        let element = anim.element;
        let result = match &mut anim.kind {
            AnimationKind::Path(path) => match path.pop_front() {
                Some(xy) => self
                    .set_position_directly(element, CoordFrame::User, xy)
                    .map(|_| !path.is_empty()),
                None => Ok(false),
            },
            AnimationKind::Glide(glide) => self.glide_step(element, glide),
        };
        if matches!(result, Ok(true) | Ok(false)) {
            self.update(Some(element));
        }

        match result {
            Ok(true) => {
                self.animations.insert(id, anim);
                true
            }
            Ok(false) => {
                debug!("{} finished", id);
                anim.finish(AnimationState::Finished);
                false
            }
            Err(e) => {
                warn!("{} aborted: {}", id, e);
                anim.finish(AnimationState::Cancelled);
                false
            }
        }
    }

    /// 停止动画，元素停在当前位置。已经停止的动画返回 false
    pub fn stop_animation(&mut self, id: AnimationId) -> bool {
        let Some(anim) = self.animations.remove(&id) else {
            return false;
        };
        debug!("{} stopped", id);
        anim.finish(AnimationState::Cancelled);
        self.update(None);
        true
    }

    /// 停止某个元素上的全部动画
    pub fn stop_animations_of(&mut self, element: ElementId) {
        let ids: Vec<AnimationId> = self
            .animations
            .iter()
            .filter(|(_, a)| a.element == element)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.stop_animation(id);
        }
    }

    pub fn stop_all_animations(&mut self) {
        let ids: Vec<AnimationId> = self.animations.keys().copied().collect();
        for id in ids {
            self.stop_animation(id);
        }
    }

    pub fn is_animating(&self, id: AnimationId) -> bool {
        self.animations.contains_key(&id)
    }

    /// 按动画间隔驱动直到没有动画
    ///
    /// 存在不限轮数的滑动动画时不会返回。
    pub async fn run_animations(&mut self) {
        let Some(period) = self.animations.values().map(|a| a.delay).min() else {
            return;
        };
        let period = period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        while !self.animations.is_empty() {
            interval.tick().await;
            self.tick(period);
        }
    }

    // === 路径动画 ===

    /// 在 `time` 内移动到 `target`
    pub fn move_to(
        &mut self,
        id: ElementId,
        target: [f64; 2],
        time: Duration,
        options: MoveOptions,
    ) -> BoardResult<AnimationHandle> {
        let [x, y] = self.coords(id)?.user_xy();
        if time.is_zero() {
            self.set_position(id, CoordFrame::User, target)?;
            return Ok(self.finished_handle(options.callback));
        }
        let (dx, dy) = (target[0] - x, target[1] - y);
        if dx.abs() < EPSILON && dy.abs() < EPSILON {
            return Ok(self.finished_handle(options.callback));
        }

        let delay = self.path_delay();
        let steps = (time.as_secs_f64() / delay.as_secs_f64()).ceil().max(1.0) as usize;
        let path = (1..=steps)
            .map(|k| {
                let s = options.effect.apply(k as f64 / steps as f64);
                [x + dx * s, y + dy * s]
            })
            .collect();
        Ok(self.register_animation(id, AnimationKind::Path(path), delay, options.callback))
    }

    /// 去 `target` 再回来，重复 `options.repeat` 次，总时长 `time`
    pub fn visit(
        &mut self,
        id: ElementId,
        target: [f64; 2],
        time: Duration,
        options: MoveOptions,
    ) -> BoardResult<AnimationHandle> {
        let [x, y] = self.coords(id)?.user_xy();
        let (dx, dy) = (target[0] - x, target[1] - y);
        let delay = self.path_delay();
        let repeat = options.repeat.max(1) as usize;
        let steps = (time.as_secs_f64() / (delay.as_secs_f64() * repeat as f64)).ceil().max(1.0) as usize;

        let half = steps as f64 / 2.0;
        // 每轮不含出发点，最后一个采样点回到出发点
        let mut path = VecDeque::with_capacity(repeat * steps);
        for _ in 0..repeat {
            for k in 1..=steps {
                let t = if (k as f64) < half {
                    2.0 * k as f64 / steps as f64
                } else {
                    2.0 * (steps - k) as f64 / steps as f64
                };
                let s = options.effect.apply(t);
                path.push_back([x + dx * s, y + dy * s]);
            }
        }
        Ok(self.register_animation(id, AnimationKind::Path(path), delay, options.callback))
    }

    /// 沿给定的点列移动
    ///
    /// `options.interpolate` 为真时在点之间做 Neville 插值，否则按比例直接取样本点。
    pub fn move_along(
        &mut self,
        id: ElementId,
        points: &[[f64; 2]],
        time: Duration,
        options: MoveOptions,
    ) -> BoardResult<AnimationHandle> {
        let Some(last) = points.last().copied() else {
            return Err(ConstructionError::Arity {
                what: "animation path",
                expected: "at least 1",
                got: 0,
            }
            .into());
        };
        self.coords(id)?;
        if time.is_zero() {
            self.set_position(id, CoordFrame::User, last)?;
            return Ok(self.finished_handle(options.callback));
        }

        let delay = self.path_delay();
        let steps = (time.as_secs_f64() / delay.as_secs_f64()).ceil().max(1.0) as usize;
        let path: VecDeque<[f64; 2]> = if options.interpolate {
            let neville = NevillePath::new(points.to_vec());
            let max_t = neville.max_t();
            (1..=steps)
                .map(|k| neville.eval(k as f64 / steps as f64 * max_t))
                .collect()
        } else {
            let n = points.len() - 1;
            (1..=steps)
                .map(|k| points[(k as f64 / steps as f64 * n as f64).floor() as usize])
                .collect()
        };
        Ok(self.register_animation(id, AnimationKind::Path(path), delay, options.callback))
    }

    // === 滑动动画 ===

    /// 滑动点自动播放
    ///
    /// 每一步把计数加一，计数超过 `steps` 时归零并记一轮；`max_rounds` 轮后结束，`None` 表示不限。
    /// `delay` 缺省时取配置里的滑动间隔。已在播放的滑动点返回现有动画的句柄。
    pub fn start_animation(
        &mut self,
        id: ElementId,
        direction: i32,
        steps: u32,
        delay: Option<Duration>,
        max_rounds: Option<u32>,
    ) -> BoardResult<AnimationHandle> {
        if !self.coords_element(id)?.is_glider() {
            return Err(GliderError::NotAGlider(id).into());
        }
        let running = self
            .animations
            .iter()
            .find(|(_, a)| a.element == id && matches!(a.kind, AnimationKind::Glide(_)));
        if let Some((aid, a)) = running {
            return Ok(AnimationHandle {
                id: *aid,
                cancel: a.cancel.clone(),
                rx: a.tx.subscribe(),
            });
        }

        let delay = delay.unwrap_or(Duration::from_millis(self.config.glide_delay_ms));
        let glide = GlideState {
            direction,
            steps: steps.max(1),
            count: 0,
            rounds: 0,
            max_rounds,
        };
        Ok(self.register_animation(id, AnimationKind::Glide(glide), delay, None))
    }

    /// 滑动动画的一步，返回是否继续
    fn glide_step(&mut self, id: ElementId, g: &mut GlideState) -> BoardResult<bool> {
        g.count += 1;
        if g.count > g.steps {
            g.count = 0;
            g.rounds += 1;
            if g.max_rounds.is_some_and(|max| g.rounds >= max) {
                return Ok(false);
            }
        }
        let frac = g.count as f64 / g.steps as f64;
        let forward = g.direction >= 0;

        let slide = self
            .coords_element(id)?
            .glider()
            .and_then(|s| s.slide_object())
            .ok_or(GliderError::NotAGlider(id))?;
        let vp = *self.viewport();

        let target = match &self.element(slide)?.shape {
            Shape::Line(l) => {
                let (start, end) = if forward { (l.point1, l.point2) } else { (l.point2, l.point1) };
                let s = self.coords(start)?.screen_xy();
                let e = self.coords(end)?.screen_xy();
                let (dx, dy) = (e[0] - s[0], e[1] - s[1]);
                let d = dx.hypot(dy);
                (d.is_finite() && d > EPSILON).then(|| (CoordFrame::Screen, [s[0] + frac * dx, s[1] + frac * dy]))
            }
            Shape::Circle(c) => {
                let center = self.coords(c.center)?.user_xy();
                let alpha = if forward { 1.0 - frac } else { frac } * 2.0 * PI;
                Some((
                    CoordFrame::User,
                    [center[0] + c.radius * alpha.cos(), center[1] + c.radius * alpha.sin()],
                ))
            }
            Shape::Curve(_) => {
                let x = if forward { frac } else { 1.0 - frac } * vp.width;
                Some((CoordFrame::Screen, [x, 0.0]))
            }
            _ => None,
        };

        match target {
            Some((frame, xy)) => {
                self.coords_element_mut(id)?.coords.set(frame, xy, &vp);
            }
            None => {
                let span = match &self.element(slide)?.shape {
                    Shape::Turtle(t) => t.max_t(),
                    _ => 1.0,
                };
                let pos = if forward { frac } else { 1.0 - frac } * span;
                self.set_glider_position(id, pos)?;
            }
        }
        Ok(true)
    }
}
