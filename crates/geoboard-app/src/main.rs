//! Geoboard 演示程序
//! 无界面地搭建一个构造，驱动动画并把每一步的结果写到日志里

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geoboard_core::prelude::*;

/// 程序配置：日志级别加画板配置
#[derive(Debug, Deserialize)]
#[serde(default)]
struct AppConfig {
    log_level: String,
    #[serde(flatten)]
    board: BoardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            board: BoardConfig::default(),
        }
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("读取配置失败: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("解析配置失败: {}", path.display()))
}

fn parse_level(text: &str) -> Result<Level> {
    text.parse()
        .with_context(|| format!("无效的日志级别: {text}"))
}

/// 演示用的构造
struct Demo {
    board: Board,
    a: ElementId,
    b: ElementId,
    midpoint: ElementId,
    glider: ElementId,
    tangent: ElementId,
    follower: ElementId,
}

impl Demo {
    fn build(config: BoardConfig) -> Result<Self> {
        let mut board = Board::new(config);

        let a = board.create_point([-3.0, -1.0])?;
        let b = board.create_point([1.0, 2.0])?;
        board.set_name(a, "A")?;
        board.set_name(b, "B")?;
        let ab = board.create_segment(a, b)?;
        let midpoint = board.create_midpoint(a, b)?;

        let circle = board.create_circle_through(midpoint, b)?;
        let glider = board.create_glider([3.0, 3.0], circle)?;
        let tangent = board.create_tangent(&[glider])?;

        // 靠近线段时会被吸上去
        let attrs = PointAttributes {
            attractors: vec![ab],
            attractor_distance: 0.2,
            snatch_distance: 1.0,
            ..Default::default()
        };
        let follower = board.create_point_with([4.0, -2.0], attrs)?;

        Ok(Self {
            board,
            a,
            b,
            midpoint,
            glider,
            tangent,
            follower,
        })
    }

    fn report(&self, label: &str) -> Result<()> {
        let m = self.board.coords(self.midpoint)?.user_xy();
        let g = self.board.coords(self.glider)?.user_xy();
        let slope = self.board.line_slope(self.tangent)?;
        info!(
            "{label}: midpoint=({:.3}, {:.3}) glider=({:.3}, {:.3}) t={:.3} tangent slope={:.3}",
            m[0],
            m[1],
            g[0],
            g[1],
            self.board.glider_position(self.glider)?,
            slope
        );
        Ok(())
    }

    async fn run(&mut self) -> Result<()> {
        self.report("initial")?;

        self.board.set_position(self.a, CoordFrame::User, [-4.0, -2.0])?;
        self.report("after dragging A")?;

        // 拖到线段附近，变成线段上的滑动点
        let [x, y] = self.board.coords(self.b)?.user_xy();
        self.board.set_position(self.follower, CoordFrame::User, [x - 0.05, y - 0.1])?;
        info!(
            "follower glides: {}",
            self.board.coords_element(self.follower)?.is_glider()
        );

        let glide = self
            .board
            .start_animation(self.glider, 1, 12, Some(Duration::from_millis(20)), Some(1))?;
        let walk = self.board.move_to(
            self.b,
            [2.0, -1.0],
            Duration::from_millis(300),
            MoveOptions::new().effect(Effect::EaseInOut),
        )?;

        let period = Duration::from_millis(self.board.config().animation_delay_ms.max(1));
        let mut interval = tokio::time::interval(period);
        let mut frames = 0usize;
        while self.board.tick(period) > 0 {
            interval.tick().await;
            frames += 1;
            if frames % 5 == 0 {
                self.report(&format!("frame {frames}"))?;
            }
        }

        info!("glide {:?}, walk {:?}", glide.finished().await, walk.finished().await);
        self.report("final")?;
        Ok(())
    }
}

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => AppConfig::default(),
    };
    let level = parse_level(&config.log_level)?;

    // 初始化日志
    tracing::subscriber::set_global_default(FmtSubscriber::builder().with_max_level(level).finish())?;

    info!("Starting Geoboard demo...");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("创建运行时失败")?;

    let mut demo = Demo::build(config.board)?;
    runtime.block_on(demo.run())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level("WARN").unwrap(), Level::WARN);
        assert!(parse_level("verbose").is_err());
    }

    #[test]
    fn test_config_defaults_and_flatten() {
        let config: AppConfig = serde_json::from_str(r#"{"log_level": "trace", "glide_delay_ms": 100}"#).unwrap();
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.board.glide_delay_ms, 100);
        assert_eq!(config.board.animation_delay_ms, BoardConfig::default().animation_delay_ms);
    }
}
