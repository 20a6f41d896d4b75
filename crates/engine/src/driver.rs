//! Frame-callback scheduler for live playback.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::engine::Engine;

/// Roughly one display refresh.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Tick the engine every `frame_interval` until playback stops.
///
/// Returns the number of ticks run. Late ticks are skipped rather than
/// bunched; the clock catches up from wall time anyway.
pub async fn run_playback_loop(engine: &mut Engine, frame_interval: Duration) -> u64 {
    let mut interval = tokio::time::interval(frame_interval.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = 0u64;
    while engine.clock().is_playing() {
        interval.tick().await;
        ticks += 1;
        if !engine.tick() {
            break;
        }
    }
    tracing::debug!(ticks, time = engine.current_time(), "Playback loop exited");
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackState;
    use scenecast_common::config::{CanvasConfig, EngineConfig};

    fn config(duration_ms: f64) -> EngineConfig {
        let mut config = EngineConfig {
            canvas: CanvasConfig {
                width: 32,
                height: 18,
                ..CanvasConfig::default()
            },
            ..EngineConfig::default()
        };
        config.playback.total_duration_ms = duration_ms;
        config
    }

    #[tokio::test]
    async fn test_loop_runs_to_end_and_pauses() {
        let mut engine = Engine::new(config(60.0)).unwrap();
        engine.play();
        let ticks = run_playback_loop(&mut engine, Duration::from_millis(5)).await;
        assert!(ticks >= 1);
        assert_eq!(engine.current_time(), 60.0);
        assert_eq!(engine.playback_state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn test_loop_does_nothing_when_not_playing() {
        let mut engine = Engine::new(config(60.0)).unwrap();
        assert_eq!(run_playback_loop(&mut engine, Duration::from_millis(5)).await, 0);
        assert_eq!(engine.current_time(), 0.0);
    }
}
