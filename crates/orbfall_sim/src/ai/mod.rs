//! Bot AI: perception, targeting, combat evaluator, FSM, stuck recovery,
//! locomotion
//!
//! Порядок систем внутри тика жёсткий (.chain()): кэши → stuck →
//! переходы FSM → поведение состояния → locomotion. Каждая стадия видит
//! результат предыдущей в этом же тике.

use bevy::prelude::*;

pub mod combat_eval;
pub mod fsm;
pub mod locomotion;
pub mod perception;
pub mod stuck;
pub mod targeting;

pub use fsm::{BotState, BotTimers, ChargeCountdown};
pub use locomotion::MoveIntent;
pub use perception::{Aabb, ObstacleKind, ObstacleReport, RayWorld, StaticWorld, WorldGeometry};
pub use stuck::{BotTeleported, StuckTracker};
pub use targeting::TargetCaches;

use crate::SimSet;

/// Plugin: все AI системы бота
pub struct BotAiPlugin;

impl Plugin for BotAiPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<BotTeleported>().add_systems(
            FixedUpdate,
            (
                targeting::refresh_target_caches,
                stuck::stuck_detection,
                stuck::stuck_recovery,
                fsm::bot_fsm_transitions,
                fsm::bot_state_behavior,
                locomotion::apply_locomotion,
            )
                .chain()
                .in_set(SimSet::Ai),
        );
    }
}
