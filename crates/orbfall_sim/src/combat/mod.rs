//! Combat capability контракт
//!
//! Конкретные эффекты способностей живут в host слое — здесь только
//! контракт, который потребляет bot AI: готовность (cooldown), optimal
//! range, опциональная зарядка, intent событие выстрела.

use bevy::prelude::*;

pub mod capability;

pub use capability::{AbilityFired, ChargeSpec, CombatCapability};

use crate::SimSet;

/// Combat Plugin: события + тик cooldowns
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<AbilityFired>().add_systems(
            FixedUpdate,
            capability::update_capability_cooldowns.in_set(SimSet::Arena),
        );
    }
}
