//! Внешние реестры арены: weapon pickups, орбы, рельсы
//!
//! Контроллер бота эти entity только ЧИТАЕТ (кэшируя throttled снапшоты);
//! consumption (collected флаг, выдача capability) — ответственность
//! arena систем, не контроллера.

use bevy::prelude::*;

use crate::combat::CombatCapability;

/// Лежащее на арене оружие; подбор вешает capability на бота
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct WeaponPickup {
    /// Шаблон способности, которую получит подобравший
    pub capability: CombatCapability,
}

/// Орб опыта
///
/// collected выставляет ТОЛЬКО arena система; контроллер проверяет флаг
/// перед каждым использованием (eventually-consistent снапшоты кэшей).
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct EnergyOrb {
    pub collected: bool,
}

/// Сегмент рельсы для GRIND (опциональное расширение FSM)
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct RailSegment {
    /// Направление движения по рельсе (горизонтальный unit vector)
    pub direction: Vec3,
}
