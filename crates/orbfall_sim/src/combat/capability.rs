//! CombatCapability — контракт боевой способности
//!
//! Architecture:
//! - ECS: strategic decision ("cooldown готов, proficiency достаточна")
//! - Host: tactical execution (спавн снаряда, урон) по AbilityFired event
//!
//! Отсутствие ChargeSpec = способность мгновенная (use сразу).
//! Зарядка реализуется явным countdown sub-state в BotTimers, НЕ отложенным
//! callback'ом — никакого dangling состояния при FSM переходах.

use bevy::prelude::*;

/// Параметры charge фазы (только у заряжаемых способностей)
#[derive(Debug, Clone, Reflect)]
pub struct ChargeSpec {
    /// Максимальная длительность зарядки (секунды)
    pub max_duration: f32,
}

/// Боевая способность, которую держит бот (присутствие = "armed")
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct CombatCapability {
    /// Имя способности (для логов/отладки)
    pub name: String,
    /// Cooldown между использованиями (секунды)
    pub cooldown: f32,
    /// Оставшийся cooldown
    pub cooldown_timer: f32,
    /// Дистанция максимальной эффективности (метры)
    pub optimal_range: f32,
    /// Базовый proficiency score способности (0..100)
    pub base_score: f32,
    /// Опциональная charge фаза; None = мгновенное использование
    pub charge: Option<ChargeSpec>,
}

impl CombatCapability {
    pub fn new(name: impl Into<String>, cooldown: f32, optimal_range: f32, base_score: f32) -> Self {
        Self {
            name: name.into(),
            cooldown,
            cooldown_timer: 0.0,
            optimal_range,
            base_score,
            charge: None,
        }
    }

    /// Заряжаемый вариант
    pub fn with_charge(mut self, max_duration: f32) -> Self {
        self.charge = Some(ChargeSpec { max_duration });
        self
    }

    pub fn is_ready(&self) -> bool {
        self.cooldown_timer <= 0.0
    }

    pub fn supports_charge(&self) -> bool {
        self.charge.is_some()
    }

    /// Использование: запускает cooldown (эффект — на стороне host)
    pub fn trigger(&mut self) {
        self.cooldown_timer = self.cooldown;
    }
}

/// Event: бот стреляет способностью (strategic intent → host execution)
#[derive(Event, Debug, Clone)]
pub struct AbilityFired {
    /// Кто стреляет
    pub shooter: Entity,
    /// В кого (None — выстрел "в точку" без цели)
    pub target: Option<Entity>,
    /// Точка прицеливания (с учётом lead prediction)
    pub aim_point: Vec3,
    /// Выстрел после charge фазы
    pub charged: bool,
}

/// Система: тик cooldowns способностей
///
/// Таймер клампится к нулю — не уходит в минус дольше одного тика.
pub fn update_capability_cooldowns(
    mut capabilities: Query<&mut CombatCapability>,
    time: Res<Time<Fixed>>,
) {
    let delta = time.delta_secs();

    for mut capability in capabilities.iter_mut() {
        if capability.cooldown_timer > 0.0 {
            capability.cooldown_timer = (capability.cooldown_timer - delta).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_gates_readiness() {
        let mut cap = CombatCapability::new("railgun", 1.5, 25.0, 80.0);
        assert!(cap.is_ready());

        cap.trigger();
        assert!(!cap.is_ready());
        assert_eq!(cap.cooldown_timer, 1.5);
    }

    #[test]
    fn test_charge_support() {
        let instant = CombatCapability::new("blaster", 0.5, 12.0, 70.0);
        assert!(!instant.supports_charge());

        let charged = CombatCapability::new("cannon", 2.0, 30.0, 90.0).with_charge(1.2);
        assert!(charged.supports_charge());
    }
}
