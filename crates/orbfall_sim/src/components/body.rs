//! Movable Body контракт + опциональные capability компоненты
//!
//! Body — embodiment бота: velocity, grounded, счётчики прыжков, yaw.
//! Контроллер общается с телом ТОЛЬКО через apply_force/apply_impulse/jump
//! и angular velocity — так же, как настоящий host-движок применял бы их.
//!
//! Опциональные способности тела (rail traversal, special move) — отдельные
//! компоненты: наличие компонента = наличие способности. Контроллер
//! проверяет presence через Option<&T> в query, никакого дактайпинга.

use bevy::prelude::*;

/// Физическое тело бота (custom velocity integration, headless)
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Body {
    /// Текущая скорость (m/s)
    pub velocity: Vec3,
    /// На земле ли (обновляется ground detection в physics)
    pub grounded: bool,
    /// Прыжки с момента последнего приземления
    pub jump_count: u8,
    /// Максимум прыжков подряд (2 = double jump)
    pub max_jumps: u8,
    /// Горизонтальный разворот (радианы, 0 = +X)
    pub yaw: f32,
    /// Угловая скорость по yaw (rad/s)
    pub angular_velocity: f32,
    /// Аккумулятор сил на текущий тик (сбрасывается интеграцией)
    pub force: Vec3,
    /// Аккумулятор импульсов на текущий тик
    pub impulse: Vec3,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            grounded: false,
            jump_count: 0,
            max_jumps: 2,
            yaw: 0.0,
            angular_velocity: 0.0,
            force: Vec3::ZERO,
            impulse: Vec3::ZERO,
        }
    }
}

impl Body {
    /// Накопить силу (применится при интеграции этого тика)
    pub fn apply_force(&mut self, force: Vec3) {
        self.force += force;
    }

    /// Накопить импульс (мгновенное изменение velocity)
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        self.impulse += impulse;
    }

    /// Направление взгляда (горизонтальный unit vector из yaw)
    pub fn facing(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, self.yaw.sin())
    }

    /// Горизонтальная скорость (без Y компоненты)
    pub fn horizontal_speed(&self) -> f32 {
        Vec3::new(self.velocity.x, 0.0, self.velocity.z).length()
    }

    /// Может ли прыгнуть сейчас (земля или остались air jumps)
    pub fn can_jump(&self) -> bool {
        self.grounded || self.jump_count < self.max_jumps
    }

    /// Прыжок: вертикальный импульс + учёт счётчика
    pub fn jump(&mut self, impulse: f32) {
        self.apply_impulse(Vec3::Y * impulse);
        self.jump_count = self.jump_count.saturating_add(1);
        self.grounded = false;
    }
}

/// Capability: тело умеет rail traversal (GRIND доступен)
///
/// Опциональное расширение FSM — боты без компонента рельсы игнорируют.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct RailRider;

/// Capability: special mobility move (dash)
///
/// Используется recovery ladder и stateful поведением; отсутствие
/// компонента молча отключает эти действия на тик.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct SpecialMove {
    /// Импульс рывка (m/s)
    pub impulse: f32,
    /// Cooldown между использованиями (секунды)
    pub cooldown: f32,
    /// Оставшийся cooldown
    pub timer: f32,
}

impl Default for SpecialMove {
    fn default() -> Self {
        Self {
            impulse: 9.0,
            cooldown: 3.0,
            timer: 0.0,
        }
    }
}

impl SpecialMove {
    pub fn is_ready(&self) -> bool {
        self.timer <= 0.0
    }

    /// Рывок вдоль направления, запускает cooldown
    pub fn trigger(&mut self, body: &mut Body, direction: Vec3) {
        body.apply_impulse(direction * self.impulse);
        self.timer = self.cooldown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_counter() {
        let mut body = Body {
            grounded: true,
            ..default()
        };
        assert!(body.can_jump());

        body.jump(7.0);
        assert_eq!(body.jump_count, 1);
        assert!(!body.grounded);
        assert!(body.can_jump()); // double jump остался

        body.jump(7.0);
        assert_eq!(body.jump_count, 2);
        assert!(!body.can_jump()); // прыжки кончились
    }

    #[test]
    fn test_facing_from_yaw() {
        let body = Body {
            yaw: std::f32::consts::FRAC_PI_2,
            ..default()
        };
        let f = body.facing();
        assert!(f.x.abs() < 1e-6);
        assert!((f.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_force_accumulation() {
        let mut body = Body::default();
        body.apply_force(Vec3::X * 10.0);
        body.apply_force(Vec3::X * 5.0);
        assert_eq!(body.force, Vec3::X * 15.0);
    }
}
