//! Locomotion — исполнение MoveIntent через силы тела
//!
//! Единственное место, где AI трогает Body. FSM/behavior пишут намерение
//! (точка, взгляд, прыжок, стрейф), locomotion превращает его в
//! apply_force/apply_impulse/jump + edge/obstacle реакции из perception.
//!
//! Recovery-боты пропускаются целиком — их телом владеет stuck recovery.

use bevy::prelude::*;

use crate::ai::perception::{classify_obstacle, detect_edge, ObstacleKind, RayWorld, WorldGeometry};
use crate::ai::stuck::StuckTracker;
use crate::components::{Body, Health, Personality, SpecialMove};
use crate::config::BotTuning;

/// Намерение движения на текущий тик (перезаписывается behavior каждый тик)
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct MoveIntent {
    /// Куда идти; None — стоим
    pub destination: Option<Vec3>,
    /// Куда смотреть; None — разворот не форсируем
    pub face: Option<Vec3>,
    /// Запрошен поведенческий прыжок
    pub want_jump: bool,
    /// Запрошен special move рывок к destination (если тело умеет)
    pub want_dash: bool,
    /// Боковой стрейф: -1 / 0 / +1
    pub strafe: f32,
    /// Переопределение лимита скорости (grind); None — обычный max_speed
    pub speed_override: Option<f32>,
}

impl MoveIntent {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Нормализация угла в (-π, π]
fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    (angle + PI).rem_euclid(TAU) - PI
}

/// Корректировка направления с учётом обрывов
///
/// Прямо опасно → пробуем левый перпендикуляр, правый, иначе реверс.
fn avoid_edges(
    world: &dyn RayWorld,
    tuning: &BotTuning,
    entity: Entity,
    position: Vec3,
    dir: Vec3,
    speed: f32,
) -> Vec3 {
    let lookahead = tuning.obstacle_probe_distance;
    if !detect_edge(world, tuning, position, dir, lookahead, speed, Some(entity)) {
        return dir;
    }

    let left = Vec3::new(-dir.z, 0.0, dir.x);
    if !detect_edge(world, tuning, position, left, lookahead, speed, Some(entity)) {
        return left;
    }
    let right = -left;
    if !detect_edge(world, tuning, position, right, lookahead, speed, Some(entity)) {
        return right;
    }
    -dir
}

/// Система: MoveIntent → силы/импульсы тела
#[allow(clippy::type_complexity)]
pub fn apply_locomotion(
    tuning: Res<BotTuning>,
    geometry: Res<WorldGeometry>,
    mut bots: Query<(
        Entity,
        &Transform,
        &MoveIntent,
        &Personality,
        &StuckTracker,
        &Health,
        &mut Body,
        Option<&mut SpecialMove>,
    )>,
) {
    let world = geometry.0.as_ref();

    for (entity, transform, intent, personality, stuck, health, mut body, special) in
        bots.iter_mut()
    {
        if !health.is_alive() || stuck.in_recovery() {
            continue;
        }

        let position = transform.translation;

        // Разворот: пропорциональный контроль yaw через angular velocity
        if let Some(face) = intent.face {
            let to_face = Vec3::new(face.x - position.x, 0.0, face.z - position.z);
            if to_face.length_squared() > 1e-6 {
                let desired_yaw = to_face.z.atan2(to_face.x);
                let error = wrap_angle(desired_yaw - body.yaw);
                body.angular_velocity = error * tuning.turn_rate * personality.turn_speed_factor;
            }
        }

        // Движение к точке
        if let Some(destination) = intent.destination {
            let to_dest = Vec3::new(destination.x - position.x, 0.0, destination.z - position.z);
            if to_dest.length() > tuning.arrive_radius {
                let mut dir = to_dest.normalize_or_zero();
                dir = avoid_edges(
                    world,
                    &tuning,
                    entity,
                    position,
                    dir,
                    body.horizontal_speed(),
                );

                let report = classify_obstacle(
                    world,
                    &tuning,
                    position,
                    dir,
                    tuning.obstacle_probe_distance,
                    Some(entity),
                );
                if report.has_obstacle {
                    if report.can_jump && body.grounded && body.can_jump() {
                        // Перепрыгиваемый уступ — прыгаем с разбега
                        body.jump(tuning.jump_impulse);
                    } else if matches!(
                        report.kind,
                        ObstacleKind::Wall | ObstacleKind::OverheadSlope
                    ) {
                        // Непроходимое — уходим вдоль препятствия
                        dir = Vec3::new(-dir.z, 0.0, dir.x);
                    }
                    // Slope/jumpable platform без прыжка — едем как есть
                }

                body.apply_force(dir * tuning.move_force);
            }
        }

        // Поведенческий прыжок по запросу
        if intent.want_jump && body.can_jump() {
            body.jump(tuning.jump_impulse);
        }

        // Special move рывок в сторону destination
        if intent.want_dash {
            if let (Some(mut special), Some(destination)) = (special, intent.destination) {
                let dir = Vec3::new(
                    destination.x - position.x,
                    0.0,
                    destination.z - position.z,
                )
                .normalize_or_zero();
                if special.is_ready() && dir != Vec3::ZERO {
                    special.trigger(&mut body, dir);
                }
            }
        }

        // Стрейф: боковой импульс перпендикулярно взгляду
        if intent.strafe != 0.0 {
            let facing = body.facing();
            let side = Vec3::new(-facing.z, 0.0, facing.x);
            body.apply_impulse(side * intent.strafe * tuning.strafe_impulse);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::perception::{Aabb, StaticWorld};

    fn tuning() -> BotTuning {
        BotTuning::default()
    }

    #[test]
    fn test_wrap_angle() {
        use std::f32::consts::PI;
        assert!((wrap_angle(0.0)).abs() < 1e-6);
        assert!((wrap_angle(PI + 0.1) - (-PI + 0.1)).abs() < 1e-5);
        assert!((wrap_angle(-PI - 0.1) - (PI - 0.1)).abs() < 1e-5);
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-4);
    }

    #[test]
    fn test_intent_clear() {
        let mut intent = MoveIntent {
            destination: Some(Vec3::X),
            face: Some(Vec3::X),
            want_jump: true,
            want_dash: false,
            strafe: 1.0,
            speed_override: Some(12.0),
        };
        intent.clear();
        assert_eq!(intent.destination, None);
        assert!(!intent.want_jump);
        assert_eq!(intent.strafe, 0.0);
        assert_eq!(intent.speed_override, None);
    }

    #[test]
    fn test_avoid_edges_turns_at_cliff() {
        // Платформа обрывается по +X; влево (по -Z перпендикуляру) — тоже
        // пол, значит steering выберет первый безопасный перпендикуляр
        let world = StaticWorld {
            ground_y: -100.0,
            boxes: vec![Aabb::new(
                Vec3::new(-20.0, -0.5, -20.0),
                Vec3::new(2.0, 0.0, 20.0),
            )],
        };
        let t = tuning();
        let dir = avoid_edges(&world, &t, Entity::from_raw(1), Vec3::ZERO, Vec3::X, 0.0);
        assert_ne!(dir, Vec3::X);
        // Выбранное направление само безопасно
        assert!(!detect_edge(&world, &t, Vec3::ZERO, dir, t.obstacle_probe_distance, 0.0, None));
    }

    #[test]
    fn test_avoid_edges_keeps_safe_direction() {
        let world = StaticWorld {
            ground_y: 0.0,
            boxes: vec![],
        };
        let t = tuning();
        let dir = avoid_edges(&world, &t, Entity::from_raw(1), Vec3::ZERO, Vec3::X, 0.0);
        assert_eq!(dir, Vec3::X);
    }
}
