//! Headless физика: custom velocity integration
//!
//! ECS — strategic layer; настоящую физику считает host. Headless режим
//! (тесты, симуляция без host) интегрирует Body сам: силы → velocity →
//! transform, ground detection через инжектированную геометрию.
//!
//! Порядок внутри тика: гравитация → интеграция → cooldowns способностей
//! тела.

use bevy::prelude::*;

use crate::ai::locomotion::MoveIntent;
use crate::ai::perception::WorldGeometry;
use crate::components::{Body, SpecialMove};
use crate::config::BotTuning;
use crate::SimSet;

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            (apply_gravity, integrate_bodies, tick_special_cooldowns)
                .chain()
                .in_set(SimSet::Physics),
        );
    }
}

/// Система: гравитация для тел в воздухе
pub fn apply_gravity(
    time: Res<Time<Fixed>>,
    tuning: Res<BotTuning>,
    mut bodies: Query<&mut Body>,
) {
    let delta = time.delta_secs();

    for mut body in bodies.iter_mut() {
        if !body.grounded {
            body.velocity.y += tuning.gravity * delta;
        }
    }
}

/// Ограничение горизонтальной скорости (Y не трогаем)
fn clamp_horizontal_speed(velocity: Vec3, limit: f32) -> Vec3 {
    let horizontal = Vec3::new(velocity.x, 0.0, velocity.z);
    let speed = horizontal.length();
    if speed <= limit || speed < 1e-6 {
        return velocity;
    }
    let scaled = horizontal * (limit / speed);
    Vec3::new(scaled.x, velocity.y, scaled.z)
}

/// Нормализация yaw в (-π, π]
fn wrap_yaw(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    (angle + PI).rem_euclid(TAU) - PI
}

/// Радиус капсулы тела для боковых столкновений (метры)
const BODY_RADIUS: f32 = 0.4;

/// Система: интеграция тел
///
/// force*dt + impulse → velocity → clamp → translation; yaw из angular
/// velocity; ground detection лучом вниз со snap к поверхности.
#[allow(clippy::type_complexity)]
pub fn integrate_bodies(
    time: Res<Time<Fixed>>,
    tuning: Res<BotTuning>,
    geometry: Res<WorldGeometry>,
    mut bodies: Query<(Entity, &mut Transform, &mut Body, Option<&MoveIntent>)>,
) {
    let delta = time.delta_secs();
    let world = geometry.0.as_ref();

    for (entity, mut transform, mut body, intent) in bodies.iter_mut() {
        // Аккумуляторы тика → скорость
        let force = body.force;
        let impulse = body.impulse;
        body.velocity += force * delta + impulse;
        body.force = Vec3::ZERO;
        body.impulse = Vec3::ZERO;

        // Трение на земле, иначе тела разгоняются бесконечно
        if body.grounded {
            let damping = 1.0 - (tuning.linear_damping * delta).min(1.0);
            body.velocity.x *= damping;
            body.velocity.z *= damping;
        }

        let limit = intent
            .and_then(|i| i.speed_override)
            .unwrap_or(tuning.max_speed);
        body.velocity = clamp_horizontal_speed(body.velocity, limit);

        // Боковое столкновение: луч по ходу движения на высоте корпуса;
        // у стены горизонтальная компонента в стену гасится
        let horizontal = Vec3::new(body.velocity.x, 0.0, body.velocity.z);
        let speed = horizontal.length();
        if speed > 1e-4 {
            let dir = horizontal / speed;
            let origin = transform.translation + Vec3::Y * 0.9;
            let step = speed * delta + BODY_RADIUS;
            if let Some(hit) = world.cast_ray(origin, dir, step, Some(entity)) {
                let allowed = (hit.distance - BODY_RADIUS).max(0.0);
                if allowed < speed * delta {
                    transform.translation += dir * allowed;
                    let into_wall = dir * body.velocity.dot(dir);
                    body.velocity -= into_wall;
                }
            }
        }

        transform.translation += body.velocity * delta;

        // Yaw интеграция + затухание angular velocity
        body.yaw = wrap_yaw(body.yaw + body.angular_velocity * delta);
        body.angular_velocity *= 1.0 - (tuning.angular_damping * delta).min(1.0);
        transform.rotation = Quat::from_rotation_y(-body.yaw);

        // Ground detection: короткий луч вниз с запасом над ногами
        let origin = transform.translation + Vec3::Y * 0.5;
        let grounded_hit = world
            .cast_ray(origin, Vec3::NEG_Y, 0.6, Some(entity))
            .filter(|_| body.velocity.y <= 0.0);

        if let Some(hit) = grounded_hit {
            transform.translation.y = hit.point.y;
            body.velocity.y = 0.0;
            if !body.grounded {
                body.jump_count = 0;
            }
            body.grounded = true;
        } else {
            body.grounded = false;
        }
    }
}

/// Система: тик cooldowns special move
pub fn tick_special_cooldowns(time: Res<Time<Fixed>>, mut specials: Query<&mut SpecialMove>) {
    let delta = time.delta_secs();

    for mut special in specials.iter_mut() {
        if special.timer > 0.0 {
            special.timer = (special.timer - delta).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_preserves_vertical() {
        let v = Vec3::new(30.0, -5.0, 40.0); // горизонталь 50
        let clamped = clamp_horizontal_speed(v, 8.0);
        assert!((Vec3::new(clamped.x, 0.0, clamped.z).length() - 8.0).abs() < 1e-4);
        assert_eq!(clamped.y, -5.0);
    }

    #[test]
    fn test_clamp_leaves_slow_bodies() {
        let v = Vec3::new(2.0, 0.0, 1.0);
        assert_eq!(clamp_horizontal_speed(v, 8.0), v);
    }

    #[test]
    fn test_wrap_yaw() {
        use std::f32::consts::PI;
        assert!((wrap_yaw(2.0 * PI)).abs() < 1e-5);
        assert!((wrap_yaw(PI + 0.2) - (-PI + 0.2)).abs() < 1e-5);
    }
}
