//! Target Selection — кэши кандидатов и выбор целей
//!
//! Кэши обновляются throttled (не каждый тик): bounded staleness —
//! осознанный размен на стоимость запросов. Перед КАЖДЫМ использованием
//! entity из кэша валидируется заново (жив / не собран) — кэш никогда
//! не трактуется как гарантированно валидный.

use bevy::prelude::*;

use crate::ai::perception::{has_line_of_sight, RayWorld};
use crate::combat::CombatCapability;
use crate::components::{Actor, EnergyOrb, Health, Personality, StrategicPreference, WeaponPickup};
use crate::config::BotTuning;

/// Кэшированные снапшоты реестров кандидатов (per-bot)
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct TargetCaches {
    pub enemies: Vec<Entity>,
    pub pickups: Vec<Entity>,
    pub orbs: Vec<Entity>,
    /// Обратный отсчёт до следующего refresh
    pub refresh_timer: f32,
}

/// Система: throttled пересканирование реестров
///
/// Держим только валидные entity: живые враги чужой фракции, несобранные
/// орбы. Кэши сортируются по Entity ID — детерминированный порядок
/// обхода (и разрешение ничьих в скоринге) при фиксированном спавне.
pub fn refresh_target_caches(
    time: Res<Time<Fixed>>,
    tuning: Res<BotTuning>,
    mut bots: Query<(Entity, &Actor, &mut TargetCaches)>,
    actors: Query<(Entity, &Actor, &Health)>,
    pickups: Query<Entity, With<WeaponPickup>>,
    orbs: Query<(Entity, &EnergyOrb)>,
) {
    let delta = time.delta_secs();

    for (bot, actor, mut caches) in bots.iter_mut() {
        caches.refresh_timer -= delta;
        if caches.refresh_timer > 0.0 {
            continue;
        }
        caches.refresh_timer = tuning.cache_refresh_interval;

        caches.enemies = actors
            .iter()
            .filter(|(entity, other, health)| {
                *entity != bot && other.faction_id != actor.faction_id && health.is_alive()
            })
            .map(|(entity, _, _)| entity)
            .collect();
        caches.enemies.sort_by_key(|e| e.index());

        caches.pickups = pickups.iter().collect();
        caches.pickups.sort_by_key(|e| e.index());

        caches.orbs = orbs
            .iter()
            .filter(|(_, orb)| !orb.collected)
            .map(|(entity, _)| entity)
            .collect();
        caches.orbs.sort_by_key(|e| e.index());
    }
}

/// Score одного кандидата в combat цели
///
/// base 100 + близость + health differential (агрессия против слабых,
/// осторожность против сильных) + видимость + попадание в optimal range
/// окно + бонус strategic preference.
pub fn score_combat_candidate(
    tuning: &BotTuning,
    personality: &Personality,
    my_health: &Health,
    enemy_health: &Health,
    distance: f32,
    visible: bool,
    optimal_range: f32,
) -> f32 {
    let mut score = 100.0;

    // Ближе — лучше
    score += (100.0 - 2.0 * distance).max(0.0);

    // Health differential: перевес взвешивается агрессией, отставание —
    // осторожностью (осторожные боты сильнее избегают сильных врагов)
    let diff = my_health.current as f32 - enemy_health.current as f32;
    if diff > 0.0 {
        score += diff * personality.aggression;
    } else {
        score += diff * personality.caution;
    }

    if visible {
        score += 50.0;
    }

    if (distance - optimal_range).abs() <= tuning.optimal_range_window {
        score += 40.0;
    }

    score += match personality.preference {
        StrategicPreference::Aggressive if distance <= tuning.close_band => tuning.preference_bonus,
        StrategicPreference::Defensive
            if distance > tuning.close_band && distance <= tuning.mid_band =>
        {
            tuning.preference_bonus
        }
        StrategicPreference::Support
            if enemy_health.fraction() < tuning.weak_health_fraction =>
        {
            tuning.preference_bonus
        }
        _ => 0.0,
    };

    score
}

/// Выбор combat цели: лучший score по кэшу врагов
///
/// Вызывающий подаёт итератор (entity, позиция, health) по своему кэшу —
/// мёртвые/исчезнувшие entity отфильтрованы ещё до скоринга. Ничья —
/// первый в порядке кэша (детерминированно); пустой кэш → None.
pub fn select_combat_target(
    tuning: &BotTuning,
    world: &dyn RayWorld,
    me: Entity,
    my_position: Vec3,
    my_health: &Health,
    personality: &Personality,
    capability: Option<&CombatCapability>,
    candidates: impl Iterator<Item = (Entity, Vec3, Health)>,
) -> Option<Entity> {
    let optimal_range = capability
        .map(|c| c.optimal_range)
        .unwrap_or(tuning.default_combat_range);
    let eye = my_position + Vec3::Y * tuning.eye_height;

    let mut best: Option<(Entity, f32)> = None;

    for (enemy, enemy_pos, health) in candidates {
        if !health.is_alive() {
            continue;
        }

        let distance = my_position.distance(enemy_pos);
        let visible = has_line_of_sight(
            world,
            tuning,
            eye,
            enemy_pos + Vec3::Y * tuning.eye_height,
            Some(me),
        );

        let score = score_combat_candidate(
            tuning,
            personality,
            my_health,
            &health,
            distance,
            visible,
            optimal_range,
        );

        // Строгое > сохраняет первого при ничьей
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((enemy, score));
        }
    }

    best.map(|(entity, _)| entity)
}

/// Ближайший pickup/orb: видимый ИЛИ в fallback радиусе
///
/// Общая логика для обоих видов подбираемого — вызывающий подаёт
/// итератор (entity, позиция) по своему кэшу.
pub fn nearest_reachable(
    tuning: &BotTuning,
    world: &dyn RayWorld,
    me: Entity,
    my_position: Vec3,
    candidates: impl Iterator<Item = (Entity, Vec3)>,
) -> Option<Entity> {
    let eye = my_position + Vec3::Y * tuning.eye_height;
    let mut best: Option<(Entity, f32)> = None;

    for (entity, position) in candidates {
        let distance = my_position.distance(position);
        let reachable = distance <= tuning.pickup_fallback_radius
            || has_line_of_sight(world, tuning, eye, position + Vec3::Y * 0.5, Some(me));
        if !reachable {
            continue;
        }

        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((entity, distance));
        }
    }

    best.map(|(entity, _)| entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::perception::StaticWorld;

    fn tuning() -> BotTuning {
        BotTuning::default()
    }

    fn flat_world() -> StaticWorld {
        StaticWorld {
            ground_y: 0.0,
            boxes: vec![],
        }
    }

    #[test]
    fn test_closer_enemy_scores_higher() {
        let t = tuning();
        let p = Personality::default();
        let me = Health::new(100);
        let enemy = Health::new(100);

        let near = score_combat_candidate(&t, &p, &me, &enemy, 10.0, false, 100.0);
        let far = score_combat_candidate(&t, &p, &me, &enemy, 45.0, false, 100.0);
        assert!(near > far);
    }

    #[test]
    fn test_visibility_bonus() {
        let t = tuning();
        let p = Personality::default();
        let me = Health::new(100);
        let enemy = Health::new(100);

        let hidden = score_combat_candidate(&t, &p, &me, &enemy, 20.0, false, 100.0);
        let visible = score_combat_candidate(&t, &p, &me, &enemy, 20.0, true, 100.0);
        assert!((visible - hidden - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_optimal_range_bonus() {
        let t = tuning();
        let p = Personality::default();
        let me = Health::new(100);
        let enemy = Health::new(100);

        // дистанция 22 при optimal 25: в окне ±5 → +40
        let in_window = score_combat_candidate(&t, &p, &me, &enemy, 22.0, false, 25.0);
        let out_window = score_combat_candidate(&t, &p, &me, &enemy, 22.0, false, 40.0);
        assert!((in_window - out_window - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_aggression_favors_weaker_enemy() {
        let t = tuning();
        let mut p = Personality::default();
        p.aggression = 0.9;
        p.caution = 0.2;
        let me = Health::new(100);
        let weak = Health {
            current: 20,
            max: 100,
        };
        let strong = Health::new(100);

        let weak_score = score_combat_candidate(&t, &p, &me, &weak, 30.0, false, 100.0);
        let strong_score = score_combat_candidate(&t, &p, &me, &strong, 30.0, false, 100.0);
        assert!(weak_score > strong_score);
    }

    #[test]
    fn test_select_empty_cache_returns_none() {
        let t = tuning();
        let picked = select_combat_target(
            &t,
            &flat_world(),
            Entity::from_raw(0),
            Vec3::ZERO,
            &Health::new(100),
            &Personality::default(),
            None,
            std::iter::empty(),
        );
        assert_eq!(picked, None);
    }

    #[test]
    fn test_select_picks_highest_score() {
        let t = tuning();
        let far = Entity::from_raw(1);
        let near = Entity::from_raw(2);
        // Оба видимы на плоской арене; ближний набирает больше
        let picked = select_combat_target(
            &t,
            &flat_world(),
            Entity::from_raw(0),
            Vec3::ZERO,
            &Health::new(100),
            &Personality::default(),
            None,
            [
                (far, Vec3::new(30.0, 0.0, 0.0), Health::new(100)),
                (near, Vec3::new(10.0, 0.0, 0.0), Health::new(100)),
            ]
            .into_iter(),
        );
        assert_eq!(picked, Some(near));
    }

    #[test]
    fn test_select_tie_keeps_first_in_cache_order() {
        let t = tuning();
        let first = Entity::from_raw(1);
        let second = Entity::from_raw(2);
        // Симметричные позиции, одинаковый health — идентичный score
        let picked = select_combat_target(
            &t,
            &flat_world(),
            Entity::from_raw(0),
            Vec3::ZERO,
            &Health::new(100),
            &Personality::default(),
            None,
            [
                (first, Vec3::new(0.0, 0.0, 10.0), Health::new(100)),
                (second, Vec3::new(10.0, 0.0, 0.0), Health::new(100)),
            ]
            .into_iter(),
        );
        assert_eq!(picked, Some(first));
    }

    #[test]
    fn test_select_skips_dead_candidates() {
        let t = tuning();
        let dead = Entity::from_raw(1);
        let alive = Entity::from_raw(2);
        let picked = select_combat_target(
            &t,
            &flat_world(),
            Entity::from_raw(0),
            Vec3::ZERO,
            &Health::new(100),
            &Personality::default(),
            None,
            [
                (dead, Vec3::new(5.0, 0.0, 0.0), Health { current: 0, max: 100 }),
                (alive, Vec3::new(20.0, 0.0, 0.0), Health::new(100)),
            ]
            .into_iter(),
        );
        assert_eq!(picked, Some(alive));
    }

    #[test]
    fn test_support_preference_bonus_on_weak_target() {
        let t = tuning();
        let mut p = Personality::default();
        p.preference = StrategicPreference::Support;
        // нейтрализуем health differential term
        p.aggression = 0.0;
        let me = Health::new(100);
        let weak = Health {
            current: 30,
            max: 100,
        };

        let with_pref = score_combat_candidate(&t, &p, &me, &weak, 40.0, false, 100.0);
        p.preference = StrategicPreference::Balanced;
        let without = score_combat_candidate(&t, &p, &me, &weak, 40.0, false, 100.0);
        assert!((with_pref - without - t.preference_bonus).abs() < 1e-4);
    }
}
