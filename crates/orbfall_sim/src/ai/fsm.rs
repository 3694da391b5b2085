//! Decision Engine — FSM состояний бота
//!
//! Один переход за тик, строгая лестница приоритетов:
//! retreat → collect ability → attack → collect orb → chase → wander.
//! Переходы НЕ двигают тело — они только меняют состояние; движение
//! выполняет state behavior + locomotion в этом же тике.
//!
//! Смена состояния всегда финализирует charge sub-state и сбрасывает
//! target-timeout якорь — никаких висящих таймеров из прошлой жизни.

use bevy::prelude::*;
use rand::Rng;

use crate::ai::perception::WorldGeometry;
use crate::ai::stuck::{roll_window, StuckTracker};
use crate::ai::targeting::{nearest_reachable, select_combat_target, TargetCaches};
use crate::ai::locomotion::MoveIntent;
use crate::combat::{AbilityFired, CombatCapability};
use crate::components::{
    Actor, Body, EnergyOrb, Health, Personality, RailRider, RailSegment, WeaponPickup,
};
use crate::config::BotTuning;
use crate::{log, DeterministicRng};

/// Состояние FSM бота (payload — контекст состояния)
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub enum BotState {
    /// Патруль к случайной точке
    Wander {
        destination: Vec3,
        /// Обратный отсчёт до смены точки
        retarget_timer: f32,
    },
    /// Преследование врага вне attack дистанции
    Chase { target: Entity },
    /// Бой на optimal range
    Attack { target: Entity },
    /// Отступление (commitment: до истечения таймера лестница не крутится)
    Retreat {
        /// От кого бежим (None — источник угрозы уже мёртв/исчез)
        from: Option<Entity>,
        timer: f32,
    },
    /// Движение к weapon pickup
    CollectAbility { pickup: Entity },
    /// Движение к energy orb
    CollectOrb { orb: Entity },
    /// Скольжение по рельсе (только RailRider)
    Grind { timer: f32, direction: Vec3 },
}

impl Default for BotState {
    fn default() -> Self {
        BotState::Wander {
            destination: Vec3::ZERO,
            retarget_timer: 0.0,
        }
    }
}

impl BotState {
    /// Имя состояния для логов
    pub fn name(&self) -> &'static str {
        match self {
            BotState::Wander { .. } => "WANDER",
            BotState::Chase { .. } => "CHASE",
            BotState::Attack { .. } => "ATTACK",
            BotState::Retreat { .. } => "RETREAT",
            BotState::CollectAbility { .. } => "COLLECT_ABILITY",
            BotState::CollectOrb { .. } => "COLLECT_ORB",
            BotState::Grind { .. } => "GRIND",
        }
    }

    /// Ожидается ли от состояния перемещение (для stuck детекции)
    ///
    /// ATTACK держит дистанцию и легитимно стоит на месте.
    pub fn expects_movement(&self) -> bool {
        !matches!(self, BotState::Attack { .. })
    }

    /// Текущая combat цель состояния (если есть)
    pub fn combat_target(&self) -> Option<Entity> {
        match self {
            BotState::Chase { target } | BotState::Attack { target } => Some(*target),
            _ => None,
        }
    }
}

/// Активная charge фаза способности (явный sub-state, не callback)
#[derive(Debug, Clone, Reflect)]
pub struct ChargeCountdown {
    /// Осталось до выстрела (секунды)
    pub remaining: f32,
    /// В кого стреляем по завершении
    pub target: Entity,
}

/// Поведенческие таймеры бота
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct BotTimers {
    /// Cooldown поведенческого прыжка
    pub jump: f32,
    /// Cooldown стрейфа
    pub strafe: f32,
    /// Накопленное время без прогресса к цели
    pub timeout: f32,
    /// Позиция, от которой меряем прогресс
    pub timeout_anchor: Vec3,
    /// Активная charge фаза; None — не заряжаемся
    pub charge: Option<ChargeCountdown>,
}

impl Default for BotTimers {
    fn default() -> Self {
        Self {
            jump: 0.0,
            strafe: 0.0,
            timeout: 0.0,
            timeout_anchor: Vec3::ZERO,
            charge: None,
        }
    }
}

/// Случайная wander точка вокруг позиции
fn new_wander_state(
    tuning: &BotTuning,
    rng: &mut rand_chacha::ChaCha8Rng,
    position: Vec3,
) -> BotState {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let distance = roll_window(rng, tuning.wander_radius * 0.3, tuning.wander_radius);
    BotState::Wander {
        destination: position + Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance),
        retarget_timer: tuning.wander_retarget_interval,
    }
}

/// Система: переходы FSM (одна лестница приоритетов за тик)
///
/// Recovery-бот лестницу не крутит — его телом владеет stuck recovery.
#[allow(clippy::too_many_arguments, clippy::type_complexity)]
pub fn bot_fsm_transitions(
    time: Res<Time<Fixed>>,
    tuning: Res<BotTuning>,
    geometry: Res<WorldGeometry>,
    mut rng: ResMut<DeterministicRng>,
    mut bots: Query<(
        Entity,
        &Transform,
        &Actor,
        &Health,
        &Personality,
        &TargetCaches,
        &StuckTracker,
        Option<&CombatCapability>,
        Option<&RailRider>,
        &mut BotState,
        &mut BotTimers,
    )>,
    actors: Query<(&Transform, &Health), With<Actor>>,
    pickups: Query<&Transform, With<WeaponPickup>>,
    orbs: Query<(&Transform, &EnergyOrb)>,
    rails: Query<(&Transform, &RailSegment)>,
) {
    let delta = time.delta_secs();
    let world = geometry.0.as_ref();

    for (
        entity,
        transform,
        actor,
        health,
        personality,
        caches,
        stuck,
        capability,
        rail_rider,
        mut state,
        mut timers,
    ) in bots.iter_mut()
    {
        if !health.is_alive() || stuck.in_recovery() {
            continue;
        }

        let position = transform.translation;

        // Commitment состояния тикают свой таймер и не переоцениваются
        match &mut *state {
            BotState::Retreat { timer, .. } if *timer > 0.0 => {
                *timer -= delta;
                continue;
            }
            BotState::Grind { timer, .. } => {
                *timer -= delta;
                if *timer > 0.0 {
                    continue;
                }
            }
            _ => {}
        }

        // Текущая цель переживает переоценку, если всё ещё валидна
        let candidate = state
            .combat_target()
            .filter(|&t| actors.get(t).map_or(false, |(_, h)| h.is_alive()))
            .or_else(|| {
                select_combat_target(
                    &tuning,
                    world,
                    entity,
                    position,
                    health,
                    personality,
                    capability,
                    caches.enemies.iter().filter_map(|&e| {
                        actors.get(e).ok().map(|(t, h)| (e, t.translation, *h))
                    }),
                )
            });

        let enemy_info = candidate.and_then(|e| {
            actors
                .get(e)
                .ok()
                .map(|(t, h)| (e, t.translation, position.distance(t.translation), h))
        });

        let threat_nearby = enemy_info
            .as_ref()
            .map_or(false, |(_, _, d, _)| *d <= tuning.threat_radius);

        let next = decide_next_state(
            &tuning,
            &mut rng.rng,
            world,
            entity,
            position,
            health,
            personality,
            capability,
            rail_rider.is_some(),
            actor.level,
            caches,
            &enemy_info,
            threat_nearby,
            &pickups,
            &orbs,
            &rails,
            &state,
            delta,
        );

        if let Some(next) = next {
            let changed = std::mem::discriminant(&next) != std::mem::discriminant(&*state);
            if changed {
                log(&format!(
                    "bot {:?}: {} -> {}",
                    entity,
                    state.name(),
                    next.name()
                ));
                // Финализация charge + сброс timeout якоря при смене состояния
                timers.charge = None;
                timers.timeout = 0.0;
                timers.timeout_anchor = position;
            }
            *state = next;
        }
    }
}

/// Лестница приоритетов: следующий шаг FSM
///
/// None — остаёмся в текущем состоянии без замены payload.
#[allow(clippy::too_many_arguments)]
fn decide_next_state(
    tuning: &BotTuning,
    rng: &mut rand_chacha::ChaCha8Rng,
    world: &dyn crate::ai::perception::RayWorld,
    entity: Entity,
    position: Vec3,
    health: &Health,
    personality: &Personality,
    capability: Option<&CombatCapability>,
    rail_capable: bool,
    level: u32,
    caches: &TargetCaches,
    enemy_info: &Option<(Entity, Vec3, f32, &Health)>,
    threat_nearby: bool,
    pickups: &Query<&Transform, With<WeaponPickup>>,
    orbs: &Query<(&Transform, &EnergyOrb)>,
    rails: &Query<(&Transform, &RailSegment)>,
    current: &BotState,
    delta: f32,
) -> Option<BotState> {
    let armed = capability.is_some();

    // 1. Retreat — высший приоритет
    if let Some((enemy, _, distance, enemy_health)) = enemy_info {
        if crate::ai::combat_eval::should_retreat(
            tuning,
            personality,
            health,
            armed,
            *distance,
            enemy_health,
        ) {
            return Some(BotState::Retreat {
                from: Some(*enemy),
                timer: roll_window(rng, tuning.retreat_duration_min, tuning.retreat_duration_max),
            });
        }
    }

    // 2. Безоружный бот ищет оружие (если рядом нет срочной угрозы)
    if !armed && !threat_nearby {
        let candidates = caches
            .pickups
            .iter()
            .filter_map(|&e| pickups.get(e).ok().map(|t| (e, t.translation)));
        if let Some(pickup) = nearest_reachable(tuning, world, entity, position, candidates) {
            return Some(BotState::CollectAbility { pickup });
        }
    }

    // 3. Attack: вооружён и цель в пределах attack дистанции
    if let Some((enemy, _, distance, _)) = enemy_info {
        if armed {
            let optimal = capability
                .map(|c| c.optimal_range)
                .unwrap_or(tuning.default_combat_range);
            if *distance <= optimal * tuning.attack_range_factor {
                return Some(BotState::Attack { target: *enemy });
            }
        }
    }

    // 4. Сбор орбов: не максимальный уровень, орб достижим, угрозы нет
    if level < tuning.max_level && !threat_nearby {
        let candidates = caches.orbs.iter().filter_map(|&e| {
            orbs.get(e).ok().and_then(|(t, orb)| {
                let p = t.translation;
                (!orb.collected && position.distance(p) <= tuning.orb_search_radius)
                    .then_some((e, p))
            })
        });
        if let Some(orb) = nearest_reachable(tuning, world, entity, position, candidates) {
            return Some(BotState::CollectOrb { orb });
        }
    }

    // 5. Chase
    if let Some((enemy, _, distance, enemy_health)) = enemy_info {
        if crate::ai::combat_eval::should_chase(
            tuning,
            personality,
            health,
            armed,
            *distance,
            enemy_health,
        ) {
            return Some(BotState::Chase { target: *enemy });
        }
    }

    // 6. Wander (+ опциональный вход в Grind рядом с рельсой)
    match current {
        BotState::Wander {
            destination,
            retarget_timer,
        } => {
            if rail_capable {
                let near_rail = rails
                    .iter()
                    .find(|(t, _)| position.distance(t.translation) <= tuning.rail_attach_radius);
                if let Some((_, segment)) = near_rail {
                    if rng.gen_bool(tuning.grind_probability as f64) {
                        return Some(BotState::Grind {
                            timer: tuning.grind_duration,
                            direction: segment.direction.normalize_or_zero(),
                        });
                    }
                }
            }

            let remaining = retarget_timer - delta;
            if remaining <= 0.0 || position.distance(*destination) <= tuning.arrive_radius {
                Some(new_wander_state(tuning, rng, position))
            } else {
                Some(BotState::Wander {
                    destination: *destination,
                    retarget_timer: remaining,
                })
            }
        }
        _ => Some(new_wander_state(tuning, rng, position)),
    }
}

/// Система: поведение внутри текущего состояния
///
/// Пишет ТОЛЬКО MoveIntent + боевые события: движение исполняет
/// locomotion, тело здесь не трогаем. Сюда же — target timeout,
/// charge countdown и рандомные прыжки/стрейфы.
#[allow(clippy::too_many_arguments, clippy::type_complexity)]
pub fn bot_state_behavior(
    time: Res<Time<Fixed>>,
    tuning: Res<BotTuning>,
    mut rng: ResMut<DeterministicRng>,
    mut bots: Query<(
        Entity,
        &Transform,
        &Body,
        &Health,
        &Personality,
        &StuckTracker,
        &mut BotState,
        &mut BotTimers,
        &mut MoveIntent,
        Option<&mut CombatCapability>,
    )>,
    targets: Query<(&Transform, &Health, &Body), With<Actor>>,
    item_positions: Query<&Transform>,
    mut fired: EventWriter<AbilityFired>,
) {
    let delta = time.delta_secs();

    for (
        entity,
        transform,
        body,
        health,
        personality,
        stuck,
        mut state,
        mut timers,
        mut intent,
        mut capability,
    ) in bots.iter_mut()
    {
        intent.clear();
        if !health.is_alive() || stuck.in_recovery() {
            continue;
        }

        let position = transform.translation;
        timers.jump = (timers.jump - delta).max(0.0);
        timers.strafe = (timers.strafe - delta).max(0.0);

        // Target timeout: преследующие состояния без прогресса сдаются
        let pursuing = matches!(
            *state,
            BotState::Chase { .. } | BotState::CollectAbility { .. } | BotState::CollectOrb { .. }
        );
        if pursuing {
            if position.distance(timers.timeout_anchor) >= tuning.target_timeout_min_displacement {
                timers.timeout_anchor = position;
                timers.timeout = 0.0;
            } else {
                timers.timeout += delta;
                if timers.timeout >= tuning.target_timeout {
                    log(&format!(
                        "bot {:?}: {} timed out, falling back to WANDER",
                        entity,
                        state.name()
                    ));
                    *state = new_wander_state(&tuning, &mut rng.rng, position);
                    timers.charge = None;
                    timers.timeout = 0.0;
                    timers.timeout_anchor = position;
                    continue;
                }
            }
        }

        match state.clone() {
            BotState::Wander { destination, .. } => {
                intent.destination = Some(destination);
                intent.face = Some(destination);
                roll_jump(&tuning, &mut rng, &mut timers, &mut intent);
            }

            BotState::Chase { target } => {
                let Ok((target_transform, _, _)) = targets.get(target) else {
                    *state = new_wander_state(&tuning, &mut rng.rng, position);
                    timers.charge = None;
                    continue;
                };
                let target_pos = target_transform.translation;
                intent.destination = Some(target_pos);
                intent.face = Some(target_pos);
                roll_jump(&tuning, &mut rng, &mut timers, &mut intent);
                roll_strafe(&tuning, &mut rng, &mut timers, &mut intent);
                // Рывок к цели; cooldown сторожит сам SpecialMove
                if rng
                    .rng
                    .gen_bool(((tuning.chase_dash_probability * delta).min(1.0)) as f64)
                {
                    intent.want_dash = true;
                }
            }

            BotState::Attack { target } => {
                let Ok((target_transform, target_health, target_body)) = targets.get(target)
                else {
                    *state = new_wander_state(&tuning, &mut rng.rng, position);
                    timers.charge = None;
                    continue;
                };
                let target_pos = target_transform.translation;
                let distance = position.distance(target_pos);
                let optimal = capability
                    .as_deref()
                    .map(|c| c.optimal_range)
                    .unwrap_or(tuning.default_combat_range);

                // Держим optimal range: подходим / отходим / стоим и джукаем
                if distance > optimal {
                    intent.destination = Some(target_pos);
                } else if distance < optimal * tuning.attack_backoff_fraction {
                    let away = (position - target_pos).normalize_or_zero();
                    intent.destination = Some(target_pos + away * optimal);
                }

                let aim_point = crate::ai::combat_eval::lead_prediction(
                    &tuning,
                    personality,
                    position,
                    target_pos,
                    target_body.velocity,
                );
                intent.face = Some(aim_point);
                roll_strafe(&tuning, &mut rng, &mut timers, &mut intent);

                if let Some(capability) = capability.as_deref_mut() {
                    run_attack_ability(
                        &tuning,
                        &mut rng.rng,
                        entity,
                        position,
                        health,
                        personality,
                        capability,
                        target,
                        target_health,
                        distance,
                        aim_point,
                        body.facing(),
                        &mut timers,
                        &mut fired,
                        delta,
                    );
                }
            }

            BotState::Retreat { from, .. } => {
                let away = from
                    .and_then(|e| targets.get(e).ok())
                    .map(|(t, _, _)| (position - t.translation).normalize_or_zero())
                    .filter(|v| *v != Vec3::ZERO)
                    .unwrap_or(Vec3::X);
                let flee_point = position + away * tuning.wander_radius;
                intent.destination = Some(flee_point);
                intent.face = Some(flee_point);
                roll_jump(&tuning, &mut rng, &mut timers, &mut intent);
            }

            BotState::CollectAbility { pickup } => {
                let Ok(pickup_transform) = item_positions.get(pickup) else {
                    *state = new_wander_state(&tuning, &mut rng.rng, position);
                    continue;
                };
                intent.destination = Some(pickup_transform.translation);
                intent.face = Some(pickup_transform.translation);
                roll_jump(&tuning, &mut rng, &mut timers, &mut intent);
            }

            BotState::CollectOrb { orb } => {
                let Ok(orb_transform) = item_positions.get(orb) else {
                    *state = new_wander_state(&tuning, &mut rng.rng, position);
                    continue;
                };
                intent.destination = Some(orb_transform.translation);
                intent.face = Some(orb_transform.translation);
                roll_jump(&tuning, &mut rng, &mut timers, &mut intent);
            }

            BotState::Grind { direction, .. } => {
                let ahead = position + direction * tuning.rail_attach_radius * 2.0;
                intent.destination = Some(ahead);
                intent.face = Some(ahead);
                intent.speed_override = Some(tuning.grind_speed);
            }
        }
    }
}

/// Поведенческий прыжок (cooldown + вероятность за тик)
fn roll_jump(
    tuning: &BotTuning,
    rng: &mut DeterministicRng,
    timers: &mut BotTimers,
    intent: &mut MoveIntent,
) {
    if timers.jump <= 0.0 && rng.rng.gen_bool(tuning.jump_probability as f64) {
        intent.want_jump = true;
        timers.jump = tuning.jump_cooldown;
    }
}

/// Боевой стрейф (случайное направление)
fn roll_strafe(
    tuning: &BotTuning,
    rng: &mut DeterministicRng,
    timers: &mut BotTimers,
    intent: &mut MoveIntent,
) {
    if timers.strafe <= 0.0 && rng.rng.gen_bool(tuning.strafe_probability as f64) {
        intent.strafe = if rng.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        timers.strafe = tuning.strafe_cooldown;
    }
}

/// Использование способности в ATTACK: charge countdown / выстрел
///
/// Ranged выстрел обязан пройти aim alignment; незавершённый разворот
/// откладывает выстрел, истёкший charge без выравнивания — сбрасывается.
#[allow(clippy::too_many_arguments)]
fn run_attack_ability(
    tuning: &BotTuning,
    rng: &mut rand_chacha::ChaCha8Rng,
    entity: Entity,
    position: Vec3,
    health: &Health,
    personality: &Personality,
    capability: &mut CombatCapability,
    target: Entity,
    target_health: &Health,
    distance: f32,
    aim_point: Vec3,
    facing: Vec3,
    timers: &mut BotTimers,
    fired: &mut EventWriter<AbilityFired>,
    delta: f32,
) {
    // Разворот исполняет locomotion по intent.face; здесь только сверяем
    let aligned = crate::ai::combat_eval::aim_aligned(tuning, facing, position, aim_point);

    if let Some(charge) = timers.charge.as_mut() {
        charge.remaining -= delta;
        if charge.remaining <= 0.0 {
            let charged_target = charge.target;
            timers.charge = None;
            if aligned && charged_target == target {
                fired.write(AbilityFired {
                    shooter: entity,
                    target: Some(target),
                    aim_point,
                    charged: true,
                });
                capability.trigger();
            }
            // Не выровнены или цель сменилась — заряд пропадает
        }
        return;
    }

    let aggression =
        crate::ai::combat_eval::current_aggression(tuning, personality, health, Some(target_health));
    let decision = crate::ai::combat_eval::ability_usage_decision(
        tuning,
        rng,
        personality,
        capability,
        distance,
        aggression,
    );

    if !decision.fire {
        return;
    }

    if decision.start_charge {
        let max_duration = capability
            .charge
            .as_ref()
            .map(|c| c.max_duration)
            .unwrap_or(tuning.charge_min_duration);
        let duration = roll_window(rng, tuning.charge_min_duration, max_duration);
        timers.charge = Some(ChargeCountdown {
            remaining: duration,
            target,
        });
    } else if aligned {
        fired.write(AbilityFired {
            shooter: entity,
            target: Some(target),
            aim_point,
            charged: false,
        });
        capability.trigger();
    }
}
