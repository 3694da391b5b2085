//! Stuck Detection & Recovery — страйки, эскалация, emergency teleport
//!
//! Лестница эскалации:
//! 1. интервальная проверка смещения копит страйки;
//! 2. N страйков — randomized recovery окно (escape силы, прыжки, спин);
//! 3. много страйков подряд — emergency teleport на spawn точку.
//!
//! Wedge-проверка входит в recovery ПРОАКТИВНО, не дожидаясь страйков:
//! придавленный терраином бот не должен полсекунды "копить" очевидное.
//!
//! Пока recovery активен, FSM и locomotion бота отключены — телом
//! владеет только recovery.

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::ai::fsm::BotState;
use crate::ai::perception::{is_wedged_under_terrain, WorldGeometry};
use crate::arena::SpawnPoints;
use crate::components::{Body, Health, SpecialMove};
use crate::config::BotTuning;
use crate::{log, log_warning, DeterministicRng};

/// Event: бот аварийно телепортирован (host может показать эффект)
#[derive(Event, Debug, Clone)]
pub struct BotTeleported {
    pub bot: Entity,
    pub to: Vec3,
}

/// Активное recovery окно
#[derive(Debug, Clone, Reflect)]
pub struct RecoveryState {
    /// Осталось секунд recovery
    pub timer: f32,
    /// Текущее направление выталкивания (горизонтальный unit)
    pub escape_dir: Vec3,
    /// До следующей пере-рандомизации направления
    pub redirect_timer: f32,
    /// Бот зажат под геометрией (усиленный режим)
    pub wedged: bool,
}

/// Трекер застревания (per-bot)
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct StuckTracker {
    /// До следующей интервальной проверки
    pub check_timer: f32,
    /// Позиция на момент прошлой проверки
    pub last_position: Vec3,
    /// Подряд идущие страйки "не сдвинулся"
    pub strikes: u32,
    /// Первая проверка после spawn/respawn уже зафиксировала позицию
    pub primed: bool,
    /// Активное recovery окно; None — бот здоров
    pub recovery: Option<RecoveryState>,
}

impl StuckTracker {
    pub fn new(position: Vec3) -> Self {
        Self {
            check_timer: 0.0,
            last_position: position,
            strikes: 0,
            primed: false,
            recovery: None,
        }
    }

    pub fn in_recovery(&self) -> bool {
        self.recovery.is_some()
    }
}

impl Default for StuckTracker {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

/// Направление выталкивания при входе в recovery
///
/// База — назад от взгляда (упёрлись лицом). Wedged ботам подмешивается
/// случайный перпендикуляр: из-под плиты чаще выводит вбок, чем назад.
fn escape_direction(rng: &mut ChaCha8Rng, facing: Vec3, wedged: bool) -> Vec3 {
    let back = Vec3::new(-facing.x, 0.0, -facing.z).normalize_or_zero();
    let base = if back == Vec3::ZERO { Vec3::X } else { back };

    if wedged {
        let side = Vec3::new(-base.z, 0.0, base.x);
        let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        (base + side * sign * 0.9).normalize_or_zero()
    } else {
        base
    }
}

/// Случайное горизонтальное направление (redirect внутри recovery)
fn random_horizontal(rng: &mut ChaCha8Rng) -> Vec3 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    Vec3::new(angle.cos(), 0.0, angle.sin())
}

/// gen_range с защитой от вырожденного диапазона (host может выставить
/// min == max в конфиге)
pub(crate) fn roll_window(rng: &mut ChaCha8Rng, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

/// Система: интервальная детекция застревания + эскалация
#[allow(clippy::type_complexity)]
pub fn stuck_detection(
    time: Res<Time<Fixed>>,
    tuning: Res<BotTuning>,
    geometry: Res<WorldGeometry>,
    spawn_points: Res<SpawnPoints>,
    mut rng: ResMut<DeterministicRng>,
    mut bots: Query<(
        Entity,
        &mut Transform,
        &mut Body,
        &mut StuckTracker,
        &BotState,
        &Health,
    )>,
    mut teleported: EventWriter<BotTeleported>,
) {
    let delta = time.delta_secs();
    let world = geometry.0.as_ref();

    for (entity, mut transform, mut body, mut tracker, state, health) in bots.iter_mut() {
        if !health.is_alive() {
            continue;
        }

        let position = transform.translation;

        // Проактивный wedge вход
        if tracker.recovery.is_none()
            && is_wedged_under_terrain(world, &tuning, position, Some(entity))
        {
            let dir = escape_direction(&mut rng.rng, body.facing(), true);
            tracker.recovery = Some(RecoveryState {
                timer: roll_window(
                    &mut rng.rng,
                    tuning.recovery_duration_min,
                    tuning.recovery_duration_max,
                ),
                escape_dir: dir,
                redirect_timer: tuning.recovery_redirect_interval,
                wedged: true,
            });
            log(&format!("bot {:?}: wedged under terrain, recovery", entity));
        }

        tracker.check_timer -= delta;
        if tracker.check_timer > 0.0 {
            continue;
        }
        tracker.check_timer = tuning.stuck_check_interval;

        // Первая проверка после spawn только фиксирует позицию — нулевое
        // смещение свежего бота не страйк
        if !tracker.primed {
            tracker.primed = true;
            tracker.last_position = position;
            continue;
        }

        // Горизонтальное смещение: прыжки на месте прогрессом не считаются
        let moved = position - tracker.last_position;
        let displacement = Vec3::new(moved.x, 0.0, moved.z).length();
        tracker.last_position = position;

        if !state.expects_movement() || displacement >= tuning.stuck_move_threshold {
            tracker.strikes = 0;
            continue;
        }

        // Смещения нет; страйк подтверждаем низкой скоростью — бот
        // на месте И не разгоняется (вкопался, а не разворачивается)
        if body.horizontal_speed() < tuning.stuck_speed_threshold {
            tracker.strikes += 1;
        }

        if tracker.strikes >= tuning.stuck_teleport_strikes {
            // Emergency teleport: последняя ступень лестницы
            let destination = if spawn_points.0.is_empty() {
                position + Vec3::Y * tuning.teleport_nudge
            } else {
                spawn_points.0[rng.rng.gen_range(0..spawn_points.0.len())]
            };

            transform.translation = destination;
            body.velocity = Vec3::ZERO;
            body.angular_velocity = 0.0;
            body.force = Vec3::ZERO;
            body.impulse = Vec3::ZERO;
            tracker.strikes = 0;
            tracker.recovery = None;
            tracker.last_position = destination;

            teleported.write(BotTeleported {
                bot: entity,
                to: destination,
            });
            log_warning(&format!(
                "bot {:?}: stuck beyond recovery, teleported to {:?}",
                entity, destination
            ));
        } else if tracker.strikes >= tuning.stuck_enter_strikes && tracker.recovery.is_none() {
            let wedged = is_wedged_under_terrain(world, &tuning, position, Some(entity));
            let dir = escape_direction(&mut rng.rng, body.facing(), wedged);
            tracker.recovery = Some(RecoveryState {
                timer: roll_window(
                    &mut rng.rng,
                    tuning.recovery_duration_min,
                    tuning.recovery_duration_max,
                ),
                escape_dir: dir,
                redirect_timer: tuning.recovery_redirect_interval,
                wedged,
            });
            log(&format!(
                "bot {:?}: {} strikes, entering recovery",
                entity, tracker.strikes
            ));
        }
    }
}

/// Система: исполнение recovery окна
///
/// Randomized выталкивание: escape force (+down pressure), спин, шансовые
/// прыжки/реверсы/special move, периодический redirect направления.
/// По истечении окна застрявшие в погоне боты перенаправляются в WANDER —
/// чтобы не возвращаться лбом в ту же стену.
#[allow(clippy::type_complexity)]
pub fn stuck_recovery(
    time: Res<Time<Fixed>>,
    tuning: Res<BotTuning>,
    mut rng: ResMut<DeterministicRng>,
    mut bots: Query<(
        Entity,
        &Transform,
        &mut Body,
        &mut StuckTracker,
        &mut BotState,
        Option<&mut SpecialMove>,
        &Health,
    )>,
) {
    let delta = time.delta_secs();

    for (entity, transform, mut body, mut tracker, mut state, special, health) in bots.iter_mut() {
        if !health.is_alive() {
            continue;
        }
        let Some(rec) = tracker.recovery.as_mut() else {
            continue;
        };

        rec.timer -= delta;
        if rec.timer <= 0.0 {
            tracker.recovery = None;
            if matches!(*state, BotState::Chase { .. } | BotState::Attack { .. }) {
                // Погоня привела в тупик — новый случайный маршрут
                let angle = rng.rng.gen_range(0.0..std::f32::consts::TAU);
                let distance =
                    roll_window(&mut rng.rng, tuning.wander_radius * 0.3, tuning.wander_radius);
                *state = BotState::Wander {
                    destination: transform.translation
                        + Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance),
                    retarget_timer: tuning.wander_retarget_interval,
                };
            }
            log(&format!("bot {:?}: recovery complete", entity));
            continue;
        }

        let force_multiplier = if rec.wedged {
            tuning.wedged_force_multiplier
        } else {
            1.0
        };
        body.apply_force(rec.escape_dir * tuning.escape_force * force_multiplier);
        body.apply_force(Vec3::NEG_Y * tuning.recovery_down_force);
        body.angular_velocity += tuning.recovery_spin * delta;

        let jump_probability = if rec.wedged {
            tuning.recovery_wedged_jump_probability
        } else {
            tuning.recovery_jump_probability
        };
        if body.can_jump() && rng.rng.gen_bool((jump_probability * delta).min(1.0) as f64) {
            body.jump(tuning.jump_impulse);
        }

        if rng.rng.gen_bool((tuning.recovery_reverse_probability * delta).min(1.0) as f64) {
            let reverse = -rec.escape_dir * tuning.strafe_impulse;
            body.apply_impulse(reverse);
        }

        if let Some(mut special) = special {
            if special.is_ready()
                && rng
                    .rng
                    .gen_bool((tuning.recovery_special_probability * delta).min(1.0) as f64)
            {
                let dir = rec.escape_dir;
                special.trigger(&mut body, dir);
            }
        }

        rec.redirect_timer -= delta;
        if rec.redirect_timer <= 0.0 {
            rec.redirect_timer = tuning.recovery_redirect_interval;
            if rng.rng.gen_bool(tuning.recovery_redirect_probability as f64) {
                rec.escape_dir = random_horizontal(&mut rng.rng);
            }
        }
    }
}
