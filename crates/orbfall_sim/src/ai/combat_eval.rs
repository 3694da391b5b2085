//! Combat Evaluator — retreat/chase решения, использование способностей,
//! lead prediction
//!
//! Чистые функции над tuning + personality + снапшотом боевой ситуации;
//! FSM и state behavior вызывают их каждый тик. Вся случайность — через
//! переданный seeded RNG.

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::combat::CombatCapability;
use crate::components::{Health, Personality, StrategicPreference};
use crate::config::BotTuning;

/// Текущая эффективная агрессия бота
///
/// База из personality, резко режется на низком HP, умеренно — на среднем;
/// сдвигается перевесом по HP относительно цели; финально скейлится
/// осторожностью. Кламп в ограниченный диапазон.
pub fn current_aggression(
    tuning: &BotTuning,
    personality: &Personality,
    my_health: &Health,
    target_health: Option<&Health>,
) -> f32 {
    let mut aggression = personality.aggression;
    let hp = my_health.current as f32;

    if hp <= tuning.low_health_floor {
        aggression *= 0.3;
    } else if hp <= tuning.mid_health_floor {
        aggression *= 0.7;
    }

    if let Some(target) = target_health {
        let diff = hp - target.current as f32;
        if diff > tuning.health_margin {
            aggression += 0.15;
        } else if diff < -tuning.health_margin {
            aggression -= 0.15;
        }
    }

    aggression *= 1.0 - personality.caution * 0.3;
    aggression.clamp(0.05, 1.0)
}

/// Нужно ли отступать
///
/// Истина если:
/// - HP на/ниже критического абсолютного пола И цель в широком радиусе
///   опасности (defensive preference поднимает пол);
/// - ИЛИ HP ниже caution-масштабированного пола И у цели перевес по HP,
///   в узком радиусе давления;
/// - ИЛИ бот безоружен и цель в расширенном радиусе.
pub fn should_retreat(
    tuning: &BotTuning,
    personality: &Personality,
    my_health: &Health,
    armed: bool,
    target_distance: f32,
    target_health: &Health,
) -> bool {
    let hp = my_health.current as f32;

    let mut critical = tuning.retreat_critical_health;
    if personality.preference == StrategicPreference::Defensive {
        critical += tuning.defensive_retreat_bonus;
    }
    if hp <= critical && target_distance <= tuning.retreat_danger_radius {
        return true;
    }

    let caution_floor = tuning.retreat_caution_health * personality.caution;
    if hp <= caution_floor
        && target_health.current as f32 > hp
        && target_distance <= tuning.retreat_pressure_radius
    {
        return true;
    }

    if !armed && target_distance <= tuning.unarmed_retreat_radius {
        return true;
    }

    false
}

/// Нужно ли преследовать
///
/// Только вооружённым. Цель слаба при здоровом боте (расширенный радиус),
/// либо aggressive preference (расширенный радиус), либо цель в базовом
/// aggro радиусе.
pub fn should_chase(
    tuning: &BotTuning,
    personality: &Personality,
    my_health: &Health,
    armed: bool,
    target_distance: f32,
    target_health: &Health,
) -> bool {
    if !armed {
        return false;
    }

    let extended = tuning.aggro_range * tuning.extended_range_factor;
    let target_weak = target_health.fraction() < tuning.weak_health_fraction;
    let me_healthy = my_health.fraction() > tuning.healthy_health_fraction;

    (target_weak && me_healthy && target_distance <= extended)
        || (personality.preference == StrategicPreference::Aggressive
            && target_distance <= extended)
        || target_distance <= tuning.aggro_range
}

/// Решение об использовании способности
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilityDecision {
    /// Использовать в этот тик
    pub fire: bool,
    /// Начать charge фазу вместо мгновенного использования
    pub start_charge: bool,
}

impl AbilityDecision {
    pub const HOLD: Self = Self {
        fire: false,
        start_charge: false,
    };
}

/// Proficiency способности на данной дистанции
///
/// base score − 2×|distance − optimal|, умноженный на skill (0.7..1.2)
/// и preference множитель для "своей" полосы дальности.
pub fn ability_proficiency(
    tuning: &BotTuning,
    personality: &Personality,
    capability: &CombatCapability,
    distance: f32,
) -> f32 {
    let raw = capability.base_score - 2.0 * (distance - capability.optimal_range).abs();
    let skill_multiplier = 0.7 + personality.skill * 0.5; // 0.7..1.2

    let preference_multiplier = match personality.preference {
        StrategicPreference::Aggressive if capability.optimal_range <= tuning.short_range_band => {
            1.2
        }
        StrategicPreference::Defensive if capability.optimal_range >= tuning.long_range_band => 1.2,
        StrategicPreference::Support
            if capability.optimal_range > tuning.short_range_band
                && capability.optimal_range < tuning.long_range_band =>
        {
            1.15
        }
        _ => 1.0,
    };

    raw * skill_multiplier * preference_multiplier
}

/// Решение: стрелять / заряжать / держать
///
/// Вероятность = proficiency/100, смешанная с текущей агрессией.
/// Ниже минимального proficiency пола — никогда не стреляем.
/// Charge опционален: только если способность поддерживает, цель
/// достаточно далеко и сработала своя вероятность.
pub fn ability_usage_decision(
    tuning: &BotTuning,
    rng: &mut ChaCha8Rng,
    personality: &Personality,
    capability: &CombatCapability,
    distance: f32,
    aggression: f32,
) -> AbilityDecision {
    if !capability.is_ready() {
        return AbilityDecision::HOLD;
    }

    let proficiency = ability_proficiency(tuning, personality, capability, distance);
    if proficiency < tuning.min_proficiency {
        return AbilityDecision::HOLD;
    }

    let probability = ((proficiency / 100.0) * 0.6 + aggression * 0.4).clamp(0.05, 0.95);
    if !rng.gen_bool(probability as f64) {
        return AbilityDecision::HOLD;
    }

    let start_charge = capability.supports_charge()
        && distance >= tuning.charge_min_distance
        && rng.gen_bool(tuning.charge_probability as f64);

    AbilityDecision {
        fire: true,
        start_charge,
    }
}

/// Lead prediction: точка прицеливания по движущейся цели
///
/// Медленная цель ИЛИ skill ниже порога компетентности → текущая позиция.
/// Иначе — проекция вперёд на время подлёта (distance / projectile speed),
/// масштабированная aim_accuracy.
pub fn lead_prediction(
    tuning: &BotTuning,
    personality: &Personality,
    my_position: Vec3,
    target_position: Vec3,
    target_velocity: Vec3,
) -> Vec3 {
    if target_velocity.length() < tuning.lead_speed_threshold
        || personality.skill < tuning.skill_lead_threshold
    {
        return target_position;
    }

    let time_to_impact = my_position.distance(target_position) / tuning.assumed_projectile_speed;
    target_position + target_velocity * time_to_impact * personality.aim_accuracy
}

/// Выровнен ли взгляд на точку прицеливания
///
/// Ranged атака обязана пройти эту проверку — защита от выстрелов "в бок"
/// до завершения поворота.
pub fn aim_aligned(tuning: &BotTuning, facing: Vec3, my_position: Vec3, aim_point: Vec3) -> bool {
    let to_aim = Vec3::new(aim_point.x - my_position.x, 0.0, aim_point.z - my_position.z);
    let flat = to_aim.normalize_or_zero();
    if flat == Vec3::ZERO {
        return true;
    }
    facing.dot(flat).clamp(-1.0, 1.0).acos() <= tuning.aim_alignment_tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> BotTuning {
        BotTuning::default()
    }

    #[test]
    fn test_retreat_on_critical_health() {
        // Сценарий: HP=2, враг на дистанции 5 при aggro range 40
        let t = tuning();
        let p = Personality::default();
        let me = Health {
            current: 2,
            max: 100,
        };
        let enemy = Health::new(100);
        assert!(should_retreat(&t, &p, &me, true, 5.0, &enemy));
    }

    #[test]
    fn test_no_retreat_when_healthy_and_armed() {
        let t = tuning();
        let mut p = Personality::default();
        p.caution = 0.2; // caution floor = 5 HP
        let me = Health::new(100);
        let enemy = Health::new(100);
        assert!(!should_retreat(&t, &p, &me, true, 5.0, &enemy));
    }

    #[test]
    fn test_unarmed_retreats_in_extended_radius() {
        let t = tuning();
        let p = Personality::default();
        let me = Health::new(100);
        let enemy = Health::new(100);
        assert!(should_retreat(&t, &p, &me, false, 40.0, &enemy));
        assert!(!should_retreat(&t, &p, &me, false, 60.0, &enemy));
    }

    #[test]
    fn test_defensive_retreats_earlier() {
        let t = tuning();
        let mut p = Personality::default();
        p.caution = 0.0; // отключаем caution ветку
        let me = Health {
            current: 6,
            max: 100,
        };
        let enemy = Health::new(100);

        // 6 HP выше базового пола 3, но ниже defensive пола 3+5
        assert!(!should_retreat(&t, &p, &me, true, 10.0, &enemy));
        p.preference = StrategicPreference::Defensive;
        assert!(should_retreat(&t, &p, &me, true, 10.0, &enemy));
    }

    #[test]
    fn test_chase_requires_weapon() {
        let t = tuning();
        let p = Personality::default();
        let me = Health::new(100);
        let enemy = Health::new(100);
        assert!(!should_chase(&t, &p, &me, false, 10.0, &enemy));
        assert!(should_chase(&t, &p, &me, true, 10.0, &enemy));
    }

    #[test]
    fn test_chase_weak_target_extended_range() {
        let t = tuning();
        let p = Personality::default();
        let me = Health::new(100);
        let weak = Health {
            current: 20,
            max: 100,
        };
        let strong = Health::new(100);

        // 50 за пределами aggro 40, но в extended 60
        assert!(should_chase(&t, &p, &me, true, 50.0, &weak));
        assert!(!should_chase(&t, &p, &me, true, 50.0, &strong));
    }

    #[test]
    fn test_aggression_cut_at_low_health() {
        let t = tuning();
        let p = Personality::default();
        let healthy = Health::new(100);
        let hurt = Health {
            current: 10,
            max: 100,
        };

        let high = current_aggression(&t, &p, &healthy, None);
        let low = current_aggression(&t, &p, &hurt, None);
        assert!(low < high);
        assert!(low >= 0.05 && high <= 1.0);
    }

    #[test]
    fn test_lead_prediction_skill_gate() {
        // Сценарий: skill=0.5 ниже порога 0.65 — целимся в текущую позицию
        let t = tuning();
        let mut p = Personality::default();
        p.skill = 0.5;

        let target_pos = Vec3::new(20.0, 0.0, 0.0);
        let target_vel = Vec3::new(0.0, 0.0, 6.0);
        let aim = lead_prediction(&t, &p, Vec3::ZERO, target_pos, target_vel);
        assert_eq!(aim, target_pos);

        // Скилловый бот проецирует вперёд
        p.skill = 0.9;
        let aim = lead_prediction(&t, &p, Vec3::ZERO, target_pos, target_vel);
        assert!(aim.z > target_pos.z);
    }

    #[test]
    fn test_lead_prediction_slow_target() {
        let t = tuning();
        let mut p = Personality::default();
        p.skill = 1.0;

        let target_pos = Vec3::new(20.0, 0.0, 0.0);
        let crawl = Vec3::new(0.0, 0.0, 0.1); // ниже speed threshold
        assert_eq!(
            lead_prediction(&t, &p, Vec3::ZERO, target_pos, crawl),
            target_pos
        );
    }

    #[test]
    fn test_proficiency_floor_blocks_usage() {
        use rand::SeedableRng;
        let t = tuning();
        let p = Personality::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        // optimal 10, дистанция 60 → raw = 80 - 100 < 0 → ниже пола
        let cap = CombatCapability::new("blaster", 0.5, 10.0, 80.0);
        for _ in 0..50 {
            let d = ability_usage_decision(&t, &mut rng, &p, &cap, 60.0, 0.9);
            assert!(!d.fire);
        }
    }

    #[test]
    fn test_aim_alignment() {
        let t = tuning();
        let facing = Vec3::X;
        // Цель прямо по курсу
        assert!(aim_aligned(&t, facing, Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)));
        // Цель сбоку — не выровнены
        assert!(!aim_aligned(&t, facing, Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0)));
    }
}
