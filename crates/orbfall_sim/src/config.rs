//! Tuning параметры bot AI
//!
//! ВСЕ playtest-настраиваемые константы (радиусы, пороги, вероятности,
//! cooldowns) живут здесь как именованные поля — логика систем их никогда
//! не инлайнит. Перенастройка без правки поведения.
//!
//! Serde Deserialize — чтобы host мог грузить tuning из файла.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Глобальный tuning bot AI (resource, один на симуляцию)
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct BotTuning {
    // --- Perception ---
    /// Высота "глаз" над ногами для line-of-sight запросов (метры)
    pub eye_height: f32,
    /// Допуск LOS: hit на/за target точкой считается видимостью (метры)
    pub los_tolerance: f32,
    /// Перепад высоты впереди, считающийся опасным обрывом (метры)
    pub edge_drop_threshold: f32,
    /// Прирост lookahead за каждый m/s горизонтальной скорости
    pub edge_speed_lookahead_scale: f32,
    /// Глубина ground-probe лучей вниз (метры)
    pub edge_probe_depth: f32,
    /// Дистанция obstacle probe лучей вперёд (метры)
    pub obstacle_probe_distance: f32,
    /// Разброс дистанций хитов между высотами, после которого
    /// препятствие — наклонная поверхность (метры)
    pub slope_spread: f32,
    /// Диапазон высот препятствия, через которое бот может перепрыгнуть
    pub jumpable_min_height: f32,
    pub jumpable_max_height: f32,
    /// Clearance вверх, ниже которого бот считается зажатым под геометрией
    pub wedge_clearance: f32,

    // --- Target selection ---
    /// Интервал обновления кэшей кандидатов (секунды, throttled)
    pub cache_refresh_interval: f32,
    /// Невидимые pickup/orb всё равно берём в этом радиусе (метры)
    pub pickup_fallback_radius: f32,
    /// Окно вокруг optimal range, дающее бонус +40 к score (метры)
    pub optimal_range_window: f32,
    /// Optimal combat range безоружного бота (метры)
    pub default_combat_range: f32,
    /// Бонус за попадание цели в полосу strategic preference
    pub preference_bonus: f32,
    /// Ближняя полоса дистанций (aggressive боты)
    pub close_band: f32,
    /// Средняя полоса дистанций (defensive боты)
    pub mid_band: f32,
    /// Доля max HP, ниже которой цель считается слабой
    pub weak_health_fraction: f32,
    /// Доля max HP, выше которой бот считает себя здоровым
    pub healthy_health_fraction: f32,

    // --- Combat evaluator ---
    /// Aggro radius: дистанция преследования врага (метры)
    pub aggro_range: f32,
    /// Множитель optimal range для входа в ATTACK
    pub attack_range_factor: f32,
    /// Множитель aggro range для extended условий chase/retreat
    pub extended_range_factor: f32,
    /// Абсолютный критический порог HP для retreat
    pub retreat_critical_health: f32,
    /// Широкий радиус опасности при критическом HP (метры)
    pub retreat_danger_radius: f32,
    /// База caution-масштабируемого порога HP для retreat
    pub retreat_caution_health: f32,
    /// Узкий радиус давления при преимуществе врага по HP (метры)
    pub retreat_pressure_radius: f32,
    /// Радиус, в котором безоружный бот отступает от врага (метры)
    pub unarmed_retreat_radius: f32,
    /// Defensive preference поднимает критический порог на столько HP
    pub defensive_retreat_bonus: f32,
    /// HP, ниже которого агрессия режется сильно
    pub low_health_floor: f32,
    /// HP, ниже которого агрессия режется умеренно
    pub mid_health_floor: f32,
    /// Перевес по HP, меняющий агрессию вверх/вниз
    pub health_margin: f32,
    /// Proficiency ниже этого порога — способность не используется
    pub min_proficiency: f32,
    /// Skill, с которого бот умеет lead prediction
    pub skill_lead_threshold: f32,
    /// Предполагаемая скорость снаряда для time-to-impact (m/s)
    pub assumed_projectile_speed: f32,
    /// Скорость цели, ниже которой целимся в текущую позицию (m/s)
    pub lead_speed_threshold: f32,
    /// Угловой допуск выравнивания перед выстрелом (радианы)
    pub aim_alignment_tolerance: f32,
    /// Вероятность зарядки способности (если поддерживает charge)
    pub charge_probability: f32,
    /// Минимальная дистанция до цели для зарядки (метры)
    pub charge_min_distance: f32,
    /// Минимальная длительность charge окна (секунды)
    pub charge_min_duration: f32,
    /// Optimal range ниже — "ближняя" способность (aggressive бонус)
    pub short_range_band: f32,
    /// Optimal range выше — "дальняя" способность (defensive бонус)
    pub long_range_band: f32,

    // --- FSM ---
    /// Радиус случайных wander точек вокруг бота (метры)
    pub wander_radius: f32,
    /// Интервал смены wander точки (секунды)
    pub wander_retarget_interval: f32,
    /// Randomized длительность retreat (секунды)
    pub retreat_duration_min: f32,
    pub retreat_duration_max: f32,
    /// Target timeout: столько секунд без прогресса — бросаем цель
    pub target_timeout: f32,
    /// Прогрессом считается смещение больше этого (метры)
    pub target_timeout_min_displacement: f32,
    /// Радиус поиска орбов (метры)
    pub orb_search_radius: f32,
    /// Враг ближе — "срочная угроза", сбор предметов откладывается (метры)
    pub threat_radius: f32,
    /// Максимальный уровень бота (орбы дальше не нужны)
    pub max_level: u32,
    /// Cooldowns и вероятности поведенческих прыжков/стрейфов
    pub jump_cooldown: f32,
    pub strafe_cooldown: f32,
    pub jump_probability: f32,
    pub strafe_probability: f32,
    /// В ATTACK отходим назад, если ближе этой доли optimal range
    pub attack_backoff_fraction: f32,
    /// Интенсивность special move в погоне, в секунду (если способность есть)
    pub chase_dash_probability: f32,

    // --- Stuck detection & recovery ---
    /// Интервал проверки смещения (секунды)
    pub stuck_check_interval: f32,
    /// Смещение за интервал меньше этого — страйк (метры)
    pub stuck_move_threshold: f32,
    /// Горизонтальная скорость меньше этого подтверждает страйк (m/s)
    pub stuck_speed_threshold: f32,
    /// Столько подряд страйков — входим в recovery
    pub stuck_enter_strikes: u32,
    /// Столько подряд страйков — emergency teleport
    pub stuck_teleport_strikes: u32,
    /// Randomized длительность recovery окна (секунды)
    pub recovery_duration_min: f32,
    pub recovery_duration_max: f32,
    /// Сила escape force вдоль выбранного направления
    pub escape_force: f32,
    /// Множитель escape force, когда бот зажат под террейном
    pub wedged_force_multiplier: f32,
    /// Вспомогательная сила вниз при recovery
    pub recovery_down_force: f32,
    /// Вращательный импульс при recovery (rad/s за тик)
    pub recovery_spin: f32,
    /// Интенсивность прыжков recovery, вероятность в секунду (обычная / wedged)
    pub recovery_jump_probability: f32,
    pub recovery_wedged_jump_probability: f32,
    /// Период пере-рандомизации escape направления (секунды)
    pub recovery_redirect_interval: f32,
    /// Вероятность смены направления при срабатывании периода
    pub recovery_redirect_probability: f32,
    /// Интенсивность коротких реверс-импульсов recovery (в секунду)
    pub recovery_reverse_probability: f32,
    /// Интенсивность special move в recovery, в секунду (если способность есть)
    pub recovery_special_probability: f32,
    /// Вертикальный толчок, если нет spawn списка для телепорта (метры)
    pub teleport_nudge: f32,

    // --- Locomotion / физика headless интеграции ---
    /// Сила движения к destination
    pub move_force: f32,
    /// Максимальная горизонтальная скорость (m/s)
    pub max_speed: f32,
    /// Импульс прыжка (m/s вверх)
    pub jump_impulse: f32,
    /// Радиус прибытия к destination (метры)
    pub arrive_radius: f32,
    /// Боковой импульс стрейфа (m/s)
    pub strafe_impulse: f32,
    /// Базовая скорость поворота (rad/s, умножается на turn_speed_factor)
    pub turn_rate: f32,
    /// Гравитация headless интеграции (m/s², отрицательная)
    pub gravity: f32,
    /// Горизонтальное затухание скорости на земле (1/s)
    pub linear_damping: f32,
    /// Затухание угловой скорости (1/s)
    pub angular_damping: f32,

    // --- Arena / lifecycle ---
    /// Радиус подбора weapon pickup (метры)
    pub pickup_radius: f32,
    /// Радиус сбора орба (метры)
    pub orb_radius: f32,
    /// Радиус захвата рельсы для GRIND (метры)
    pub rail_attach_radius: f32,
    /// Длительность и скорость grind
    pub grind_duration: f32,
    pub grind_speed: f32,
    /// Вероятность зацепиться за рельсу при wander рядом с ней
    pub grind_probability: f32,
    /// HP после respawn
    pub respawn_health: u32,
    /// Перегенерировать personality при respawn (по умолчанию персистентна)
    pub reroll_personality_on_respawn: bool,
}

impl Default for BotTuning {
    fn default() -> Self {
        Self {
            // Perception
            eye_height: 1.5,
            los_tolerance: 0.5,
            edge_drop_threshold: 2.0,
            edge_speed_lookahead_scale: 0.15,
            edge_probe_depth: 6.0,
            obstacle_probe_distance: 2.5,
            slope_spread: 1.0,
            jumpable_min_height: 0.4,
            jumpable_max_height: 1.2,
            wedge_clearance: 1.1,

            // Target selection
            cache_refresh_interval: 0.5,
            pickup_fallback_radius: 15.0,
            optimal_range_window: 5.0,
            default_combat_range: 10.0,
            preference_bonus: 30.0,
            close_band: 15.0,
            mid_band: 35.0,
            weak_health_fraction: 0.4,
            healthy_health_fraction: 0.6,

            // Combat evaluator
            aggro_range: 40.0,
            attack_range_factor: 1.25,
            extended_range_factor: 1.5,
            retreat_critical_health: 3.0,
            retreat_danger_radius: 30.0,
            retreat_caution_health: 25.0,
            retreat_pressure_radius: 18.0,
            unarmed_retreat_radius: 45.0,
            defensive_retreat_bonus: 5.0,
            low_health_floor: 20.0,
            mid_health_floor: 50.0,
            health_margin: 15.0,
            min_proficiency: 25.0,
            skill_lead_threshold: 0.65,
            assumed_projectile_speed: 40.0,
            lead_speed_threshold: 0.5,
            aim_alignment_tolerance: 0.25,
            charge_probability: 0.4,
            charge_min_distance: 12.0,
            charge_min_duration: 0.3,
            short_range_band: 10.0,
            long_range_band: 20.0,

            // FSM
            wander_radius: 20.0,
            wander_retarget_interval: 4.0,
            retreat_duration_min: 2.0,
            retreat_duration_max: 4.0,
            target_timeout: 4.0,
            target_timeout_min_displacement: 1.5,
            orb_search_radius: 30.0,
            threat_radius: 12.0,
            max_level: 10,
            jump_cooldown: 1.2,
            strafe_cooldown: 0.8,
            jump_probability: 0.15,
            strafe_probability: 0.25,
            attack_backoff_fraction: 0.6,
            chase_dash_probability: 0.3,

            // Stuck detection & recovery
            stuck_check_interval: 0.3,
            stuck_move_threshold: 0.1,
            stuck_speed_threshold: 0.25,
            stuck_enter_strikes: 3,
            stuck_teleport_strikes: 10,
            recovery_duration_min: 0.8,
            recovery_duration_max: 1.5,
            escape_force: 30.0,
            wedged_force_multiplier: 1.6,
            recovery_down_force: 8.0,
            recovery_spin: 2.0,
            recovery_jump_probability: 0.25,
            recovery_wedged_jump_probability: 0.6,
            recovery_redirect_interval: 0.35,
            recovery_redirect_probability: 0.5,
            recovery_reverse_probability: 0.1,
            recovery_special_probability: 0.15,
            teleport_nudge: 2.0,

            // Locomotion
            move_force: 40.0,
            max_speed: 8.0,
            jump_impulse: 7.0,
            arrive_radius: 1.0,
            strafe_impulse: 4.0,
            turn_rate: 6.0,
            gravity: -24.0,
            linear_damping: 4.0,
            angular_damping: 6.0,

            // Arena
            pickup_radius: 1.5,
            orb_radius: 1.5,
            rail_attach_radius: 3.0,
            grind_duration: 2.5,
            grind_speed: 12.0,
            grind_probability: 0.3,
            respawn_health: 100,
            reroll_personality_on_respawn: false,
        }
    }
}
