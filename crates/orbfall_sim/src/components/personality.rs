//! Personality бота — фиксированные на спавне черты характера
//!
//! Все поля тянутся ОДИН раз из seeded RNG при спавне и держатся в границах
//! генерации всю жизнь агента. Respawn их не трогает (опционально reroll
//! через BotTuning::reroll_personality_on_respawn).

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Стратегическое предпочтение бота (влияет на выбор целей и способностей)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub enum StrategicPreference {
    /// Лезет в ближний бой, бонус к близким целям
    Aggressive,
    /// Держит дистанцию, бонус к средним дистанциям, раньше отступает
    Defensive,
    /// Добивает слабых — бонус к целям с низким HP
    Support,
    /// Без перекосов
    Balanced,
}

/// Личность бота (константна в пределах жизни)
#[derive(Component, Debug, Clone, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct Personality {
    /// Базовая агрессия (0.3..0.9)
    pub aggression: f32,
    /// Осторожность (0.2..0.8) — режет агрессию, двигает retreat пороги
    pub caution: f32,
    /// Общий скилл (0.3..1.0) — ability proficiency, lead prediction
    pub skill: f32,
    /// Точность прицеливания (0.5..1.0) — масштаб lead проекции
    pub aim_accuracy: f32,
    /// Множитель скорости поворота (0.6..1.4)
    pub turn_speed_factor: f32,
    /// Стратегическое предпочтение
    pub preference: StrategicPreference,
}

impl Default for Personality {
    fn default() -> Self {
        // Середины диапазонов генерации — для тестов и ручного спавна
        Self {
            aggression: 0.6,
            caution: 0.5,
            skill: 0.65,
            aim_accuracy: 0.75,
            turn_speed_factor: 1.0,
            preference: StrategicPreference::Balanced,
        }
    }
}

impl Personality {
    /// Сгенерировать личность из seeded RNG (вызывается на спавне)
    pub fn generate(rng: &mut ChaCha8Rng) -> Self {
        let preference = match rng.gen_range(0..4u8) {
            0 => StrategicPreference::Aggressive,
            1 => StrategicPreference::Defensive,
            2 => StrategicPreference::Support,
            _ => StrategicPreference::Balanced,
        };

        Self {
            aggression: rng.gen_range(0.3..0.9),
            caution: rng.gen_range(0.2..0.8),
            skill: rng.gen_range(0.3..1.0),
            aim_accuracy: rng.gen_range(0.5..1.0),
            turn_speed_factor: rng.gen_range(0.6..1.4),
            preference,
        }
    }
}
