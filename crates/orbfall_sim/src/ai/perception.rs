//! Perception — синхронные геометрические запросы бота
//!
//! Все запросы идут через инжектированный [`RayWorld`] (World Query
//! Service): headless режим использует [`StaticWorld`], настоящий host
//! подставляет свой raycast backend. Контроллер никогда не владеет
//! геометрией напрямую.
//!
//! Результат "нет хита" — НЕ ошибка, это "путь свободен".

use bevy::prelude::*;

use crate::config::BotTuning;

/// Результат ray запроса
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Точка пересечения
    pub point: Vec3,
    /// Дистанция от origin до хита
    pub distance: f32,
}

/// World Query Service: ray-пересечение с solid-world геометрией
///
/// `exclude` — entity самого агента (его тело не участвует в запросе).
/// Реализации возвращают БЛИЖАЙШИЙ хит или None.
pub trait RayWorld {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: Option<Entity>,
    ) -> Option<RayHit>;
}

/// Resource-обёртка над инжектированной геометрией
#[derive(Resource)]
pub struct WorldGeometry(pub Box<dyn RayWorld + Send + Sync>);

impl WorldGeometry {
    /// Плоская арена без препятствий (default headless геометрия)
    pub fn flat() -> Self {
        Self(Box::new(StaticWorld {
            ground_y: 0.0,
            boxes: Vec::new(),
        }))
    }

    pub fn new(world: impl RayWorld + Send + Sync + 'static) -> Self {
        Self(Box::new(world))
    }
}

/// Высоты obstacle probe лучей (последняя — overhead)
const PROBE_HEIGHTS: [f32; 5] = [0.25, 0.7, 1.15, 1.6, 2.1];

/// Классификация препятствия перед ботом
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum ObstacleKind {
    None,
    /// Наклонная поверхность — можно заехать/запрыгнуть
    Slope,
    /// Низкая платформа/уступ
    Platform,
    /// Стена почти во всю высоту probe диапазона
    Wall,
    /// Наклонный потолок/crawlspace — прыгать НЕЛЬЗЯ (заклинит)
    OverheadSlope,
}

/// Отчёт classify_obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleReport {
    pub has_obstacle: bool,
    pub kind: ObstacleKind,
    /// Можно ли перепрыгнуть (никогда не true для OverheadSlope)
    pub can_jump: bool,
    /// Высота нижней кромки препятствия над ногами
    pub obstacle_height: f32,
}

impl ObstacleReport {
    pub fn clear() -> Self {
        Self {
            has_obstacle: false,
            kind: ObstacleKind::None,
            can_jump: false,
            obstacle_height: 0.0,
        }
    }
}

/// Line-of-sight от origin к target точке
///
/// Видимо, если хита нет вовсе ИЛИ хит лёг на/за target в пределах
/// допуска (геометрия вплотную к цели не блокирует).
pub fn has_line_of_sight(
    world: &dyn RayWorld,
    tuning: &BotTuning,
    origin: Vec3,
    target: Vec3,
    exclude: Option<Entity>,
) -> bool {
    let to_target = target - origin;
    let distance = to_target.length();
    if distance < 1e-4 {
        return true;
    }
    let direction = to_target / distance;

    match world.cast_ray(origin, direction, distance + tuning.los_tolerance, exclude) {
        None => true,
        Some(hit) => hit.distance >= distance - tuning.los_tolerance,
    }
}

/// Высота земли под точкой (луч вниз с небольшим запасом вверх)
fn ground_height(
    world: &dyn RayWorld,
    tuning: &BotTuning,
    point: Vec3,
    exclude: Option<Entity>,
) -> Option<f32> {
    world
        .cast_ray(
            point + Vec3::Y * 0.5,
            Vec3::NEG_Y,
            tuning.edge_probe_depth,
            exclude,
        )
        .map(|hit| hit.point.y)
}

/// Детекция обрыва впереди
///
/// Lookahead растёт со скоростью: быстрый бот обязан смотреть дальше.
/// Опасно, если земля впереди ниже текущей больше drop threshold или
/// впереди земли нет вовсе.
pub fn detect_edge(
    world: &dyn RayWorld,
    tuning: &BotTuning,
    position: Vec3,
    direction: Vec3,
    base_lookahead: f32,
    horizontal_speed: f32,
    exclude: Option<Entity>,
) -> bool {
    let lookahead = base_lookahead * (1.0 + horizontal_speed * tuning.edge_speed_lookahead_scale);
    let dir = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
    if dir == Vec3::ZERO {
        return false;
    }

    let Some(here) = ground_height(world, tuning, position, exclude) else {
        // Сами в воздухе — edge решает не perception, а падение
        return false;
    };

    match ground_height(world, tuning, position + dir * lookahead, exclude) {
        None => true, // впереди пустота
        Some(ahead) => here - ahead > tuning.edge_drop_threshold,
    }
}

/// Классификация препятствия: параллельные лучи на возрастающих высотах
///
/// Правила (по разбросу ДИСТАНЦИЙ хитов между высотами):
/// - большой разброс дистанций ⇒ наклонная поверхность (нижние и верхние
///   лучи бьют на разной дальности); если ближайший хит лёг на overhead
///   probe — поверхность нависает НАД ботом ⇒ overhead slope (crawlspace,
///   прыжок запрещён всегда)
/// - хиты почти на всех высотах на одной дальности ⇒ wall
/// - одиночный хит на средней высоте ⇒ platform (уступ)
///
/// can_jump: нижняя кромка в jumpable диапазоне и НЕ overhead slope.
/// Ground-rooted стены бьют нижний probe (ниже jumpable_min) — не прыгаем.
pub fn classify_obstacle(
    world: &dyn RayWorld,
    tuning: &BotTuning,
    position: Vec3,
    direction: Vec3,
    probe_distance: f32,
    exclude: Option<Entity>,
) -> ObstacleReport {
    let dir = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
    if dir == Vec3::ZERO {
        return ObstacleReport::clear();
    }

    let overhead_index = PROBE_HEIGHTS.len() - 1;
    // (высота probe, дистанция хита, это overhead probe)
    let mut hits: Vec<(f32, f32, bool)> = Vec::new();

    for (i, &h) in PROBE_HEIGHTS.iter().enumerate() {
        let origin = position + Vec3::Y * h;
        if let Some(hit) = world.cast_ray(origin, dir, probe_distance, exclude) {
            hits.push((h, hit.distance, i == overhead_index));
        }
    }

    if hits.is_empty() {
        return ObstacleReport::clear();
    }

    let lowest = hits.iter().map(|h| h.0).fold(f32::INFINITY, f32::min);
    let nearest = hits
        .iter()
        .cloned()
        .fold((0.0, f32::INFINITY, false), |acc, h| {
            if h.1 < acc.1 {
                h
            } else {
                acc
            }
        });
    let farthest_dist = hits.iter().map(|h| h.1).fold(f32::NEG_INFINITY, f32::max);
    let distance_spread = farthest_dist - nearest.1;

    let kind = if distance_spread >= tuning.slope_spread {
        if nearest.2 {
            ObstacleKind::OverheadSlope
        } else {
            ObstacleKind::Slope
        }
    } else if hits.len() >= PROBE_HEIGHTS.len() - 1 {
        ObstacleKind::Wall
    } else {
        ObstacleKind::Platform
    };

    let can_jump = kind != ObstacleKind::OverheadSlope
        && lowest >= tuning.jumpable_min_height
        && lowest <= tuning.jumpable_max_height;

    ObstacleReport {
        has_obstacle: true,
        kind,
        can_jump,
        obstacle_height: lowest,
    }
}

/// Смещения коротких лучей вверх для wedge проверки
const WEDGE_OFFSETS: [(f32, f32); 5] = [(0.0, 0.0), (0.4, 0.0), (-0.4, 0.0), (0.0, 0.4), (0.0, -0.4)];

/// Зажат ли бот под террейном
///
/// Несколько коротких лучей вверх вокруг бота; если большинство бьёт в
/// пределах низкого clearance — бот придавлен. Используется для
/// ПРОАКТИВНОГО входа в recovery, до срабатывания счётчика по движению.
pub fn is_wedged_under_terrain(
    world: &dyn RayWorld,
    tuning: &BotTuning,
    position: Vec3,
    exclude: Option<Entity>,
) -> bool {
    let mut hits = 0;
    for &(dx, dz) in WEDGE_OFFSETS.iter() {
        let origin = position + Vec3::new(dx, 0.1, dz);
        if world
            .cast_ray(origin, Vec3::Y, tuning.wedge_clearance, exclude)
            .is_some()
        {
            hits += 1;
        }
    }
    hits >= 3
}

// ============================================================================
// StaticWorld — headless геометрия (плоскость + AABB боксы)
// ============================================================================

/// Осевой бокс solid геометрии
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Slab-метод пересечения луча с боксом; возвращает t входа
    fn ray_intersect(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = max_distance;

        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if d.abs() < 1e-8 {
                if o < lo || o > hi {
                    return None;
                }
            } else {
                let inv = 1.0 / d;
                let (mut t0, mut t1) = ((lo - o) * inv, (hi - o) * inv);
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                t_min = t_min.max(t0);
                t_max = t_max.min(t1);
                if t_min > t_max {
                    return None;
                }
            }
        }

        Some(t_min)
    }
}

/// Статическая геометрия для headless симуляции и тестов
pub struct StaticWorld {
    /// Высота бесконечного пола
    pub ground_y: f32,
    /// Solid боксы (стены, платформы, потолки)
    pub boxes: Vec<Aabb>,
}

impl RayWorld for StaticWorld {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        _exclude: Option<Entity>,
    ) -> Option<RayHit> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }

        let mut best: Option<f32> = None;

        // Пол: односторонняя плоскость, пересекаем только сверху вниз
        if dir.y < -1e-8 && origin.y >= self.ground_y {
            let t = (self.ground_y - origin.y) / dir.y;
            if t >= 0.0 && t <= max_distance {
                best = Some(t);
            }
        }

        for aabb in &self.boxes {
            if let Some(t) = aabb.ray_intersect(origin, dir, max_distance) {
                if best.map_or(true, |b| t < b) {
                    best = Some(t);
                }
            }
        }

        best.map(|t| RayHit {
            point: origin + dir * t,
            distance: t,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> BotTuning {
        BotTuning::default()
    }

    /// Арена с одной стеной x∈[5,6], высотой 3
    fn walled_world() -> StaticWorld {
        StaticWorld {
            ground_y: 0.0,
            boxes: vec![Aabb::new(Vec3::new(5.0, 0.0, -5.0), Vec3::new(6.0, 3.0, 5.0))],
        }
    }

    #[test]
    fn test_los_clear_on_flat_ground() {
        let world = StaticWorld {
            ground_y: 0.0,
            boxes: vec![],
        };
        let visible = has_line_of_sight(
            &world,
            &tuning(),
            Vec3::new(0.0, 1.5, 0.0),
            Vec3::new(10.0, 1.5, 0.0),
            None,
        );
        assert!(visible);
    }

    #[test]
    fn test_los_blocked_by_wall() {
        let world = walled_world();
        let visible = has_line_of_sight(
            &world,
            &tuning(),
            Vec3::new(0.0, 1.5, 0.0),
            Vec3::new(10.0, 1.5, 0.0),
            None,
        );
        assert!(!visible);
    }

    #[test]
    fn test_los_hit_near_target_is_visible() {
        // Стена сразу ЗА target точкой — в пределах допуска видимость есть
        let world = StaticWorld {
            ground_y: 0.0,
            boxes: vec![Aabb::new(
                Vec3::new(10.2, 0.0, -5.0),
                Vec3::new(11.0, 3.0, 5.0),
            )],
        };
        let visible = has_line_of_sight(
            &world,
            &tuning(),
            Vec3::new(0.0, 1.5, 0.0),
            Vec3::new(10.0, 1.5, 0.0),
            None,
        );
        assert!(visible);
    }

    #[test]
    fn test_detect_edge_on_cliff() {
        // Пол есть только как приподнятая платформа под ботом; впереди пустота
        let world = StaticWorld {
            ground_y: -100.0, // далеко внизу, глубже probe depth
            boxes: vec![Aabb::new(
                Vec3::new(-5.0, -0.5, -5.0),
                Vec3::new(2.0, 0.0, 5.0),
            )],
        };
        let dangerous = detect_edge(
            &world,
            &tuning(),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::X,
            3.0,
            0.0,
            None,
        );
        assert!(dangerous);
    }

    #[test]
    fn test_detect_edge_flat_is_safe() {
        let world = StaticWorld {
            ground_y: 0.0,
            boxes: vec![],
        };
        let dangerous = detect_edge(
            &world,
            &tuning(),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::X,
            3.0,
            0.0,
            None,
        );
        assert!(!dangerous);
    }

    #[test]
    fn test_classify_wall() {
        let world = walled_world();
        let report = classify_obstacle(
            &world,
            &tuning(),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::X,
            2.5,
            None,
        );
        assert!(report.has_obstacle);
        assert_eq!(report.kind, ObstacleKind::Wall);
        assert!(!report.can_jump); // нижняя кромка на земле, ниже jumpable диапазона
    }

    #[test]
    fn test_classify_platform_jumpable() {
        // Висящий уступ: блокирует только mid probe (0.7)
        let world = StaticWorld {
            ground_y: 0.0,
            boxes: vec![Aabb::new(
                Vec3::new(5.0, 0.5, -5.0),
                Vec3::new(6.0, 0.9, 5.0),
            )],
        };
        let report = classify_obstacle(
            &world,
            &tuning(),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::X,
            2.5,
            None,
        );
        assert!(report.has_obstacle);
        assert_eq!(report.kind, ObstacleKind::Platform);
        assert!(report.can_jump);
        assert!((report.obstacle_height - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_classify_slope_from_ramp() {
        // Ступени рампы: нижний probe бьёт ближе, верхние — дальше
        let world = StaticWorld {
            ground_y: 0.0,
            boxes: vec![
                Aabb::new(Vec3::new(5.0, 0.0, -5.0), Vec3::new(7.0, 0.5, 5.0)),
                Aabb::new(Vec3::new(6.2, 0.0, -5.0), Vec3::new(7.0, 1.3, 5.0)),
            ],
        };
        let report = classify_obstacle(
            &world,
            &tuning(),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::X,
            2.5,
            None,
        );
        assert_eq!(report.kind, ObstacleKind::Slope);
        assert!(!report.can_jump); // ground-rooted, нижняя кромка ниже jumpable_min
    }

    #[test]
    fn test_overhead_slope_never_jumpable() {
        // Нависающий потолок ближе к боту, чем нижняя кромка: crawlspace
        let world = StaticWorld {
            ground_y: 0.0,
            boxes: vec![
                // нижняя кромка дальше
                Aabb::new(Vec3::new(5.8, 0.2, -5.0), Vec3::new(6.4, 0.4, 5.0)),
                // нависающий потолок на overhead probe, вплотную
                Aabb::new(Vec3::new(4.5, 2.0, -5.0), Vec3::new(6.4, 2.3, 5.0)),
            ],
        };
        let report = classify_obstacle(
            &world,
            &tuning(),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::X,
            2.5,
            None,
        );
        assert_eq!(report.kind, ObstacleKind::OverheadSlope);
        assert!(!report.can_jump);
    }

    #[test]
    fn test_wedged_under_low_ceiling() {
        let world = StaticWorld {
            ground_y: 0.0,
            boxes: vec![Aabb::new(
                Vec3::new(-2.0, 0.8, -2.0),
                Vec3::new(2.0, 1.0, 2.0),
            )],
        };
        assert!(is_wedged_under_terrain(&world, &tuning(), Vec3::ZERO, None));
    }

    #[test]
    fn test_not_wedged_in_open() {
        let world = StaticWorld {
            ground_y: 0.0,
            boxes: vec![],
        };
        assert!(!is_wedged_under_terrain(&world, &tuning(), Vec3::ZERO, None));
    }
}
