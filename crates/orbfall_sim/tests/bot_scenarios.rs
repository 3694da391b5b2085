//! Интеграционные сценарии bot AI: полный тик App на headless геометрии

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use orbfall_sim::{
    create_headless_app, spawn_bot, Aabb, Actor, Body, BotState, BotTeleported, BotTimers,
    CombatCapability, EnergyOrb, Health, RailRider, RailSegment, SpawnPoints, StaticWorld,
    StuckTracker, TargetCaches, WeaponPickup, WorldGeometry,
};
use orbfall_sim::combat::AbilityFired;
use orbfall_sim::config::BotTuning;

fn spawn_one_bot(app: &mut App, position: Vec3, faction_id: u64, seed: u64) -> Entity {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let bot = {
        let world = app.world_mut();
        let mut commands = world.commands();
        spawn_bot(&mut commands, &mut rng, position, faction_id)
    };
    app.world_mut().flush();
    bot
}

fn arm(app: &mut App, bot: Entity) {
    app.world_mut()
        .commands()
        .entity(bot)
        .insert(CombatCapability::new("blaster", 0.6, 12.0, 70.0));
    app.world_mut().flush();
}

/// Тесная келья: бот заперт, сдвинуться некуда
fn sealed_cell(center: Vec3, inner: f32) -> Vec<Aabb> {
    let height = 4.0;
    let thick = 1.0;
    vec![
        Aabb::new(
            center + Vec3::new(inner, 0.0, -inner - thick),
            center + Vec3::new(inner + thick, height, inner + thick),
        ),
        Aabb::new(
            center + Vec3::new(-inner - thick, 0.0, -inner - thick),
            center + Vec3::new(-inner, height, inner + thick),
        ),
        Aabb::new(
            center + Vec3::new(-inner, 0.0, inner),
            center + Vec3::new(inner, height, inner + thick),
        ),
        Aabb::new(
            center + Vec3::new(-inner, 0.0, -inner - thick),
            center + Vec3::new(inner, height, -inner),
        ),
    ]
}

#[test]
fn test_unarmed_bot_collects_nearby_weapon() {
    let mut app = create_headless_app(11);
    let bot = spawn_one_bot(&mut app, Vec3::ZERO, 0, 11);

    app.world_mut().commands().spawn((
        WeaponPickup {
            capability: CombatCapability::new("blaster", 0.6, 12.0, 70.0),
        },
        Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)),
    ));
    app.world_mut().flush();

    let mut saw_collect_state = false;
    for _ in 0..600 {
        app.update();
        if matches!(
            app.world().get::<BotState>(bot),
            Some(BotState::CollectAbility { .. })
        ) {
            saw_collect_state = true;
        }
        if app.world().get::<CombatCapability>(bot).is_some() {
            break;
        }
    }

    assert!(saw_collect_state, "бот обязан пройти через COLLECT_ABILITY");
    assert!(
        app.world().get::<CombatCapability>(bot).is_some(),
        "оружие в 5 метрах должно быть подобрано"
    );
}

#[test]
fn test_critical_health_triggers_retreat() {
    let mut app = create_headless_app(13);
    let bot = spawn_one_bot(&mut app, Vec3::ZERO, 0, 13);
    let _enemy = spawn_one_bot(&mut app, Vec3::new(5.0, 0.0, 0.0), 1, 14);

    app.world_mut().get_mut::<Health>(bot).unwrap().current = 2;

    for _ in 0..3 {
        app.update();
    }
    assert!(
        matches!(
            app.world().get::<BotState>(bot),
            Some(BotState::Retreat { .. })
        ),
        "2 HP при враге в 5 метрах — немедленный RETREAT"
    );

    // Commitment: retreat держится до истечения таймера
    for _ in 0..10 {
        app.update();
    }
    assert!(matches!(
        app.world().get::<BotState>(bot),
        Some(BotState::Retreat { .. })
    ));
}

#[test]
fn test_wedged_bot_enters_recovery_with_bounded_timer() {
    let mut app = create_headless_app(17);
    // Низкая плита прямо над ботом
    app.insert_resource(WorldGeometry::new(StaticWorld {
        ground_y: 0.0,
        boxes: vec![Aabb::new(Vec3::new(-2.0, 0.8, -2.0), Vec3::new(2.0, 1.0, 2.0))],
    }));
    let bot = spawn_one_bot(&mut app, Vec3::ZERO, 0, 17);

    app.update();

    let tracker = app.world().get::<StuckTracker>(bot).unwrap();
    let recovery = tracker
        .recovery
        .as_ref()
        .expect("придавленный бот обязан войти в recovery сразу");
    assert!(recovery.wedged);
    // Randomized длительность окна (минус максимум пара тиков)
    assert!(recovery.timer > 0.7 && recovery.timer <= 1.5);
}

#[test]
fn test_hopeless_stuck_escalates_to_teleport() {
    let mut app = create_headless_app(19);
    // Келья без зазора: стены вплотную к корпусу
    app.insert_resource(WorldGeometry::new(StaticWorld {
        ground_y: 0.0,
        boxes: sealed_cell(Vec3::ZERO, 0.4),
    }));
    let spawn_set = vec![Vec3::new(15.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 15.0)];
    app.insert_resource(SpawnPoints(spawn_set.clone()));
    let bot = spawn_one_bot(&mut app, Vec3::ZERO, 0, 19);

    let mut cursor = app
        .world()
        .resource::<Events<BotTeleported>>()
        .get_cursor();
    let mut teleports: Vec<BotTeleported> = Vec::new();
    for _ in 0..600 {
        app.update();
        teleports.extend(
            cursor
                .read(app.world().resource::<Events<BotTeleported>>())
                .cloned(),
        );
        if !teleports.is_empty() {
            break;
        }
    }

    assert_eq!(
        teleports.len(),
        1,
        "запертый бот обязан телепортироваться ровно один раз"
    );
    let event = &teleports[0];
    assert_eq!(event.bot, bot);
    assert!(
        spawn_set.contains(&event.to),
        "телепорт только на точку из spawn набора, был {:?}",
        event.to
    );

    // Счётчик и recovery сброшены телепортом
    let tracker = app.world().get::<StuckTracker>(bot).unwrap();
    assert_eq!(tracker.strikes, 0);
    assert!(!tracker.in_recovery());

    // Скорость обнулена: за остаток тика бот сдвигается максимум на
    // один шаг разгона с нуля, не на накопленную recovery скорость
    let position = app.world().get::<Transform>(bot).unwrap().translation;
    let drift = Vec3::new(position.x - event.to.x, 0.0, position.z - event.to.z).length();
    assert!(drift < 0.1, "горизонтальный дрейф после телепорта: {}", drift);
    let body = app.world().get::<Body>(bot).unwrap();
    assert!(body.horizontal_speed() < 1.5);

    // Свободный бот больше не телепортируется
    for _ in 0..120 {
        app.update();
        teleports.extend(
            cursor
                .read(app.world().resource::<Events<BotTeleported>>())
                .cloned(),
        );
    }
    assert_eq!(teleports.len(), 1);
}

#[test]
fn test_movement_resets_strike_counter() {
    let mut app = create_headless_app(43);
    let bot = spawn_one_bot(&mut app, Vec3::ZERO, 0, 43);
    // Накопленные страйки должны сгореть от первого же реального смещения
    app.world_mut().get_mut::<StuckTracker>(bot).unwrap().strikes = 2;

    for _ in 0..60 {
        app.update();
    }

    let tracker = app.world().get::<StuckTracker>(bot).unwrap();
    assert_eq!(
        tracker.strikes, 0,
        "wander по открытой арене обязан сбросить счётчик"
    );
    assert!(!tracker.in_recovery());
}

#[test]
fn test_first_stuck_check_only_anchors_position() {
    let mut app = create_headless_app(47);
    // Келья с щелью меньше порога смещения: бот застрял, но не wedged
    app.insert_resource(WorldGeometry::new(StaticWorld {
        ground_y: 0.0,
        boxes: sealed_cell(Vec3::ZERO, 0.45),
    }));
    let bot = spawn_one_bot(&mut app, Vec3::ZERO, 0, 47);

    // Первая проверка срабатывает сразу после спавна — страйка не даёт
    for _ in 0..2 {
        app.update();
    }
    let tracker = app.world().get::<StuckTracker>(bot).unwrap();
    assert!(tracker.primed);
    assert_eq!(
        tracker.strikes, 0,
        "нулевое смещение свежего бота — не страйк"
    );

    // Следующий интервал уже меряет честное смещение
    for _ in 0..23 {
        app.update();
    }
    assert!(app.world().get::<StuckTracker>(bot).unwrap().strikes >= 1);
}

#[test]
fn test_chase_without_progress_times_out() {
    let mut app = create_headless_app(23);
    // Stuck лестницу отключаем: интересует только target timeout
    app.insert_resource(BotTuning {
        stuck_enter_strikes: 1_000_000,
        stuck_teleport_strikes: 1_000_001,
        ..Default::default()
    });
    // Обе кельи просторнее корпуса: боты не wedged, но заперты
    let mut boxes = sealed_cell(Vec3::ZERO, 0.6);
    boxes.extend(sealed_cell(Vec3::new(20.0, 0.0, 0.0), 0.6));
    app.insert_resource(WorldGeometry::new(StaticWorld {
        ground_y: 0.0,
        boxes,
    }));

    let bot = spawn_one_bot(&mut app, Vec3::ZERO, 0, 23);
    arm(&mut app, bot);
    let _prey = spawn_one_bot(&mut app, Vec3::new(20.0, 0.0, 0.0), 1, 24);

    // ~3.3 секунды погони без прогресса: таймер копится
    for _ in 0..200 {
        app.update();
    }
    assert!(matches!(
        app.world().get::<BotState>(bot),
        Some(BotState::Chase { .. })
    ));
    let timeout = app.world().get::<BotTimers>(bot).unwrap().timeout;
    assert!(timeout > 2.0, "timeout должен накапливаться, был {}", timeout);

    // За порогом 4с — сброс в WANDER (и новый заход погони с нуля)
    for _ in 0..80 {
        app.update();
    }
    let timeout = app.world().get::<BotTimers>(bot).unwrap().timeout;
    assert!(
        timeout < 2.0,
        "после таймаута счётчик обязан сброситься, был {}",
        timeout
    );
}

#[test]
fn test_armed_bots_exchange_fire() {
    let mut app = create_headless_app(29);
    let a = spawn_one_bot(&mut app, Vec3::ZERO, 0, 29);
    let b = spawn_one_bot(&mut app, Vec3::new(10.0, 0.0, 0.0), 1, 30);
    arm(&mut app, a);
    arm(&mut app, b);

    let mut fired = false;
    for _ in 0..600 {
        app.update();
        if !app.world().resource::<Events<AbilityFired>>().is_empty() {
            fired = true;
            break;
        }
    }

    assert!(fired, "вооружённые боты на optimal range обязаны стрелять");
    // Цели держат друг друга: оба в боевых состояниях
    for bot in [a, b] {
        assert!(matches!(
            app.world().get::<BotState>(bot),
            Some(BotState::Attack { .. } | BotState::Chase { .. })
        ));
    }
}

#[test]
fn test_bot_levels_up_from_orb() {
    let mut app = create_headless_app(37);
    let bot = spawn_one_bot(&mut app, Vec3::ZERO, 0, 37);
    app.world_mut().commands().spawn((
        EnergyOrb::default(),
        Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)),
    ));
    app.world_mut().flush();

    let mut saw_collect_state = false;
    for _ in 0..600 {
        app.update();
        if matches!(
            app.world().get::<BotState>(bot),
            Some(BotState::CollectOrb { .. })
        ) {
            saw_collect_state = true;
        }
        if app.world().get::<Actor>(bot).unwrap().level > 0 {
            break;
        }
    }

    assert!(saw_collect_state);
    assert_eq!(app.world().get::<Actor>(bot).unwrap().level, 1);
}

#[test]
fn test_rail_rider_grinds() {
    let mut app = create_headless_app(41);
    let bot = spawn_one_bot(&mut app, Vec3::ZERO, 0, 41);
    app.world_mut().commands().entity(bot).insert(RailRider);
    app.world_mut().commands().spawn((
        RailSegment { direction: Vec3::X },
        Transform::from_translation(Vec3::ZERO),
    ));
    app.world_mut().flush();

    let mut saw_grind = false;
    for _ in 0..600 {
        app.update();
        if matches!(
            app.world().get::<BotState>(bot),
            Some(BotState::Grind { .. })
        ) {
            saw_grind = true;
            break;
        }
    }

    assert!(saw_grind, "RailRider рядом с рельсой обязан зацепиться");
}

#[test]
fn test_caches_exclude_own_faction() {
    let mut app = create_headless_app(31);
    let bot = spawn_one_bot(&mut app, Vec3::ZERO, 0, 31);
    let _ally = spawn_one_bot(&mut app, Vec3::new(3.0, 0.0, 0.0), 0, 32);
    let enemy = spawn_one_bot(&mut app, Vec3::new(6.0, 0.0, 0.0), 1, 33);

    for _ in 0..3 {
        app.update();
    }

    let caches = app.world().get::<TargetCaches>(bot).unwrap();
    assert_eq!(caches.enemies, vec![enemy]);
}
