//! Арена: реестры подбираемого, сбор, respawn lifecycle
//!
//! Работает ДО AI в тике (SimSet::Arena): бот принимает решения уже над
//! актуальным состоянием мира — подобранное оружие видно FSM в том же
//! тике.

use bevy::prelude::*;
use rand::Rng;

use crate::ai::fsm::{BotState, BotTimers};
use crate::ai::locomotion::MoveIntent;
use crate::ai::stuck::StuckTracker;
use crate::ai::targeting::TargetCaches;
use crate::combat::CombatCapability;
use crate::components::{Actor, Body, EnergyOrb, Health, Personality, WeaponPickup};
use crate::config::BotTuning;
use crate::{log, log_info, DeterministicRng, SimSet};

/// Spawn точки арены (host задаёт при старте; пусто — телепорт fallback
/// подталкивает бота вверх на месте)
#[derive(Resource, Debug, Clone, Default)]
pub struct SpawnPoints(pub Vec<Vec3>);

/// Event: бот подобрал оружие
#[derive(Event, Debug, Clone)]
pub struct PickupTaken {
    pub bot: Entity,
    pub pickup: Entity,
}

/// Event: бот собрал орб
#[derive(Event, Debug, Clone)]
pub struct OrbCollected {
    pub bot: Entity,
    pub orb: Entity,
    pub new_level: u32,
}

/// Event: бот возрождён
#[derive(Event, Debug, Clone)]
pub struct BotRespawned {
    pub bot: Entity,
    pub at: Vec3,
}

pub struct ArenaPlugin;

impl Plugin for ArenaPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<PickupTaken>()
            .add_event::<OrbCollected>()
            .add_event::<BotRespawned>()
            .add_systems(
                FixedUpdate,
                (collect_pickups, collect_orbs, respawn_dead_bots)
                    .chain()
                    .in_set(SimSet::Arena),
            );
    }
}

/// Спавн бота со всем набором AI компонентов
pub fn spawn_bot(
    commands: &mut Commands,
    rng: &mut rand_chacha::ChaCha8Rng,
    position: Vec3,
    faction_id: u64,
) -> Entity {
    commands
        .spawn((
            Actor {
                faction_id,
                level: 0,
            },
            Health::new(100),
            Transform::from_translation(position),
            Body::default(),
            Personality::generate(rng),
            BotState::default(),
            BotTimers::default(),
            TargetCaches::default(),
            StuckTracker::new(position),
            MoveIntent::default(),
        ))
        .id()
}

/// Система: подбор оружия безоружными ботами
///
/// Один pickup за тик уходит одному боту — первый по порядку обхода.
pub fn collect_pickups(
    tuning: Res<BotTuning>,
    mut commands: Commands,
    bots: Query<(Entity, &Transform, &Health), (With<Actor>, Without<CombatCapability>)>,
    pickups: Query<(Entity, &Transform, &WeaponPickup)>,
    mut taken_events: EventWriter<PickupTaken>,
) {
    let mut taken: Vec<Entity> = Vec::new();

    for (bot, bot_transform, health) in bots.iter() {
        if !health.is_alive() {
            continue;
        }

        for (pickup, pickup_transform, weapon) in pickups.iter() {
            if taken.contains(&pickup) {
                continue;
            }
            let distance = bot_transform
                .translation
                .distance(pickup_transform.translation);
            if distance > tuning.pickup_radius {
                continue;
            }

            commands.entity(bot).insert(weapon.capability.clone());
            commands.entity(pickup).despawn();
            taken.push(pickup);
            taken_events.write(PickupTaken { bot, pickup });
            log(&format!(
                "bot {:?}: picked up '{}'",
                bot, weapon.capability.name
            ));
            break;
        }
    }
}

/// Система: сбор energy орбов (level up)
pub fn collect_orbs(
    tuning: Res<BotTuning>,
    mut commands: Commands,
    mut bots: Query<(Entity, &Transform, &mut Actor, &Health)>,
    mut orbs: Query<(Entity, &Transform, &mut EnergyOrb)>,
    mut collected_events: EventWriter<OrbCollected>,
) {
    for (bot, bot_transform, mut actor, health) in bots.iter_mut() {
        if !health.is_alive() || actor.level >= tuning.max_level {
            continue;
        }

        for (orb, orb_transform, mut energy) in orbs.iter_mut() {
            if energy.collected {
                continue;
            }
            let distance = bot_transform.translation.distance(orb_transform.translation);
            if distance > tuning.orb_radius {
                continue;
            }

            energy.collected = true;
            actor.level += 1;
            commands.entity(orb).despawn();
            collected_events.write(OrbCollected {
                bot,
                orb,
                new_level: actor.level,
            });
            log(&format!("bot {:?}: orb collected, level {}", bot, actor.level));
            break;
        }
    }
}

/// Система: respawn погибших ботов
///
/// Полный сброс runtime состояния: FSM, таймеры, stuck трекер, кэши,
/// тело. Оружие теряется, уровень и (по умолчанию) personality —
/// персистентны.
#[allow(clippy::type_complexity)]
pub fn respawn_dead_bots(
    tuning: Res<BotTuning>,
    spawn_points: Res<SpawnPoints>,
    mut rng: ResMut<DeterministicRng>,
    mut commands: Commands,
    mut bots: Query<
        (
            Entity,
            &mut Transform,
            &mut Health,
            &mut Body,
            &mut BotState,
            &mut BotTimers,
            &mut StuckTracker,
            &mut TargetCaches,
            &mut MoveIntent,
            &mut Personality,
        ),
        With<Actor>,
    >,
    mut respawn_events: EventWriter<BotRespawned>,
) {
    for (
        entity,
        mut transform,
        mut health,
        mut body,
        mut state,
        mut timers,
        mut tracker,
        mut caches,
        mut intent,
        mut personality,
    ) in bots.iter_mut()
    {
        if health.is_alive() {
            continue;
        }

        let at = if spawn_points.0.is_empty() {
            transform.translation
        } else {
            spawn_points.0[rng.rng.gen_range(0..spawn_points.0.len())]
        };

        transform.translation = at;
        *health = Health::new(tuning.respawn_health);
        *body = Body::default();
        *state = BotState::default();
        *timers = BotTimers::default();
        *tracker = StuckTracker::new(at);
        *caches = TargetCaches::default();
        intent.clear();
        commands.entity(entity).remove::<CombatCapability>();

        if tuning.reroll_personality_on_respawn {
            *personality = Personality::generate(&mut rng.rng);
        }

        respawn_events.write(BotRespawned { bot: entity, at });
        log_info(&format!("bot {:?}: respawned at {:?}", entity, at));
    }
}
