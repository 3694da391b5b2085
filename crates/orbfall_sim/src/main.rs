//! Headless симуляция ORBFALL
//!
//! Запускает Bevy App без рендера: арена с ботами, оружием и орбами,
//! прогон фиксированного числа тиков с периодическим статусом.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use orbfall_sim::{
    create_headless_app, spawn_bot, Aabb, BotState, CombatCapability, EnergyOrb, SpawnPoints,
    SpecialMove, StaticWorld, WeaponPickup, WorldGeometry,
};

fn main() {
    let seed = 42;
    println!("Starting ORBFALL headless simulation (seed: {})", seed);

    let mut app = create_headless_app(seed);

    // Арена: пол, пара стен, spawn точки
    app.insert_resource(WorldGeometry::new(StaticWorld {
        ground_y: 0.0,
        boxes: vec![
            Aabb::new(Vec3::new(10.0, 0.0, -12.0), Vec3::new(11.0, 3.0, 12.0)),
            Aabb::new(Vec3::new(-14.0, 0.0, -2.0), Vec3::new(-13.0, 3.0, 8.0)),
        ],
    }));
    app.insert_resource(SpawnPoints(vec![
        Vec3::new(-8.0, 0.0, -8.0),
        Vec3::new(8.0, 0.0, 8.0),
        Vec3::new(-8.0, 0.0, 8.0),
        Vec3::new(8.0, 0.0, -8.0),
    ]));

    // Спавним контент отдельным RNG, чтобы не сдвигать симуляционный seed
    let mut spawn_rng = ChaCha8Rng::seed_from_u64(seed ^ 0xB07);
    {
        let world = app.world_mut();
        let mut commands = world.commands();

        for (i, position) in [
            Vec3::new(-8.0, 0.0, -8.0),
            Vec3::new(8.0, 0.0, 8.0),
            Vec3::new(-8.0, 0.0, 8.0),
            Vec3::new(8.0, 0.0, -8.0),
        ]
        .into_iter()
        .enumerate()
        {
            let bot = spawn_bot(&mut commands, &mut spawn_rng, position, i as u64);
            // Половина ростера умеет dash
            if i % 2 == 0 {
                commands.entity(bot).insert(SpecialMove::default());
            }
        }

        commands.spawn((
            WeaponPickup {
                capability: CombatCapability::new("blaster", 0.6, 12.0, 70.0),
            },
            Transform::from_translation(Vec3::new(0.0, 0.0, 0.0)),
        ));
        commands.spawn((
            WeaponPickup {
                capability: CombatCapability::new("railgun", 2.0, 28.0, 90.0).with_charge(1.4),
            },
            Transform::from_translation(Vec3::new(4.0, 0.0, -4.0)),
        ));

        for i in 0..6 {
            let angle = i as f32 * std::f32::consts::TAU / 6.0;
            commands.spawn((
                EnergyOrb::default(),
                Transform::from_translation(Vec3::new(
                    angle.cos() * 12.0,
                    0.0,
                    angle.sin() * 12.0,
                )),
            ));
        }
    }
    app.world_mut().flush();

    for tick in 0..2000 {
        app.update();

        if tick % 200 == 0 {
            let entity_count = app.world().entities().len();
            let mut states = app.world_mut().query::<&BotState>();
            let summary: Vec<&str> = states
                .iter(app.world())
                .map(|state| state.name())
                .collect();
            println!(
                "Tick {}: {} entities, bots: {:?}",
                tick, entity_count, summary
            );
        }
    }

    println!("Simulation complete!");
}
