//! ECS Components для игровых entity
//!
//! Организация по доменам:
//! - actor: базовые характеристики (faction, health, level)
//! - body: embodiment (Movable Body контракт: velocity, grounded, jumps, yaw)
//! - personality: личность бота (aggression, caution, skill, preference)
//! - pickups: внешние реестры (weapon pickups, орбы, рельсы)

pub mod actor;
pub mod body;
pub mod personality;
pub mod pickups;

// Re-exports для удобного импорта
pub use actor::*;
pub use body::*;
pub use personality::*;
pub use pickups::*;
