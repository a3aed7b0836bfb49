//! Device state: entity model and the single-writer store.

pub mod entity;
pub mod store;

pub use entity::{
    BarrierStatus, DeviceEntity, Direction, EntityRef, EntitySnapshot, EntityUpdate, Led,
    LightBarrier, Motor, Power,
};
pub use store::DeviceStore;
