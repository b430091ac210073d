//! Arlo entity layer.
//!
//! This library models Arlo cameras, base stations and locations as
//! attribute caches fed by cloud resource events, with per-attribute change
//! callbacks and fire-and-forget commands.

pub mod backend;
pub mod config;
pub mod constant;
pub mod device;
pub mod entity;
pub mod error;
pub mod events;
pub mod location;
pub mod services;
pub mod store;
pub mod tasks;

#[cfg(test)]
mod testing;

pub use device::{Capability, Device, DeviceKind, DeviceState};
pub use entity::{Entity, ResourceFilter, SubscriptionId};
pub use error::{ArloError, Result};
pub use location::Location;
pub use services::Services;
