//! Domain Layer
//!
//! Record shapes owned by the record store, and the ports the sync engine
//! and adapter talk through.

pub mod entities;
pub mod ports;
pub mod value_objects;
