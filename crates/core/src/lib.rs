//! `stockmaster-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error taxonomy, and the unit
//! conversion rules every quantity in the system passes through.

pub mod entity;
pub mod error;
pub mod id;
pub mod uom;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{BinId, DocumentId, EntryId, ProductId, UserId, WarehouseId, WaveId};
pub use uom::{ConversionFactor, UnitOfMeasure, QUANTITY_SCALE, to_purchase_units, to_stock_units};
pub use value_object::ValueObject;
