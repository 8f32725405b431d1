//! Product / warehouse / bin master data.
//!
//! Master data is a **read-only input** to the stock core: documents and the
//! ledger consume it (conversion factors, active flags, quarantine routing)
//! but never mutate it. Mutation happens through the catalog registry, which
//! the excluded admin surfaces own.

pub mod catalog;
pub mod product;
pub mod warehouse;

pub use catalog::Catalog;
pub use product::Product;
pub use warehouse::{BinLocation, Warehouse};
