pub mod activities;
pub mod models;

pub use models::{CatalogFilter, NewProduct, Product, ProductFact, Supplier};
