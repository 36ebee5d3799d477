pub mod product;
pub mod supplier;

pub use product::{CatalogFilter, NewProduct, Product, ProductFact};
pub use supplier::Supplier;
