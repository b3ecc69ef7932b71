pub mod products;

pub use products::{NewProduct, ProductService};
