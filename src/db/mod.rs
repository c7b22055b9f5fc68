pub mod core;
pub mod group;
pub mod post;
pub mod rate_limit;
pub mod schema;

pub use core::Database;
