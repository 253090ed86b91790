pub mod schema;
pub mod naming;
pub mod store;

pub use schema::*;
pub use naming::*;
pub use store::*;
