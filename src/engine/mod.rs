pub mod localstore;
pub mod persistence;
pub mod query;
pub mod registry;

pub use localstore::LocalStore;
pub use persistence::Persistence;
pub use registry::{CollectionSpec, Registry};
