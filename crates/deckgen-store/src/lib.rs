pub mod error;
pub mod layout;
pub mod value_store;

pub use error::StoreError;
pub use layout::{DocLocation, FileLayout};
pub use value_store::{db_as_array, reverted_value, ValueStore};
