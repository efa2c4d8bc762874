pub mod store;
pub mod validate;

pub use store::{FileStore, StoredFile};
pub use validate::{check_required_metadata, validate_file, Category};
