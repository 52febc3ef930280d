//! HTTP handlers
//!
//! Registry endpoints (`/devs`) and proximity search (`/search`).

pub mod devs;
pub mod search;

pub use devs::{create_dev, delete_dev, delete_dev_by_body, get_dev, list_devs, update_dev};
pub use search::search_devs;
