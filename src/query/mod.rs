//! Query string to MongoDB translation.
//!
//! A request's query string is decoded into a [`QueryHelper`]. Its reserved
//! keys (`sort`, `project`, `page`, `per_page`) become a [`CursorOption`];
//! the remaining keys feed a [`MongoQuery`] filter builder.

pub mod cursor;
pub mod filter;
pub mod helper;

pub use cursor::{build_cursor, build_sort_or_project, clamp_per_page, CursorOption, MAX_PER_PAGE};
pub use filter::MongoQuery;
pub use helper::{QueryHelper, QueryValue, DEFAULT_PAGE, DEFAULT_PER_PAGE, RESERVED_KEYS};
