// Engine modules: cells, projection, schema, pull sources, and cursors.
pub mod blocking;
pub mod cell;
pub mod cursor;
pub mod error;
pub mod projection;
pub mod raw;
pub mod schema;
pub mod source;
