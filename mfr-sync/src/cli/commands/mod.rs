pub mod collections;
pub mod cursor;
pub mod sync;
