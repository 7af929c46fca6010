pub mod format;
pub mod open_item;
