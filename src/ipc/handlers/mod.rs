pub mod archives;
pub mod catalog;
pub mod core;
pub mod import;
pub mod save;
pub mod schedule;
pub mod views;
pub mod week;
