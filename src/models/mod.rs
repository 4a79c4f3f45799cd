pub mod conflict;
pub mod day;
pub mod resolution;
pub mod schedule;
pub mod settings;
pub mod slot;
