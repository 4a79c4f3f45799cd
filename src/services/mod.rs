pub mod availability_finder;
pub mod conflict_detector;
pub mod conflict_resolver;
pub mod http_gateway;
pub mod repair_service;
pub mod result_reporter;
pub mod schedule_utils;
pub mod settings_service;
pub mod slot_store;
pub mod timetable_gateway;
