pub mod controller;
pub mod dispatcher;
pub mod logger;
pub mod matcher;
pub mod notifier;
pub mod platform;
pub mod press_log;
pub mod scan_loop;
pub mod settings;
pub mod sleep;
pub mod templates;
pub mod types;
