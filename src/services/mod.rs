pub mod chart_service;
pub mod drop_service;
pub mod history_service;
pub mod notify_service;
pub mod watch_service;
