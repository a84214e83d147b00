// Library for tests to access modules

pub mod channel;
pub mod config;
pub mod error;
pub mod executor;
pub mod models;
pub mod notifier;
pub mod pc_info;
pub mod pipeline;
pub mod routes;
pub mod secrets;
pub mod sysinfo_repo;
pub mod version;
pub mod vitals;
