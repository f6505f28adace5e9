pub mod auth;
pub mod config;
pub mod kb;
pub mod leads;
pub mod profile;
pub mod realtime;
pub mod shared;
