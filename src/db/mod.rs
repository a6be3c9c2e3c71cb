pub mod catalog;
pub mod instance;
pub mod manager;
pub mod ports;

pub use manager::InstanceManager;
