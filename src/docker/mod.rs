pub mod container;
pub mod hub;

pub use container::DockerManager;
pub use hub::DockerHubClient;
