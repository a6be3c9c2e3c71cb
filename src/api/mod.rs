pub mod health;
pub mod images;
pub mod instances;
pub mod ports;
pub mod response;
pub mod routes;

pub use routes::create_router;
