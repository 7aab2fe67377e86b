pub mod fetcher;
pub mod heartbeat;
pub mod identity;
pub mod population;
pub mod transport;
pub mod viewer;
