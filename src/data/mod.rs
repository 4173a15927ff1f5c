pub mod export;
pub mod sample;
pub mod store;
