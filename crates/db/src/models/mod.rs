pub mod client;
pub mod measurement;
