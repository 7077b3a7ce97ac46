pub mod client;
pub mod sync;
