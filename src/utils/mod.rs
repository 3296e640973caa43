pub mod errors;

pub use errors::WatchError;
