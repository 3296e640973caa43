//! Playback core for the Videoflix client: stream attachment, player control,
//! watch-progress persistence and the watch-page lifecycle.

pub mod api;
pub mod config;
pub mod constants;
pub mod models;
pub mod player;
pub mod progress;
pub mod utils;
pub mod watch;

#[cfg(test)]
mod test_utils;
