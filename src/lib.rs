#![forbid(unsafe_code)]

//! Keeps a JSON list of a set of YouTube channels' uploads up to date.
//!
//! A run loads `videos.json`, lists every configured channel through yt-dlp
//! or the channel's Atom feed, merges what it found without ever dropping a
//! known video or touching its `status`, renumbers everything and writes the
//! file back atomically.

pub mod channels;
pub mod config;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod record;
pub mod source;
pub mod store;
