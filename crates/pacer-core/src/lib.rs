//! Reading engine for word-at-a-time book playback.
//!
//! The crate owns the position model, the chapter cache and the playback
//! session. Fetching, storage and analytics are injected through the traits in
//! [`content`], [`settings`] and [`events`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod app;
pub mod book;
pub mod content;
pub mod deep_link;
pub mod events;
pub mod position;
pub mod render;
pub mod settings;
pub mod text_policy;
