//! beatword — beat clock, hit judging and stage progression for a word
//! rhythm game.
//!
//! A [`run::RunState`] owns a [`clock::BeatClock`], partitions the session's
//! words into tempo stages and scores every hit against the beat grid.

pub mod audio;
pub mod autoplay;
pub mod clock;
pub mod config;
pub mod error;
pub mod judge;
pub mod run;
