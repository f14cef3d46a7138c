#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod audio_analyser;
pub mod conference;
pub mod error;
pub mod media_stream;
pub mod mock;
pub mod stream_manager;

pub use error::Error;

#[macro_use]
extern crate lazy_static;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";
