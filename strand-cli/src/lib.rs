//! # strand-cli
//!
//! Command-line front end for `strand-core`.
//!
//! - **stream**: play a headerless PCM file to an RTP receiver, with
//!   RTCP sender reports, until the file ends or Ctrl-C.
//! - **transcode**: convert a text file between US-ASCII, UTF-8 and
//!   UTF-16, rewriting line breaks on the way.

pub mod config;
pub mod service;
pub mod transcode;
