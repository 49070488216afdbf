//! Configuration for the log relay CLI.
//!
//! The configuration lives in a folder containing a `config.yml` file. Every value has a
//! default, so neither the folder nor the file need to exist. Values can be overridden from the
//! command line or the environment through [`OverridableConfig`].

#![warn(missing_docs)]

mod config;

pub use self::config::*;
