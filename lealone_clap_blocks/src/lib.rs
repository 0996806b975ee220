//! Building blocks for [`clap`]-driven configuration of lealone components.

pub mod catalog;
