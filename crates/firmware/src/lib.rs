//! Firmware for the vexplot, a two-carriage pen plotter built from VEX IQ parts.
//!
//! The plotter's hardware is reached through the traits in [`hal`], so that
//! everything here runs equally well against the real brain or against the
//! simulator in [`sim`]. A [`Controller`] owns all of it, reads commands off
//! the serial link and acknowledges each one when it's done.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod calibrate;
pub mod config;
pub mod controller;
pub mod error;
pub mod hal;
pub mod motion;
#[cfg(feature = "std")]
pub mod sim;
pub mod status;
mod wait;

pub use config::{Config, ConfigBuilder};
pub use controller::Controller;
pub use error::Error;
pub use motion::Devices;
