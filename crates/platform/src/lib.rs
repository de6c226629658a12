//! Hardware abstraction seams for the AC2350 audio codec HAL.
//!
//! This crate provides the trait boundary between the codec driver logic and
//! the SoC it runs on, enabling development and testing without physical
//! hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application / audio flinger
//!         ↓
//! Codec driver (codec crate — pure register/state logic)
//!         ↓
//! Platform seams (this crate — trait abstractions)
//!         ↓
//! Hardware layer (MMIO, SoC timers, interrupt controller)
//! ```
//!
//! # Abstractions
//!
//! - [`RegisterBus`] - memory-mapped register access
//! - [`CloseTimer`] - cancellable one-shot timer for deferred power-down
//! - [`CaptureMemory`] - the SRAM region the voice-activity hardware streams
//!   captured audio into
//! - [`audio_types`] - validated audio domain newtypes
//!
//! Blocking delays reuse [`embedded_hal::delay::DelayNs`].
//!
//! # Features
//!
//! - `std`: expose mock implementations outside `cargo test`
//! - `hardware`: physical hardware target marker
//! - `defmt`: enable defmt::Format derives

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// Pedantic lints suppressed for this hardware seam crate:
#![allow(clippy::doc_markdown)] // register names and hex addresses in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod audio_types;
pub mod bus;
pub mod capture;
pub mod mocks;
pub mod timer;

pub use audio_types::{ChannelMap, GainDb, OutOfRangeError, SampleBits, StreamDir};
pub use bus::RegisterBus;
pub use capture::CaptureMemory;
pub use embedded_hal::delay::DelayNs;
pub use timer::CloseTimer;
