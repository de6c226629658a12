//! Register-level driver for the AC2350 audio codec block.
//!
//! The codec block pairs an analog front end (bias rails, PLL, speaker PA,
//! mic ADCs) with a digital engine (sample-rate dividers, gain stages, the
//! FIFO/DMA interface, a fractional resampler) and a low-power
//! voice-activity detector. This crate drives all three through the
//! [`platform::RegisterBus`] seam, so the full state machine runs and
//! tests on the host.
//!
//! The entry point is [`Codec`], which owns the bus and sequences the
//! subsystems around a refcounted hardware session with deferred close.
//!
//! # Module map
//!
//! - [`regs`] - register addresses and field layouts
//! - [`rates`] - sample-rate tables and clock-family selection
//! - [`gain`] - decibel to fixed-point coefficient conversion
//! - [`analog`] - refcounted analog rail controller
//! - [`digital`] - digital engine programming and ADC slot allocation
//! - [`vad`] - voice-activity detector and capture buffer reads
//! - [`irq`] - codec interrupt dispatch
//! - [`session`] - the [`Codec`] session manager

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
// Pedantic lints suppressed for this register-level driver:
#![allow(clippy::doc_markdown)] // register names and hex addresses in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod analog;
pub mod digital;
pub mod error;
pub mod gain;
pub mod irq;
pub mod rates;
pub mod regs;
pub mod session;
pub mod vad;

pub use analog::{AnalogRails, AnalogTiming, ResourceUser};
pub use digital::{DigitalCodec, SetFlags, SlotAssign, SlotSource, StreamConfig};
pub use error::Error;
pub use irq::IrqDispatch;
pub use session::{CloseKind, Codec, CodecPolicy, CodecUser, HwState};
pub use vad::{VadConfig, VadDataInfo, VadEngine, VadMode};
