//! # sirf
//!
//! Driver for SiRF-based GPS receivers that speak both NMEA 0183 and the SiRF
//! binary protocol over a serial link.
//!
//! The receiver is driven through a [`Device`] session, which owns the
//! transport, a clock and the power line. Measurements switch the receiver
//! to the NMEA sentence they need, read it and switch back:
//!
//! ```
//! use sirf::{Device, DeviceConfig, Error, NoPowerPin, StdClock, Transport};
//!
//! fn locate<T: Transport>(serial: T) -> Result<(), Error<T::Error>> {
//!     let mut gps = Device::new(serial, StdClock::new(), NoPowerPin, DeviceConfig::default());
//!     gps.power_on()?;
//!     if gps.position()? {
//!         let fix = gps.fix();
//!         println!("{} {} at {:?}", fix.latitude(), fix.longitude(), fix.utc_datetime());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Protocol trouble never surfaces as an error: silence, unexpected sentences
//! and unacknowledged commands are reported through [`StatusFlags`], and the
//! last good values are kept.
//!
//! Almanac
//! =======
//!
//! The ephemeris of every satellite can be saved to a [`Storage`] and uploaded
//! back after a power cycle to shorten the time to first fix:
//!
//! ```
//! use sirf::{Clock, Device, Error, FileStorage, LoadOutcome, NoPowerPin, Transport};
//!
//! fn refresh<T: Transport, C: Clock>(
//!     gps: &mut Device<T, C, NoPowerPin>,
//! ) -> Result<(), Error<T::Error>> {
//!     let mut storage = FileStorage::new("/var/lib/gps");
//!     gps.save_almanac(&mut storage, "ALMANAC.TXT")?;
//!     // power cycle
//!     if let LoadOutcome::Loaded(n) = gps.load_almanac(&mut storage, "ALMANAC.TXT")? {
//!         println!("uploaded {} records", n);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! no_std Support
//! ==============
//!
//! Without the `std` feature the crate is `no_std` and allocation free; bring
//! a [`Transport`], a [`Clock`] and an `embedded-hal` output pin. `alloc`
//! enables [`MemStorage`].

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;
extern crate core;
#[cfg(feature = "serde")]
extern crate serde;

pub use crate::{
    almanac::{AlmanacRecord, LoadOutcome, SaveOutcome},
    config::{DeviceConfig, InitConfig},
    device::{Device, PowerMode},
    error::{Error, FrameError, StorageError},
    fix::{parse_decimal, parse_degrees, Fix, FixField, ParseFixFieldError},
    frame::{
        binary_checksum, fill_nmea_checksum, nmea_checksum, verify_nmea_checksum, BinaryChecksum,
        Frame, FrameBuilder, Line, NmeaRates, NmeaSentenceBuilder,
    },
    mode::{CommMode, ParseCommModeError},
    reader::LineReader,
    sentence::{explode, Field, Fields, SentenceKind},
    status::StatusFlags,
    storage::Storage,
    text::Text,
    transport::{Channel, Clock, Deadline, NoPowerPin, Transport},
};

#[cfg(feature = "alloc")]
pub use crate::storage::MemStorage;

#[cfg(feature = "std")]
pub use crate::{storage::FileStorage, transport::StdClock};

pub mod constants;
pub mod frame;

mod almanac;
mod config;
mod device;
mod error;
mod fix;
mod mode;
mod reader;
mod sentence;
mod status;
mod storage;
mod text;
mod transport;
