//! Saving the receiver's almanac to storage and uploading it back.
//!
//! File layout: one record per satellite that had data, each 90 payload
//! bytes followed by `AA AA`, then the `AA BB CC CC BB` end of file.

use core::cmp::min;

use embedded_hal::digital::OutputPin;
use log::{debug, trace, warn};

use crate::{
    constants::*,
    device::Device,
    error::{Error, StorageError},
    frame::{ack_for, poll_ephemeris, set_ephemeris},
    mode::CommMode,
    status::StatusFlags,
    storage::Storage,
    transport::{Clock, Deadline, Transport},
};

pub type AlmanacRecord = [u8; ALMANAC_RECORD_LEN];

const RECORD_STRIDE: u64 = (ALMANAC_RECORD_LEN + END_OF_RECORD.len()) as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// This many records were stored
    Saved(usize),
    /// The receiver returned no data for any satellite
    NoAlmanac,
    /// The receiver could not be switched to binary mode
    NoReceiver,
    StorageFailure(StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Every record was acknowledged
    Loaded(usize),
    /// Some records were not acknowledged
    Rejected { loaded: usize, rejected: usize },
    /// The file holds no record
    Empty,
    /// The receiver could not be switched to binary mode
    NoReceiver,
    StorageFailure(StorageError),
}

/// Ephemeris payload of a poll response: bytes 6..96 of a frame of at
/// least 100 bytes.
pub(crate) fn record_from_response(response: &[u8]) -> Option<&AlmanacRecord> {
    if response.len() < MIN_EPHEMERIS_RESPONSE_LEN
        || response[..2] != [SIRF_START_CHAR_1, SIRF_START_CHAR_2]
    {
        return None;
    }
    response[EPHEMERIS_DATA_OFFSET..EPHEMERIS_DATA_OFFSET + ALMANAC_RECORD_LEN]
        .try_into()
        .ok()
}

impl<T, C, P> Device<T, C, P>
where
    T: Transport,
    C: Clock,
    P: OutputPin,
{
    /// Polls the ephemeris of every satellite and stores it in `name`,
    /// replacing any previous file.
    pub fn save_almanac<S: Storage>(
        &mut self,
        storage: &mut S,
        name: &str,
    ) -> Result<SaveOutcome, Error<T::Error>> {
        self.flags.remove(StatusFlags::TIMEOUT);
        if storage.exists(name) {
            if let Err(e) = storage.delete(name) {
                warn!("cannot delete {}: {}", name, e);
                return Ok(SaveOutcome::StorageFailure(e));
            }
        }
        if let Err(e) = storage.create(name) {
            warn!("cannot create {}: {}", name, e);
            return Ok(SaveOutcome::StorageFailure(e));
        }

        let previous = self.comm_mode;
        if !self.enter_binary_off()? {
            self.restore_mode(previous)?;
            return Ok(SaveOutcome::NoReceiver);
        }
        let outcome = self.poll_records(storage, name)?;
        self.restore_mode(previous)?;
        Ok(outcome)
    }

    fn poll_records<S: Storage>(
        &mut self,
        storage: &mut S,
        name: &str,
    ) -> Result<SaveOutcome, Error<T::Error>> {
        let mut stored = 0;
        for sv_id in FIRST_SV_ID..=LAST_SV_ID {
            self.channel
                .write_all(poll_ephemeris(sv_id).as_bytes())
                .map_err(Error::Transport)?;
            let mut response = [0u8; EPHEMERIS_RESPONSE_CAPACITY];
            let window = self
                .channel
                .deadline(self.config.reply_window_ms(EPHEMERIS_RESPONSE_CAPACITY));
            let received = self
                .channel
                .collect_quiet(&mut response, self.config.quiet_interval_ms, &window)
                .map_err(Error::Transport)?;
            let Some(record) = record_from_response(&response[..min(received, response.len())])
            else {
                trace!("no ephemeris for SV {} ({} bytes)", sv_id, received);
                continue;
            };
            let appended = storage
                .append(name, record)
                .and_then(|_| storage.append(name, &END_OF_RECORD));
            if let Err(e) = appended {
                warn!("cannot store ephemeris of SV {}: {}", sv_id, e);
                return Ok(SaveOutcome::StorageFailure(e));
            }
            debug!("stored ephemeris of SV {}", sv_id);
            stored += 1;
        }

        if stored == 0 {
            warn!("receiver has no almanac");
            return Ok(SaveOutcome::NoAlmanac);
        }
        if let Err(e) = storage.append(name, &END_OF_FILE) {
            return Ok(SaveOutcome::StorageFailure(e));
        }
        Ok(SaveOutcome::Saved(stored))
    }

    /// Uploads every record of `name` to the receiver.
    ///
    /// Sets [`StatusFlags::NACK`] when a record was not acknowledged.
    pub fn load_almanac<S: Storage>(
        &mut self,
        storage: &mut S,
        name: &str,
    ) -> Result<LoadOutcome, Error<T::Error>> {
        self.flags.remove(StatusFlags::NACK | StatusFlags::TIMEOUT);
        match storage.size(name) {
            Ok(0) => return Ok(LoadOutcome::Empty),
            Ok(_) => {},
            Err(e) => {
                warn!("cannot open {}: {}", name, e);
                return Ok(LoadOutcome::StorageFailure(e));
            }
        }

        let previous = self.comm_mode;
        if !self.enter_binary_off()? {
            self.restore_mode(previous)?;
            return Ok(LoadOutcome::NoReceiver);
        }
        let outcome = self.upload_records(storage, name)?;
        self.restore_mode(previous)?;
        Ok(outcome)
    }

    fn upload_records<S: Storage>(
        &mut self,
        storage: &mut S,
        name: &str,
    ) -> Result<LoadOutcome, Error<T::Error>> {
        let ack = ack_for(MSG_SET_EPHEMERIS);
        let mut offset = 0u64;
        let mut loaded = 0;
        let mut rejected = 0;
        loop {
            let mut record: AlmanacRecord = [0; ALMANAC_RECORD_LEN];
            let (head, tail) = record.split_at_mut(ALMANAC_HEAD_LEN);
            if let Err(e) = storage.read_at(name, offset, head) {
                warn!("cannot read {} at {}: {}", name, offset, e);
                return Ok(LoadOutcome::StorageFailure(e));
            }
            if *head == END_OF_FILE {
                break;
            }
            let mut marker = [0u8; 2];
            let read = storage
                .read_at(name, offset + ALMANAC_HEAD_LEN as u64, tail)
                .and_then(|_| {
                    storage.read_at(name, offset + ALMANAC_RECORD_LEN as u64, &mut marker)
                });
            if let Err(e) = read {
                warn!("cannot read {} at {}: {}", name, offset, e);
                return Ok(LoadOutcome::StorageFailure(e));
            }
            if marker != END_OF_RECORD {
                warn!("record at {} has no end marker", offset);
            }
            offset += RECORD_STRIDE;

            self.channel
                .write_all(set_ephemeris(&record).as_bytes())
                .map_err(Error::Transport)?;
            self.channel.sleep(ALMANAC_SETTLE_MS, &Deadline::never());
            let mut reply = [0u8; ACK_LEN];
            let window = self.channel.deadline(self.config.reply_window_ms(ACK_LEN));
            let received = self
                .channel
                .collect_quiet(&mut reply, self.config.quiet_interval_ms, &window)
                .map_err(Error::Transport)?;
            if received == ACK_LEN && reply[..] == *ack.as_bytes() {
                loaded += 1;
            } else {
                warn!(
                    "record {} not acknowledged: {:02X?}",
                    loaded + rejected,
                    &reply[..min(received, ACK_LEN)]
                );
                self.flags.insert(StatusFlags::NACK);
                rejected += 1;
            }
        }

        debug!("uploaded {} record(s), {} rejected", loaded, rejected);
        Ok(match (loaded, rejected) {
            (0, 0) => LoadOutcome::Empty,
            (loaded, 0) => LoadOutcome::Loaded(loaded),
            (loaded, rejected) => LoadOutcome::Rejected { loaded, rejected },
        })
    }

    /// Silences the receiver and drops whatever it sent before.
    fn enter_binary_off(&mut self) -> Result<bool, Error<T::Error>> {
        if !self.enter_mode(CommMode::BinaryOff)? {
            self.flags.insert(StatusFlags::TIMEOUT);
            return Ok(false);
        }
        self.channel.sleep(ALMANAC_SETTLE_MS, &Deadline::never());
        let drain = self.channel.deadline(self.config.byte_timeout_ms);
        let dropped = self.channel.drain(&drain).map_err(Error::Transport)?;
        if drain.expired(&mut self.channel.clock) {
            warn!("receiver still talking after {} dropped bytes", dropped);
        }
        Ok(true)
    }
}
