#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, VecDeque},
    convert::Infallible,
    rc::Rc,
};

use sirf::{Clock, Device, DeviceConfig, NoPowerPin, Transport};

pub type SimDevice = Device<SimReceiver, VirtualClock, NoPowerPin>;

/// Milliseconds a byte takes on the wire, close to 4800 baud
pub const BYTE_TIME_MS: u64 = 1;

pub const ACK_EPHEMERIS: [u8; 10] = [0xa0, 0xa2, 0x00, 0x02, 0x0b, 0x95, 0x00, 0xa0, 0xb0, 0xb3];
pub const NACK_EPHEMERIS: [u8; 10] = [0xa0, 0xa2, 0x00, 0x02, 0x0c, 0x95, 0x00, 0xa1, 0xb0, 0xb3];
const ACK_MESSAGE_RATE: [u8; 10] = [0xa0, 0xa2, 0x00, 0x02, 0x0b, 0xa6, 0x00, 0xb1, 0xb0, 0xb3];
/// Clock status (id 0x07), stands for the periodic binary output
const CLOCK_STATUS: [u8; 11] = [0xa0, 0xa2, 0x00, 0x03, 0x07, 0x00, 0x01, 0x00, 0x08, 0xb0, 0xb3];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Clock shared between the test, the device and the simulated receiver
#[derive(Debug, Default, Clone)]
pub struct VirtualClock(Rc<Cell<u64>>);

impl VirtualClock {
    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for VirtualClock {
    fn now_ms(&mut self) -> u64 {
        self.now()
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Rates of GGA, GLL, GSA, GSV, RMC, VTG
    Nmea([u8; 6]),
    Binary { streaming: bool },
}

const SENTENCES: [&str; 6] = [
    "GPGGA,123519.000,4140.8217,N,00053.1736,W,{q},08,0.9,198.0,M,46.9,M,,0000",
    "GPGLL,4140.8217,N,00053.1736,W,123519.000,A,A",
    "GPGSA,A,3,07,02,26,27,09,04,15,,,,,,1.8,1.0,1.5",
    "GPGSV,3,1,12,20,00,000,,10,00,000,,31,00,000,,27,00,000,",
    "GPRMC,123519.000,A,4140.8217,N,00053.1736,W,0.13,309.62,140526,,,A",
    "GPVTG,309.62,T,,M,0.13,N,0.2,K,A",
];

fn sentence(body: &str) -> Vec<u8> {
    let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${}*{:02X}\r\n", body, checksum).into_bytes()
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let sum = payload
        .iter()
        .fold(0u16, |acc, &b| (acc + u16::from(b)) & 0x7fff);
    let mut bytes = vec![0xa0, 0xa2];
    bytes.extend((payload.len() as u16).to_be_bytes());
    bytes.extend(payload);
    bytes.extend(sum.to_be_bytes());
    bytes.extend([0xb0, 0xb3]);
    bytes
}

pub struct SimState {
    pub protocol: Protocol,
    /// Bytes waiting for the host
    pub rx: VecDeque<u8>,
    /// Every byte the host wrote
    pub written: Vec<u8>,
    pending: Vec<u8>,
    next_sentence: usize,
    pub clock: VirtualClock,
    /// Listens but sends nothing at all
    pub silent: bool,
    /// Ignores NMEA rate changes and keeps sending this sentence index
    pub stuck_on: Option<usize>,
    /// Keeps sending this byte after its binary output was turned off
    pub noise: Option<u8>,
    pub fix_quality: u8,
    /// Ephemeris data the receiver returns when polled
    pub ephemeris: BTreeMap<u8, [u8; 90]>,
    /// Records uploaded by the host
    pub uploaded: Vec<[u8; 90]>,
    pub reject_uploads: bool,
    pub sentences_in: Vec<String>,
    pub polls: Vec<u8>,
    pub opened_at: Option<u32>,
    pub closed: bool,
}

impl SimState {
    fn refill(&mut self) {
        if !self.rx.is_empty() {
            return;
        }
        match self.protocol {
            Protocol::Nmea(rates) => {
                let idx = match self.stuck_on {
                    Some(idx) => idx,
                    None => {
                        let Some(offset) = (0..6).find(|o| rates[(self.next_sentence + o) % 6] > 0)
                        else {
                            return;
                        };
                        let idx = (self.next_sentence + offset) % 6;
                        self.next_sentence = (idx + 1) % 6;
                        idx
                    }
                };
                let body = SENTENCES[idx].replace("{q}", &self.fix_quality.to_string());
                self.rx.extend(sentence(&body));
            }
            Protocol::Binary { streaming: true } => self.rx.extend(CLOCK_STATUS),
            Protocol::Binary { streaming: false } => self.rx.extend(self.noise),
        }
    }

    fn receive(&mut self, byte: u8) {
        self.written.push(byte);
        if self.pending.is_empty() && byte != b'$' && byte != 0xa0 {
            return;
        }
        self.pending.push(byte);
        match self.pending[0] {
            b'$' => {
                if byte == b'\n' {
                    let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
                    self.pending.clear();
                    self.on_sentence(&line);
                }
            }
            _ => {
                if self.pending.len() >= 4 {
                    let len = usize::from(u16::from_be_bytes([self.pending[2], self.pending[3]]));
                    if self.pending.len() == len + 8 {
                        let bytes = std::mem::take(&mut self.pending);
                        self.on_frame(&bytes);
                    }
                }
            }
        }
    }

    fn on_sentence(&mut self, line: &str) {
        self.sentences_in.push(line.to_string());
        if !matches!(self.protocol, Protocol::Nmea(_)) {
            return;
        }
        let Some((body, checksum)) = line[1..].split_once('*') else {
            return;
        };
        let computed = body.bytes().fold(0u8, |acc, b| acc ^ b);
        if u8::from_str_radix(checksum, 16) != Ok(computed) {
            return;
        }
        if body.starts_with("PSRF100,0,") {
            self.protocol = Protocol::Binary { streaming: true };
            self.rx.clear();
        }
    }

    fn on_frame(&mut self, bytes: &[u8]) {
        let payload = &bytes[4..bytes.len() - 4];
        let sum = payload
            .iter()
            .fold(0u16, |acc, &b| (acc + u16::from(b)) & 0x7fff);
        if bytes[bytes.len() - 4..bytes.len() - 2] != sum.to_be_bytes()
            || bytes[bytes.len() - 2..] != [0xb0, 0xb3]
        {
            return;
        }
        let binary = matches!(self.protocol, Protocol::Binary { .. });
        match payload[0] {
            0x81 if self.stuck_on.is_none() => {
                let rates = [
                    payload[2], payload[4], payload[6], payload[8], payload[10], payload[12],
                ];
                self.protocol = Protocol::Nmea(rates);
                self.next_sentence = 0;
                self.rx.clear();
            }
            0xa6 if binary => {
                self.protocol = Protocol::Binary { streaming: false };
                self.rx.clear();
                self.rx.extend(ACK_MESSAGE_RATE);
            }
            0x93 if binary => {
                let sv_id = payload[1];
                self.polls.push(sv_id);
                if let Some(data) = self.ephemeris.get(&sv_id) {
                    let mut response = vec![0x0f, sv_id];
                    response.extend(data);
                    self.rx.extend(frame(&response));
                }
            }
            0x95 if binary => {
                let record: [u8; 90] = payload[1..].try_into().unwrap();
                self.uploaded.push(record);
                self.rx.extend(if self.reject_uploads {
                    NACK_EPHEMERIS
                } else {
                    ACK_EPHEMERIS
                });
            }
            _ => {},
        }
    }
}

/// A receiver that answers mode switches and almanac commands like a SiRF
/// module at 4800 baud.
#[derive(Clone)]
pub struct SimReceiver {
    pub state: Rc<RefCell<SimState>>,
}

impl SimReceiver {
    pub fn new(clock: &VirtualClock) -> Self {
        let state = SimState {
            protocol: Protocol::Nmea([1; 6]),
            rx: VecDeque::new(),
            written: Vec::new(),
            pending: Vec::new(),
            next_sentence: 0,
            clock: clock.clone(),
            silent: false,
            stuck_on: None,
            noise: None,
            fix_quality: 1,
            ephemeris: BTreeMap::new(),
            uploaded: Vec::new(),
            reject_uploads: false,
            sentences_in: Vec::new(),
            polls: Vec::new(),
            opened_at: None,
            closed: false,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.state.borrow().protocol
    }
}

impl Transport for SimReceiver {
    type Error = Infallible;

    fn open(&mut self, baud_rate: u32) -> Result<(), Infallible> {
        self.state.borrow_mut().opened_at = Some(baud_rate);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Infallible> {
        self.state.borrow_mut().closed = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        self.state.borrow_mut().rx.clear();
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, Infallible> {
        let mut state = self.state.borrow_mut();
        if state.silent {
            return Ok(0);
        }
        state.refill();
        Ok(state.rx.len())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Infallible> {
        let mut state = self.state.borrow_mut();
        if state.silent {
            return Ok(None);
        }
        state.refill();
        let byte = state.rx.pop_front();
        if byte.is_some() {
            state.clock.advance(BYTE_TIME_MS);
        }
        Ok(byte)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Infallible> {
        self.state.borrow_mut().receive(byte);
        Ok(())
    }
}

/// A device wired to a fresh receiver, already in NMEA mode with every sentence on
pub fn device() -> (SimDevice, SimReceiver, VirtualClock) {
    init_logger();
    let clock = VirtualClock::default();
    let receiver = SimReceiver::new(&clock);
    let device = Device::new(
        receiver.clone(),
        clock.clone(),
        NoPowerPin,
        DeviceConfig::default(),
    );
    (device, receiver, clock)
}

pub fn ephemeris_of(sv_id: u8) -> [u8; 90] {
    let mut data = [0u8; 90];
    for (i, b) in data.iter_mut().enumerate() {
        *b = sv_id.wrapping_mul(31).wrapping_add(i as u8);
    }
    data
}
