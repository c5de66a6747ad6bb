//! PGN 130316 — Temperature, Extended Range.
//!
//! Single-frame layout (little-endian):
//!
//! | byte | field              | resolution          |
//! |------|--------------------|---------------------|
//! | 0    | SID                | —                   |
//! | 1    | instance           | —                   |
//! | 2    | source             | [`TempSource`]      |
//! | 3–5  | actual temperature | 0.001 K, u24        |
//! | 6–7  | set temperature    | 0.1 K, u16          |
//!
//! All-ones in a numeric field means "data not available".

use core::fmt;

use serde::Serialize;

use super::N2kMessage;

pub const PGN_TEMPERATURE_EXT: u32 = 130_316;
pub const PRIORITY: u8 = 6;
const PAYLOAD_LEN: usize = 8;

const ACTUAL_RESOLUTION: f64 = 0.001;
const SET_RESOLUTION: f64 = 0.1;
/// u24 all-ones = not available; 0xFFFFFE = out of range.
const U24_MAX_VALID: u32 = 0x00FF_FFFD;
const U24_NA: u32 = 0x00FF_FFFF;
const U16_MAX_VALID: u16 = 0xFFFD;
const U16_NA: u16 = 0xFFFF;

/// Which measurement a temperature message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TempSource {
    Sea,
    Outside,
    Inside,
    EngineRoom,
    MainCabin,
    LiveWell,
    BaitWell,
    Refrigeration,
    HeatingSystem,
    DewPoint,
    ApparentWindChill,
    TheoreticalWindChill,
    HeatIndex,
    Freezer,
    ExhaustGas,
    ShaftSeal,
    /// Reserved or manufacturer-specific code.
    Other(u8),
}

impl TempSource {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Sea,
            1 => Self::Outside,
            2 => Self::Inside,
            3 => Self::EngineRoom,
            4 => Self::MainCabin,
            5 => Self::LiveWell,
            6 => Self::BaitWell,
            7 => Self::Refrigeration,
            8 => Self::HeatingSystem,
            9 => Self::DewPoint,
            10 => Self::ApparentWindChill,
            11 => Self::TheoreticalWindChill,
            12 => Self::HeatIndex,
            13 => Self::Freezer,
            14 => Self::ExhaustGas,
            15 => Self::ShaftSeal,
            other => Self::Other(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            Self::Sea => 0,
            Self::Outside => 1,
            Self::Inside => 2,
            Self::EngineRoom => 3,
            Self::MainCabin => 4,
            Self::LiveWell => 5,
            Self::BaitWell => 6,
            Self::Refrigeration => 7,
            Self::HeatingSystem => 8,
            Self::DewPoint => 9,
            Self::ApparentWindChill => 10,
            Self::TheoreticalWindChill => 11,
            Self::HeatIndex => 12,
            Self::Freezer => 13,
            Self::ExhaustGas => 14,
            Self::ShaftSeal => 15,
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Not PGN 130316.
    WrongPgn(u32),
    /// Payload shorter than the fixed layout.
    Truncated(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongPgn(pgn) => write!(f, "expected PGN {PGN_TEMPERATURE_EXT}, got {pgn}"),
            Self::Truncated(len) => write!(f, "payload {len} bytes, need {PAYLOAD_LEN}"),
        }
    }
}

/// Decoded PGN 130316 fields.  Temperatures are in Kelvin; `None` is
/// "not available".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureExt {
    pub sid: u8,
    pub instance: u8,
    pub source: TempSource,
    pub actual_k: Option<f64>,
    pub set_k: Option<f64>,
}

impl TemperatureExt {
    pub fn encode(&self) -> N2kMessage {
        let mut msg = N2kMessage::new(PGN_TEMPERATURE_EXT, PRIORITY);
        let [a0, a1, a2, _] = scale_u24(self.actual_k, ACTUAL_RESOLUTION).to_le_bytes();
        let [s0, s1] = scale_u16(self.set_k, SET_RESOLUTION).to_le_bytes();
        let payload: [u8; PAYLOAD_LEN] =
            [self.sid, self.instance, self.source.raw(), a0, a1, a2, s0, s1];
        msg.data = payload.into_iter().collect();
        msg
    }

    pub fn decode(msg: &N2kMessage) -> Result<Self, DecodeError> {
        if msg.pgn != PGN_TEMPERATURE_EXT {
            return Err(DecodeError::WrongPgn(msg.pgn));
        }
        let d = msg.data.as_slice();
        if d.len() < PAYLOAD_LEN {
            return Err(DecodeError::Truncated(d.len()));
        }
        let actual_raw = u32::from_le_bytes([d[3], d[4], d[5], 0]);
        let set_raw = u16::from_le_bytes([d[6], d[7]]);
        Ok(Self {
            sid: d[0],
            instance: d[1],
            source: TempSource::from_raw(d[2]),
            actual_k: (actual_raw <= U24_MAX_VALID).then(|| actual_raw as f64 * ACTUAL_RESOLUTION),
            set_k: (set_raw <= U16_MAX_VALID).then(|| set_raw as f64 * SET_RESOLUTION),
        })
    }
}

fn scale_u24(value: Option<f64>, resolution: f64) -> u32 {
    match value {
        Some(v) if v >= 0.0 => {
            let raw = (v / resolution).round();
            if raw <= U24_MAX_VALID as f64 { raw as u32 } else { U24_NA }
        }
        _ => U24_NA,
    }
}

fn scale_u16(value: Option<f64>, resolution: f64) -> u16 {
    match value {
        Some(v) if v >= 0.0 => {
            let raw = (v / resolution).round();
            if raw <= U16_MAX_VALID as f64 { raw as u16 } else { U16_NA }
        }
        _ => U16_NA,
    }
}
