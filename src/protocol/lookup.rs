use std::{fmt, str::FromStr};

use strum_macros::{Display, EnumIter, EnumString};

/// A fixed two-way mapping between raw protocol byte codes and domain values.
pub struct Table<T: 'static> {
    entries: &'static [(u8, T)]
}

impl<T> Table<T> where
    T: Copy + PartialEq
{
    pub const fn new(entries: &'static [(u8, T)]) -> Self {
        Self { entries }
    }

    pub fn decode(&self, byte: u8) -> Option<T> {
        self.entries.iter()
            .find(|(code, _)| *code == byte)
            .map(|(_, value)| *value)
    }

    pub fn encode(&self, value: T) -> Option<u8> {
        self.entries.iter()
            .find(|(_, v)| *v == value)
            .map(|(code, _)| *code)
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Power {
    #[strum(to_string = "OFF")]
    Off,
    #[strum(to_string = "ON")]
    On
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Mode {
    #[strum(to_string = "HEAT")]
    Heat,
    #[strum(to_string = "DRY")]
    Dry,
    #[strum(to_string = "COOL")]
    Cool,
    #[strum(to_string = "FAN")]
    Fan,
    #[strum(to_string = "AUTO")]
    Auto
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum FanSpeed {
    #[strum(to_string = "AUTO")]
    Auto,
    #[strum(to_string = "QUIET")]
    Quiet,
    #[strum(to_string = "1")]
    Speed1,
    #[strum(to_string = "2")]
    Speed2,
    #[strum(to_string = "3")]
    Speed3,
    #[strum(to_string = "4")]
    Speed4
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum VerticalVane {
    #[strum(to_string = "AUTO")]
    Auto,
    #[strum(to_string = "1")]
    Position1,
    #[strum(to_string = "2")]
    Position2,
    #[strum(to_string = "3")]
    Position3,
    #[strum(to_string = "4")]
    Position4,
    #[strum(to_string = "5")]
    Position5,
    #[strum(to_string = "SWING")]
    Swing
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum HorizontalVane {
    #[strum(to_string = "NA")]
    NotAvailable,
    #[strum(to_string = "<<")]
    FarLeft,
    #[strum(to_string = "<")]
    Left,
    #[strum(to_string = "|")]
    Center,
    #[strum(to_string = ">")]
    Right,
    #[strum(to_string = ">>")]
    FarRight,
    #[strum(to_string = "<>")]
    Split,
    #[strum(to_string = "SWING")]
    Swing
}


/// A temperature in degrees Celsius, stored in half-degree steps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature(i16);

/// Offset of the precise temperature encoding: `raw = 128 + 2 * celsius`.
const PRECISE_OFFSET: i16 = 128;

impl Temperature {
    pub const fn whole(celsius: i16) -> Self {
        Self(celsius * 2)
    }

    /// `celsius` + 0.5
    pub const fn and_half(celsius: i16) -> Self {
        Self(celsius * 2 + 1)
    }

    pub const fn from_half_degrees(half_degrees: i16) -> Self {
        Self(half_degrees)
    }

    pub fn half_degrees(&self) -> i16 {
        self.0
    }

    pub fn celsius(&self) -> f32 {
        self.0 as f32 / 2.0
    }

    /// Decode the precise `(raw - 128) / 2` encoding.
    /// A zero byte means the firmware doesn't report the precise value.
    pub fn from_precise_byte(raw: u8) -> Option<Self> {
        match raw {
            0 => None,
            raw => Some(Self(raw as i16 - PRECISE_OFFSET))
        }
    }

    pub fn to_precise_byte(&self) -> Option<u8> {
        match u8::try_from(self.0 + PRECISE_OFFSET) {
            Ok(0) | Err(_) => None,
            Ok(raw) => Some(raw)
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.celsius())
    }
}

impl fmt::Debug for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}C", self)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidTemperature;

impl FromStr for Temperature {
    type Err = InvalidTemperature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let celsius: f32 = s.trim().parse().map_err(|_| InvalidTemperature)?;
        let half_degrees = celsius * 2.0;

        if !half_degrees.is_finite() || half_degrees.fract() != 0.0 || half_degrees.abs() > i16::MAX as f32 {
            return Err(InvalidTemperature)
        }

        Ok(Self(half_degrees as i16))
    }
}


pub const POWER: Table<Power> = Table::new(&[
    (0x00, Power::Off),
    (0x01, Power::On),
]);

pub const MODE: Table<Mode> = Table::new(&[
    (0x01, Mode::Heat),
    (0x02, Mode::Dry),
    (0x03, Mode::Cool),
    (0x07, Mode::Fan),
    (0x08, Mode::Auto),
]);

pub const FAN_SPEED: Table<FanSpeed> = Table::new(&[
    (0x00, FanSpeed::Auto),
    (0x01, FanSpeed::Quiet),
    (0x02, FanSpeed::Speed1),
    (0x03, FanSpeed::Speed2),
    (0x05, FanSpeed::Speed3),
    (0x06, FanSpeed::Speed4),
]);

pub const VERTICAL_VANE: Table<VerticalVane> = Table::new(&[
    (0x00, VerticalVane::Auto),
    (0x01, VerticalVane::Position1),
    (0x02, VerticalVane::Position2),
    (0x03, VerticalVane::Position3),
    (0x04, VerticalVane::Position4),
    (0x05, VerticalVane::Position5),
    (0x07, VerticalVane::Swing),
]);

pub const HORIZONTAL_VANE: Table<HorizontalVane> = Table::new(&[
    (0x00, HorizontalVane::NotAvailable),
    (0x01, HorizontalVane::FarLeft),
    (0x02, HorizontalVane::Left),
    (0x03, HorizontalVane::Center),
    (0x04, HorizontalVane::Right),
    (0x05, HorizontalVane::FarRight),
    (0x08, HorizontalVane::Split),
    (0x0c, HorizontalVane::Swing),
]);

/// Coarse room temperature, whole degrees from 10C to 41C.
pub const ROOM_TEMP: Table<Temperature> = Table::new(&[
    (0x00, Temperature::whole(10)),
    (0x01, Temperature::whole(11)),
    (0x02, Temperature::whole(12)),
    (0x03, Temperature::whole(13)),
    (0x04, Temperature::whole(14)),
    (0x05, Temperature::whole(15)),
    (0x06, Temperature::whole(16)),
    (0x07, Temperature::whole(17)),
    (0x08, Temperature::whole(18)),
    (0x09, Temperature::whole(19)),
    (0x0a, Temperature::whole(20)),
    (0x0b, Temperature::whole(21)),
    (0x0c, Temperature::whole(22)),
    (0x0d, Temperature::whole(23)),
    (0x0e, Temperature::whole(24)),
    (0x0f, Temperature::whole(25)),
    (0x10, Temperature::whole(26)),
    (0x11, Temperature::whole(27)),
    (0x12, Temperature::whole(28)),
    (0x13, Temperature::whole(29)),
    (0x14, Temperature::whole(30)),
    (0x15, Temperature::whole(31)),
    (0x16, Temperature::whole(32)),
    (0x17, Temperature::whole(33)),
    (0x18, Temperature::whole(34)),
    (0x19, Temperature::whole(35)),
    (0x1a, Temperature::whole(36)),
    (0x1b, Temperature::whole(37)),
    (0x1c, Temperature::whole(38)),
    (0x1d, Temperature::whole(39)),
    (0x1e, Temperature::whole(40)),
    (0x1f, Temperature::whole(41)),
]);

/// Set point codes. Whole degrees count down from `0x00`, half degrees count
/// up from `0x10`, so byte order is not temperature order.
pub const SET_POINT: Table<Temperature> = Table::new(&[
    (0x00, Temperature::whole(31)),
    (0x01, Temperature::whole(30)),
    (0x02, Temperature::whole(29)),
    (0x03, Temperature::whole(28)),
    (0x04, Temperature::whole(27)),
    (0x05, Temperature::whole(26)),
    (0x06, Temperature::whole(25)),
    (0x07, Temperature::whole(24)),
    (0x08, Temperature::whole(23)),
    (0x09, Temperature::whole(22)),
    (0x0a, Temperature::whole(21)),
    (0x0b, Temperature::whole(20)),
    (0x0c, Temperature::whole(19)),
    (0x0d, Temperature::whole(18)),
    (0x0e, Temperature::whole(17)),
    (0x0f, Temperature::whole(16)),
    (0x1f, Temperature::and_half(16)),
    (0x1e, Temperature::and_half(17)),
    (0x1d, Temperature::and_half(18)),
    (0x1c, Temperature::and_half(19)),
    (0x1b, Temperature::and_half(20)),
    (0x1a, Temperature::and_half(21)),
    (0x19, Temperature::and_half(22)),
    (0x18, Temperature::and_half(23)),
    (0x17, Temperature::and_half(24)),
    (0x16, Temperature::and_half(25)),
    (0x15, Temperature::and_half(26)),
    (0x14, Temperature::and_half(27)),
    (0x13, Temperature::and_half(28)),
    (0x12, Temperature::and_half(29)),
    (0x11, Temperature::and_half(30)),
    (0x10, Temperature::and_half(31)),
]);
