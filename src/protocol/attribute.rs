use std::fmt;

use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use super::{
    lookup::{FanSpeed, HorizontalVane, Mode, Power, Temperature, VerticalVane},
    CommandError,
};


/// The six writable settings of the heat pump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Setting {
    Power,
    Mode,
    SetPoint,
    FanSpeed,
    VerticalVane,
    HorizontalVane,
}

impl Setting {
    /// Parse a control-plane value for this setting.
    ///
    /// `set_point` is a decimal in degrees Celsius, everything else is a
    /// table label (`ON`, `HEAT`, `QUIET`, `SWING`, `<<`, ...).
    pub fn parse_value(self, raw: &str) -> Result<Value, CommandError> {
        let raw = raw.trim();

        let value = match self {
            Setting::Power => raw.parse().map(Value::Power).ok(),
            Setting::Mode => raw.parse().map(Value::Mode).ok(),
            Setting::SetPoint => raw.parse().map(Value::Temperature).ok(),
            Setting::FanSpeed => raw.parse().map(Value::FanSpeed).ok(),
            Setting::VerticalVane => raw.parse().map(Value::VerticalVane).ok(),
            Setting::HorizontalVane => raw.parse().map(Value::HorizontalVane).ok(),
        };

        value.ok_or_else(|| CommandError::UnencodableValue {
            attribute: self.to_string(),
            value: raw.to_string()
        })
    }
}


/// Every piece of tracked pump state that can be published.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    Setting(Setting),
    RoomTemp,
    CompressorState,
    CompressorFrequency,
}

impl Attribute {
    /// Topic path relative to the controller's topic prefix.
    pub fn topic_suffix(&self) -> String {
        match self {
            Attribute::Setting(setting) => format!("settings/{setting}"),
            Attribute::RoomTemp => "room_temp".to_string(),
            Attribute::CompressorState => "compressor/state".to_string(),
            Attribute::CompressorFrequency => "compressor/frequency".to_string(),
        }
    }
}

impl From<Setting> for Attribute {
    fn from(setting: Setting) -> Self {
        Attribute::Setting(setting)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.topic_suffix())
    }
}


/// A decoded attribute value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Power(Power),
    Mode(Mode),
    Temperature(Temperature),
    FanSpeed(FanSpeed),
    VerticalVane(VerticalVane),
    HorizontalVane(HorizontalVane),
    /// Compressor frequency, device-specific units.
    Frequency(u8),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Power(v) => write!(f, "{v}"),
            Value::Mode(v) => write!(f, "{v}"),
            Value::Temperature(v) => write!(f, "{v}"),
            Value::FanSpeed(v) => write!(f, "{v}"),
            Value::VerticalVane(v) => write!(f, "{v}"),
            Value::HorizontalVane(v) => write!(f, "{v}"),
            Value::Frequency(v) => write!(f, "{v}"),
        }
    }
}
