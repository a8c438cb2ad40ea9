use std::str::FromStr;

use super::{
    attribute::{Setting, Value},
    codec::{frame_type, Frame},
    message::{subtype, MessageKind, SettingsState, DATA_SIZE, PRECISE_SET_POINT_UPDATE_OFFSET},
    CommandError,
};


/// Connect handshake, sent once when the link is opened.
/// The unit ignores everything else until it has seen this.
pub fn startup_frame() -> Frame {
    Frame::new(frame_type::CONNECT_REQUEST, &[0xca, 0x01])
}


/// Changes to send to the unit. Only the settings present get a dirty bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    settings: SettingsState
}

impl SettingsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, setting: Setting, value: Value) -> Result<Self, CommandError> {
        if !self.settings.set(setting, value) {
            return Err(CommandError::UnencodableValue {
                attribute: setting.to_string(),
                value: value.to_string()
            })
        }

        Ok(self)
    }

    /// Build a single-setting update from control-plane strings.
    pub fn parse(attribute: &str, raw_value: &str) -> Result<Self, CommandError> {
        let setting = Setting::from_str(attribute.trim())
            .map_err(|_| CommandError::UnknownAttribute(attribute.to_string()))?;

        let value = setting.parse_value(raw_value)?;

        Self::new().with(setting, value)
    }

    pub fn settings(&self) -> &SettingsState {
        &self.settings
    }

    /// Encode as a set request (`0x41`).
    ///
    ///  0   1   2   3   4   5   6   7   8..12   13  14  15
    /// 01  F0  F1  PW  MO  SP  FA  VV  00      HV  SP' 00
    ///
    /// `F0`/`F1` are the dirty-bit flag bytes, `SP'` the precise set point.
    pub fn encode(&self) -> Result<Frame, CommandError> {
        let mut data = [0u8; DATA_SIZE];
        data[0] = subtype::UPDATE;

        for (setting, value) in self.settings.values() {
            let layout = setting.layout();

            let byte = setting.encode_value(&value).ok_or_else(|| CommandError::UnencodableValue {
                attribute: setting.to_string(),
                value: value.to_string()
            })?;

            data[layout.update_offset] = byte;
            data[layout.flag_offset] |= layout.mask;

            if let (Setting::SetPoint, Value::Temperature(set_point)) = (setting, value) {
                data[PRECISE_SET_POINT_UPDATE_OFFSET] = set_point.to_precise_byte().unwrap_or(0);
            }
        }

        Ok(Frame::new(frame_type::SET_REQUEST, &data))
    }
}


/// Something the controller asks of the unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Poll the current state of a readable kind.
    InfoRequest(MessageKind),
    /// Change settings.
    Update(SettingsUpdate),
}

impl Command {
    pub fn encode(&self) -> Result<Frame, CommandError> {
        match self {
            Command::InfoRequest(kind) => {
                let subtype = kind.info_subtype().ok_or(CommandError::NotReadable(*kind))?;

                let mut data = [0u8; DATA_SIZE];
                data[0] = subtype;

                Ok(Frame::new(frame_type::INFO_REQUEST, &data))
            },
            Command::Update(update) => update.encode(),
        }
    }
}
