//! Device-side frames: what the indoor unit sends back.
//! Used by the emulator and to build fixtures in tests.

use packed_struct::PackedStruct;

use super::{
    codec::{frame_type, Frame},
    lookup::{self, Temperature},
    message::{subtype, OperationStatusInfo, OperationStatusState, SettingsState, TemperatureInfo, DATA_SIZE, PRECISE_SET_POINT_INFO_OFFSET},
    CommandError,
};


pub fn connect_response() -> Frame {
    Frame::new(frame_type::CONNECT_RESPONSE, &[0x00])
}

/// Acknowledgement of a set request.
pub fn set_response() -> Frame {
    Frame::new(frame_type::SET_RESPONSE, &[0u8; DATA_SIZE])
}

/// A full settings info response. Unknown settings are sent as `0x00`.
pub fn settings_info(settings: &SettingsState) -> Result<Frame, CommandError> {
    let mut data = [0u8; DATA_SIZE];
    data[0] = subtype::SETTINGS;

    for (setting, value) in settings.values() {
        let layout = setting.layout();

        data[layout.info_offset] = setting.encode_value(&value).ok_or_else(|| CommandError::UnencodableValue {
            attribute: setting.to_string(),
            value: value.to_string()
        })?;
    }

    if let Some(precise) = settings.set_point.and_then(|t| t.to_precise_byte()) {
        data[PRECISE_SET_POINT_INFO_OFFSET] = precise;
    }

    Ok(Frame::new(frame_type::INFO_RESPONSE, &data))
}

/// A room temperature info response.
///
/// `precise` selects the newer firmware encoding; without it the value is
/// truncated to the coarse whole-degree table.
pub fn temperature_info(room_temp: Temperature, precise: bool) -> Frame {
    let coarse = Temperature::whole(room_temp.half_degrees().div_euclid(2).clamp(10, 41));

    let info = TemperatureInfo {
        subtype: subtype::TEMPERATURE,
        room_temp: lookup::ROOM_TEMP.encode(coarse).unwrap_or(0),
        room_temp_precise: if precise { room_temp.to_precise_byte().unwrap_or(0) } else { 0 },
    };

    pack(info)
}

/// An operation status info response. Unknown fields are sent as `0x00`.
pub fn operation_status_info(status: &OperationStatusState) -> Frame {
    let info = OperationStatusInfo {
        subtype: subtype::OPERATION_STATUS,
        compressor_frequency: status.compressor_frequency.unwrap_or(0),
        operating: match status.operating {
            Some(lookup::Power::On) => 0x01,
            Some(lookup::Power::Off) | None => 0x00,
        },
    };

    pack(info)
}

fn pack<T>(info: T) -> Frame where
    T: PackedStruct<ByteArray = [u8; DATA_SIZE]>
{
    // every field is a whole byte, packing can't fail
    let data = info.pack().unwrap_or([0u8; DATA_SIZE]);

    Frame::new(frame_type::INFO_RESPONSE, &data)
}
