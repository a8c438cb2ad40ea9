//! The CN105 serial protocol spoken by Mitsubishi indoor units.
//!
//! 2400 baud, 8 data bits, even parity, 1 stop bit. Every frame is
//! `FC <type> 01 30 <len> <data[len]> <checksum>`.

use thiserror::Error;

pub mod attribute;
pub mod codec;
pub mod command;
pub mod lookup;
pub mod message;
pub mod response;

pub use attribute::{Attribute, Setting, Value};
pub use codec::{Frame, FrameCodec};
pub use command::{startup_frame, Command, SettingsUpdate};
pub use message::{Message, MessageKind};


/// A command that can't be turned into a frame. Nothing reaches the unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown attribute {0:?}")]
    UnknownAttribute(String),

    #[error("value {value:?} cannot be encoded for {attribute}")]
    UnencodableValue {
        attribute: String,
        value: String
    },

    #[error("{0:?} messages cannot be requested")]
    NotReadable(MessageKind),

    #[error("controller is stopped")]
    Stopped,
}
