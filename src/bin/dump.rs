use std::time::SystemTime;

use anyhow::Result;
use clap::Parser;
use colored::{ColoredString, Colorize};
use futures::StreamExt;
use mitsubishi2mqtt::{
    config::Port,
    protocol::{codec::frame_type::*, Frame, Message, MessageKind},
};
use url::Url;


/// Print every frame seen on a CN105 link, decoded.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the port to connect to
    ///
    /// either serial:///device/path or tcp+raw://host:port URLs supported
    port: Url,
}


fn delta_ms(since: Option<SystemTime>) -> u128 {
    since
        .and_then(|t| t.elapsed().ok())
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn type_desc(frame: &Frame) -> String {
    let desc = match frame.frame_type() {
        SET_REQUEST => "Set Request",
        INFO_REQUEST => "Info Request",
        CONNECT_REQUEST => "Connect Request",
        SET_RESPONSE => "Set Response",
        INFO_RESPONSE => "Info Response",
        CONNECT_RESPONSE => "Connect Response",
        _ => "Unknown",
    };

    format!("{:02x}: {desc: <16}", frame.frame_type())
}

fn message_desc(frame: &Frame) -> String {
    // requests carry no state, only what is being asked for
    if frame.frame_type() == INFO_REQUEST {
        return format!("{:?}", MessageKind::classify(frame))
    }

    match Message::decode(frame) {
        Message::Unknown(_) => format!("{:02x?}", frame.data()),
        message => {
            let fields = message.reported()
                .into_iter()
                .map(|(attribute, value)| format!("{attribute}={value}"))
                .collect::<Vec<_>>()
                .join(" ");

            format!("{:?} {fields}", message.kind())
        }
    }
}

fn coloured(frame: &Frame, line: String) -> ColoredString {
    match frame.frame_type() {
        SET_REQUEST => line.on_purple().bright_white(),
        INFO_REQUEST | CONNECT_REQUEST => line.on_cyan().bright_white(),
        SET_RESPONSE => line.on_bright_purple().bright_white(),
        INFO_RESPONSE | CONNECT_RESPONSE => line.on_green().bright_white(),
        _ => line.on_black()
    }
}


#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut framed = Port::open(&args.port).await?.framed();

    let start_time = SystemTime::now();
    let mut last_frame_time: Option<SystemTime> = None;

    while let Some(frame) = framed.next().await {
        let frame = frame?;

        let start_delta_ms = delta_ms(Some(start_time));
        let last_frame_delta_ms = delta_ms(last_frame_time);

        let line = format!("[{start_delta_ms:8}, {last_frame_delta_ms:8}] {} {}", type_desc(&frame), message_desc(&frame));

        println!("{}", coloured(&frame, line));

        last_frame_time = Some(SystemTime::now());
    }

    Ok(())
}
