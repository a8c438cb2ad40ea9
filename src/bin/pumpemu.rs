use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use futures::{SinkExt, TryStreamExt};
use mitsubishi2mqtt::protocol::{
    codec::frame_type,
    lookup::{FanSpeed, HorizontalVane, Mode, Power, Temperature, VerticalVane},
    message::{OperationStatusState, SettingsState},
    response, Frame, FrameCodec, Message, MessageKind,
};
use rand::Rng;
use tokio::{net::{TcpListener, TcpStream}, sync::Mutex};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;


/// Emulator for a Mitsubishi indoor unit's CN105 port.
///
/// Listens for tcp+raw connections; point the bridge at
/// tcp+raw://<listen address>.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to accept connections on
    #[arg(long, default_value = "127.0.0.1:3456")]
    listen: SocketAddr,

    /// Answer temperature requests with the coarse whole-degree encoding only
    #[arg(long)]
    coarse_temperature: bool,
}


/// What the emulated unit is doing.
struct EmulatedPump {
    settings: SettingsState,
    room_temp: Temperature,
}

impl EmulatedPump {
    fn new() -> Self {
        Self {
            settings: SettingsState {
                power: Some(Power::On),
                mode: Some(Mode::Heat),
                set_point: Some(Temperature::whole(23)),
                fan_speed: Some(FanSpeed::Auto),
                vertical_vane: Some(VerticalVane::Auto),
                horizontal_vane: Some(HorizontalVane::Center),
            },
            room_temp: Temperature::and_half(20),
        }
    }

    fn running(&self) -> bool {
        self.settings.power == Some(Power::On)
            && matches!(self.settings.mode, Some(Mode::Heat | Mode::Cool | Mode::Auto))
    }

    /// Half a degree towards the set point while running, random drift otherwise.
    fn drift(&mut self) {
        let current = self.room_temp.half_degrees();

        let step = match self.settings.set_point {
            Some(target) if self.running() => (target.half_degrees() - current).signum(),
            _ => rand::thread_rng().gen_range(-1..=1),
        };

        self.room_temp = Temperature::from_half_degrees((current + step).clamp(20, 82));
    }

    fn operation_status(&self) -> OperationStatusState {
        let gap = self.settings.set_point
            .map(|target| (target.half_degrees() - self.room_temp.half_degrees()).unsigned_abs())
            .unwrap_or(0);

        if self.running() && gap > 0 {
            OperationStatusState::new(Power::On, (20 + gap * 5).min(120) as u8)
        } else {
            OperationStatusState::new(Power::Off, 0)
        }
    }

    fn apply(&mut self, update: &SettingsState) {
        for (setting, value) in update.values() {
            self.settings.set(setting, value);
        }
    }
}


async fn emulate(stream: TcpStream, pump: Arc<Mutex<EmulatedPump>>, precise: bool) -> Result<()> {
    let mut port = Framed::new(stream, FrameCodec::new());
    let mut connected = false;

    while let Some(frame) = port.try_next().await? {
        debug!("received {frame:?}");

        let resp: Frame = match frame.frame_type() {
            frame_type::CONNECT_REQUEST => {
                connected = true;
                info!("connect handshake");

                response::connect_response()
            },

            // a real unit stays silent until it has seen the handshake
            _ if !connected => {
                warn!("ignoring {frame:?} before connect");
                continue
            },

            frame_type::INFO_REQUEST => {
                let mut pump = pump.lock().await;

                match MessageKind::classify(&frame) {
                    MessageKind::Settings => response::settings_info(&pump.settings)?,
                    MessageKind::Temperature => {
                        pump.drift();
                        response::temperature_info(pump.room_temp, precise)
                    },
                    MessageKind::OperationStatus => response::operation_status_info(&pump.operation_status()),
                    MessageKind::Unknown => {
                        warn!("unsupported info request {frame:?}");
                        continue
                    }
                }
            },

            frame_type::SET_REQUEST => {
                if let Message::Settings(update) = Message::decode(&frame) {
                    info!(?update, "set request");
                    pump.lock().await.apply(&update);
                }

                response::set_response()
            },

            _ => {
                warn!("unexpected {frame:?}");
                continue
            }
        };

        port.send(resp).await?;
    }

    Ok(())
}


#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let listener = TcpListener::bind(args.listen).await
        .with_context(|| format!("failed to listen on {}", args.listen))?;

    info!("emulated heat pump listening on {}", args.listen);

    // state survives reconnects, like the real unit
    let pump = Arc::new(Mutex::new(EmulatedPump::new()));

    loop {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true)?;

        info!(%peer, "connected");

        let pump = pump.clone();
        let precise = !args.coarse_temperature;

        tokio::spawn(async move {
            match emulate(stream, pump, precise).await {
                Ok(()) => info!(%peer, "disconnected"),
                Err(err) => warn!(%peer, "connection failed: {err:#}"),
            }
        });
    }
}
