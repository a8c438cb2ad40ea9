use std::time::Duration;

use futures::{Sink, Stream};
use tokio::{io::{AsyncRead, AsyncWrite}, net::TcpStream};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::Framed;
use url::Url;
use anyhow::{Result, Context, bail};

use crate::protocol::{Frame, FrameCodec};


/// CN105 line settings.
pub const BAUD_RATE: u32 = 2400;


pub enum Port {
    Serial(SerialStream),
    TcpRaw(TcpStream)
}


/// A raw byte link to the unit.
pub trait Link: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Link for T
where
    T: AsyncRead + AsyncWrite + Send + Unpin,
{}


pub trait PortStream: Stream<Item = std::io::Result<Frame>> + Sink<Frame, Error = std::io::Error> + Send + Unpin {}

impl<T> PortStream for T
where
    T: Stream<Item = std::io::Result<Frame>> + Sink<Frame, Error = std::io::Error> + Send + Unpin,
{}


impl Port {
    pub async fn open(url: &Url) -> Result<Self> {
        match url.scheme() {
            "serial" => {
                let path = url.path();

                let port = tokio_serial::new(path, BAUD_RATE)
                    .data_bits(tokio_serial::DataBits::Eight)
                    .parity(tokio_serial::Parity::Even)
                    .stop_bits(tokio_serial::StopBits::One)
                    .open_native_async()
                    .with_context(|| format!("failed to open serial port {path}"))
                    ?;

                Ok(Self::Serial(port))
            },
            "tcp+raw" => {
                let host = url.host_str()
                    .with_context(|| format!("tcp+raw requires a host to be specified in the url: {url}"))?;

                let port = url.port()
                    .with_context(|| format!("tcp+raw requires a port number to be specified in the url: {url}"))?;

                let stream = TcpStream::connect((host, port)).await
                    .with_context(|| format!("failed to open tcp+raw connection to: {url}"))?;

                stream.set_nodelay(true)?;

                Ok(Self::TcpRaw(stream))
            },
            other => {
                bail!("url scheme {other} not supported");
            }
        }
    }

    /// The raw byte link, for the controller.
    pub fn link(self) -> Box<dyn Link> {
        match self {
            Port::Serial(port) => Box::new(port),
            Port::TcpRaw(stream) => Box::new(stream),
        }
    }

    /// The port as a stream/sink of frames.
    pub fn framed(self) -> Box<dyn PortStream> {
        Box::new(Framed::new(self.link(), FrameCodec::new()))
    }
}


/// Controller tuning. The defaults match what the unit tolerates.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Prepended to every published topic, without a trailing `/`.
    pub topic_prefix: String,

    pub temperature_interval: Duration,
    pub settings_interval: Duration,
    pub operation_status_interval: Duration,

    /// Upper bound of the random delay added to each poll interval.
    pub jitter: Duration,

    /// How long to wait for the unit to answer a request.
    pub response_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            topic_prefix: "heat_pump".to_string(),
            temperature_interval: Duration::from_secs(10),
            settings_interval: Duration::from_secs(2),
            operation_status_interval: Duration::from_secs(2),
            jitter: Duration::from_millis(300),
            response_timeout: Duration::from_millis(500),
        }
    }
}

impl ControllerConfig {
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.topic_prefix, suffix)
    }
}
