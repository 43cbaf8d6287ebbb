//! Control server
//! Accepts controller connections and runs one reader and one writer task per
//! connection. Every inbound line is dispatched on its own task; all outbound
//! lines go through the connection's single writer.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::commands;
use crate::core::bluetooth::{BluetoothManager, RadioAdapter};
use crate::core::protocol::{ControlSender, OutboundMessage};

/// Longest inbound frame; longer input is handed over in pieces of this size
pub const MAX_FRAME_LEN: u64 = 1024;

pub struct ControlServer<R: RadioAdapter> {
    listener: TcpListener,
    manager: Arc<BluetoothManager<R>>,
}

impl<R: RadioAdapter> ControlServer<R> {
    pub async fn bind(address: &str, manager: Arc<BluetoothManager<R>>) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener, manager })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts controllers until the listener fails
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting: {}", e);
                    continue;
                }
            };
            info!("Controller connected from {}", peer);
            tokio::spawn(handle_connection(self.manager.clone(), stream, peer));
        }
    }
}

async fn handle_connection<R: RadioAdapter>(
    manager: Arc<BluetoothManager<R>>,
    stream: TcpStream,
    peer: SocketAddr,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to disable Nagle for {}: {}", peer, e);
    }
    let (reader, writer) = stream.into_split();
    let (sender, receiver) = ControlSender::channel();

    tokio::spawn(write_loop(writer, receiver, peer));
    read_loop(manager, reader, sender, peer).await;

    info!("Controller {} disconnected", peer);
}

async fn read_loop<R: RadioAdapter>(
    manager: Arc<BluetoothManager<R>>,
    reader: OwnedReadHalf,
    sender: ControlSender,
    peer: SocketAddr,
) {
    let mut reader = BufReader::new(reader);
    let mut frame = Vec::new();

    loop {
        frame.clear();
        match (&mut reader).take(MAX_FRAME_LEN).read_until(b'\n', &mut frame).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!("Error reading from {}: {}", peer, e);
                break;
            }
        }

        if frame.iter().all(|b| *b == 0 || b.is_ascii_whitespace()) {
            continue;
        }
        debug!("BUFF: {:?}", String::from_utf8_lossy(&frame));

        let manager = manager.clone();
        let sender = sender.clone();
        let raw = frame.clone();
        tokio::spawn(async move {
            if let Err(e) = commands::dispatch(&manager, &raw, &sender).await {
                warn!("Reply to {} dropped: {}", peer, e);
            }
        });
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut receiver: UnboundedReceiver<OutboundMessage>, peer: SocketAddr) {
    while let Some(message) = receiver.recv().await {
        if let Err(e) = writer.write_all(message.to_line().as_bytes()).await {
            error!("Error writing to {}: {}", peer, e);
            break;
        }
        debug!("SENT: [{}]", message);
    }
}
