//! Wifi station and MQTT session tasks.
//!
//! The wifi task keeps the station associated, the MQTT task opens a broker
//! session whenever the controller asks for one and then shuttles packets
//! between the TCP socket and the bridge channels until the socket dies.
extern crate alloc;

use alloc::string::String;
use core::net::Ipv4Addr;
use core::str::FromStr;
use core::sync::atomic::Ordering;

use anyhow::anyhow;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_io_async::Write;
use esp_wifi::wifi::{ClientConfiguration, WifiController, WifiDevice, WifiEvent, WifiState};
use log::{debug, error, info, warn};

use super::bridge::{Outbound, SessionRequest, INBOUND, MQTT_UP, OUTBOUND, SESSION_REQUEST, WIFI_UP};
use crate::config::{
    DEFAULT_RETRY_DELAY_MS, MAX_INBOUND_PACKET, MQTT_KEEP_ALIVE_SECS, MQTT_PORT, RX_BUF_SIZE,
    TX_BUF_SIZE,
};
use crate::link::mqtt::{self, Packet, PacketBuffer};
use crate::link::Inbound;

const READ_SLICE: Duration = Duration::from_millis(50);

#[embassy_executor::task]
pub async fn runner_task(mut runner: embassy_net::Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

pub fn configurate_wifi(wifi_controller: &mut WifiController<'_>) -> anyhow::Result<()> {
    let ssid = env!("WIFI_SSID");
    let password = env!("WIFI_PASS");
    let config = esp_wifi::wifi::Configuration::Client(ClientConfiguration {
        ssid: String::from_str(ssid).map_err(|_| anyhow!("bad ssid"))?,
        password: String::from_str(password).map_err(|_| anyhow!("bad password"))?,
        ..Default::default()
    });

    info!("Connecting to wifi: {ssid}");
    wifi_controller
        .set_configuration(&config)
        .map_err(|e| anyhow!("fail setting configuration of wifi controller: {e:?}"))?;
    wifi_controller
        .set_power_saving(esp_wifi::config::PowerSaveMode::None)
        .map_err(|e| anyhow!("fail setting wifi power mode: {e:?}"))?;
    Ok(())
}

/// Keeps the station associated, retrying forever.
#[embassy_executor::task]
pub async fn wifi_task(mut wifi_controller: WifiController<'static>) {
    if let Err(e) = configurate_wifi(&mut wifi_controller) {
        error!("[NET] {e}");
        return;
    }
    loop {
        if esp_wifi::wifi::wifi_state() == WifiState::StaConnected {
            wifi_controller
                .wait_for_event(WifiEvent::StaDisconnected)
                .await;
            warn!("[NET] wifi disconnected");
            // the MQTT task notices and ends its session
            WIFI_UP.store(false, Ordering::Release);
            Timer::after_millis(DEFAULT_RETRY_DELAY_MS).await;
        }
        if !matches!(wifi_controller.is_started(), Ok(true)) {
            if let Err(e) = wifi_controller.start_async().await {
                error!("[NET] could not start wifi: {e:?}");
                Timer::after_millis(DEFAULT_RETRY_DELAY_MS).await;
                continue;
            }
        }
        match wifi_controller.connect_async().await {
            Ok(()) => {
                if let Ok(rssi) = wifi_controller.rssi() {
                    info!("Wifi connected! signal: {}", rssi)
                }
                WIFI_UP.store(true, Ordering::Release);
            }
            Err(e) => {
                error!("An error occured trying to connect to wifi: {e:?}");
                Timer::after_millis(DEFAULT_RETRY_DELAY_MS).await;
            }
        }
    }
}

fn broker_endpoint() -> anyhow::Result<IpEndpoint> {
    let addr = Ipv4Addr::from_str(env!("MQTT_BROKER"))
        .map_err(|_| anyhow!("MQTT_BROKER must be an IPv4 address"))?;
    let port = match option_env!("MQTT_PORT") {
        Some(port) => u16::from_str(port).map_err(|_| anyhow!("bad MQTT_PORT"))?,
        None => MQTT_PORT,
    };
    Ok(IpEndpoint::new(addr.into(), port))
}

/// Waits for session requests from the controller and serves one broker
/// session at a time. Only this task writes `MQTT_UP`.
#[embassy_executor::task]
pub async fn mqtt_task(stack: Stack<'static>) {
    let mut rx_buf = [0u8; RX_BUF_SIZE];
    let mut tx_buf = [0u8; TX_BUF_SIZE];

    let endpoint = match broker_endpoint() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            error!("[NET] {e}");
            return;
        }
    };

    loop {
        let request = SESSION_REQUEST.wait().await;
        stack.wait_config_up().await;

        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
        socket.set_timeout(Some(Duration::from_secs(MQTT_KEEP_ALIVE_SECS as u64 * 2)));

        match open_session(&mut socket, endpoint, &request).await {
            Ok(()) => {
                MQTT_UP.store(true, Ordering::Release);
                // requests made while this session was opening are answered by it
                SESSION_REQUEST.reset();
                info!("[NET] broker session open at {endpoint}");
                if let Err(e) = serve_session(&mut socket).await {
                    warn!("[NET] session ended: {e}");
                }
            }
            Err(e) => error!("[NET] {e}"),
        }

        MQTT_UP.store(false, Ordering::Release);
        socket.abort();
        let _ = socket.flush().await;
        // stale traffic belongs to the dead session
        OUTBOUND.clear();
    }
}

async fn open_session(
    socket: &mut TcpSocket<'_>,
    endpoint: IpEndpoint,
    request: &SessionRequest,
) -> anyhow::Result<()> {
    socket
        .connect(endpoint)
        .await
        .map_err(|e| anyhow!("tcp connect to {endpoint} failed: {e:?}"))?;

    let connect = mqtt::connect(
        &request.client_id,
        request.credentials.as_ref(),
        MQTT_KEEP_ALIVE_SECS,
    );
    socket
        .write_all(&connect)
        .await
        .map_err(|e| anyhow!("write CONNECT: {e:?}"))?;

    let mut buf = [0u8; 16];
    let mut len = 0;
    loop {
        let n = socket
            .read(&mut buf[len..])
            .await
            .map_err(|e| anyhow!("read CONNACK: {e:?}"))?;
        if n == 0 {
            return Err(anyhow!("broker closed the connection"));
        }
        len += n;
        match mqtt::decode(&buf[..len]).map_err(|e| anyhow!("{e}"))? {
            Some((Packet::ConnAck { return_code: 0, .. }, _)) => return Ok(()),
            Some((Packet::ConnAck { return_code, .. }, _)) => {
                return Err(anyhow!("broker refused the session (code {return_code})"))
            }
            Some((other, _)) => return Err(anyhow!("expected CONNACK, got {other:?}")),
            None if len == buf.len() => return Err(anyhow!("CONNACK too long")),
            None => {}
        }
    }
}

async fn serve_session(socket: &mut TcpSocket<'_>) -> anyhow::Result<()> {
    let keep_alive = Duration::from_secs(MQTT_KEEP_ALIVE_SECS as u64 / 2);
    let mut last_write = Instant::now();
    let mut packet_id: u16 = 0;
    let mut packets = PacketBuffer::new(MAX_INBOUND_PACKET);
    let mut chunk = [0u8; RX_BUF_SIZE];

    loop {
        // the socket may outlive a short wifi drop, the session must not
        if !WIFI_UP.load(Ordering::Acquire) {
            return Err(anyhow!("wifi went down"));
        }
        if SESSION_REQUEST.signaled() {
            return Err(anyhow!("controller asked for a new session"));
        }

        while let Ok(out) = OUTBOUND.try_receive() {
            let bytes = match out {
                Outbound::Subscribe(topic) => {
                    packet_id = packet_id.wrapping_add(1).max(1);
                    info!("[NET] subscribing to {topic}");
                    mqtt::subscribe(packet_id, &topic)
                }
                Outbound::Publish { topic, payload } => {
                    debug!("[NET] publish {topic}");
                    mqtt::publish(&topic, &payload)
                }
            };
            socket
                .write_all(&bytes)
                .await
                .map_err(|e| anyhow!("write: {e:?}"))?;
            last_write = Instant::now();
        }

        if last_write.elapsed() >= keep_alive {
            socket
                .write_all(&mqtt::pingreq())
                .await
                .map_err(|e| anyhow!("ping: {e:?}"))?;
            last_write = Instant::now();
        }

        let n = match with_timeout(READ_SLICE, socket.read(&mut chunk)).await {
            Err(_) => continue,
            Ok(Ok(0)) => return Err(anyhow!("broker closed the connection")),
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(anyhow!("read: {e:?}")),
        };
        packets.extend(&chunk[..n]);

        let mut rejected = false;
        packets
            .drain(|packet| match packet {
                Packet::Publish { topic, payload } => {
                    if INBOUND.try_send(Inbound::new(topic, payload)).is_err() {
                        warn!("[NET] inbound queue full, message on {topic} dropped");
                    }
                }
                Packet::SubAck { granted_qos: 0x80, .. } => rejected = true,
                Packet::PingResp | Packet::SubAck { .. } => {}
                other => debug!("[NET] ignoring {other:?}"),
            })
            .map_err(|e| anyhow!("{e}"))?;
        if rejected {
            return Err(anyhow!("broker rejected the subscription"));
        }
    }
}
