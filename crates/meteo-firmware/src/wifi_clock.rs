//! Network time over Wi-Fi and SNTP.
//!
//! The radio is brought up on the first attempt of a wake and powered down
//! when the synchronization ends, so timer wakes that are not due for a sync
//! never pay for it. The retry policy's budget bounds the whole sync: an
//! attempt still connecting when it runs out is dropped and the radio
//! powered down.

use core::time::Duration;

use embassy_executor::Spawner;
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Runner, Stack, StackResources};
use embassy_time::with_timeout;
use esp_hal::peripherals::WIFI;
use esp_radio::Controller;
use esp_radio::wifi::{ClientConfig, Config as WifiConfig, ModeConfig, WifiController, WifiDevice};
use log::{debug, info, warn};
use meteo_core::clock_sync::{NetworkClock, SyncError};
use meteo_core::config::NetworkConfig;
use meteo_core::sntp;

use crate::mk_static;

const CONNECT_TIMEOUT: embassy_time::Duration = embassy_time::Duration::from_secs(10);
const DHCP_TIMEOUT: embassy_time::Duration = embassy_time::Duration::from_secs(10);
const REPLY_TIMEOUT: embassy_time::Duration = embassy_time::Duration::from_secs(3);

struct Link {
    controller: WifiController<'static>,
    stack: Stack<'static>,
}

pub struct WifiClock {
    network: NetworkConfig<'static>,
    spawner: Spawner,
    wifi: Option<WIFI<'static>>,
    seed: u64,
    link: Option<Link>,
}

impl WifiClock {
    pub fn new(
        network: NetworkConfig<'static>,
        spawner: Spawner,
        wifi: WIFI<'static>,
        seed: u64,
    ) -> Self {
        Self {
            network,
            spawner,
            wifi: Some(wifi),
            seed,
            link: None,
        }
    }

    /// Initialize the radio and network stack once per wake.
    fn link(&mut self) -> Result<&mut Link, SyncError> {
        if self.link.is_none() {
            let wifi = self.wifi.take().ok_or(SyncError::NotConnected)?;

            info!("Initializing Wi-Fi");
            let radio = esp_radio::init().map_err(|e| {
                warn!("Radio init failed: {:?}", e);
                SyncError::NotConnected
            })?;
            let radio = mk_static!(Controller<'static>, radio);

            let (mut controller, interfaces) =
                esp_radio::wifi::new(radio, wifi, WifiConfig::default()).map_err(|e| {
                    warn!("Wi-Fi init failed: {:?}", e);
                    SyncError::NotConnected
                })?;
            let client = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(self.network.ssid.into())
                    .with_password(self.network.password.into()),
            );
            controller.set_config(&client).map_err(|e| {
                warn!("Wi-Fi config rejected: {:?}", e);
                SyncError::NotConfigured
            })?;

            let (stack, runner) = embassy_net::new(
                interfaces.sta,
                embassy_net::Config::dhcpv4(Default::default()),
                mk_static!(StackResources<3>, StackResources::<3>::new()),
                self.seed,
            );
            self.spawner.spawn(net_task(runner)).ok();

            self.link = Some(Link { controller, stack });
        }
        self.link.as_mut().ok_or(SyncError::NotConnected)
    }
}

impl NetworkClock for WifiClock {
    async fn fetch_time(&mut self) -> Result<Duration, SyncError> {
        if !self.network.is_configured() {
            return Err(SyncError::NotConfigured);
        }
        let server = self.network.ntp_server;
        let link = self.link()?;

        if !matches!(link.controller.is_started(), Ok(true)) {
            link.controller.start_async().await.map_err(|e| {
                warn!("Wi-Fi start failed: {:?}", e);
                SyncError::NotConnected
            })?;
        }

        if !matches!(link.controller.is_connected(), Ok(true)) {
            match with_timeout(CONNECT_TIMEOUT, link.controller.connect_async()).await {
                Ok(Ok(())) => info!("Wi-Fi connected"),
                Ok(Err(e)) => {
                    warn!("Wi-Fi connect failed: {:?}", e);
                    return Err(SyncError::NotConnected);
                }
                Err(_) => return Err(SyncError::NotConnected),
            }
        }

        let stack = link.stack;
        if stack.config_v4().is_none() {
            with_timeout(DHCP_TIMEOUT, stack.wait_config_up())
                .await
                .map_err(|_| SyncError::NoAddress)?;
        }

        query_sntp(stack, server).await
    }

    async fn power_down(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if let Err(e) = link.controller.disconnect_async().await {
            debug!("Wi-Fi disconnect: {:?}", e);
        }
        if let Err(e) = link.controller.stop_async().await {
            warn!("Wi-Fi stop failed: {:?}", e);
        }
        info!("Wi-Fi stopped");
    }
}

async fn query_sntp(stack: Stack<'_>, server: &str) -> Result<Duration, SyncError> {
    let addresses = stack
        .dns_query(server, DnsQueryType::A)
        .await
        .map_err(|e| {
            warn!("DNS lookup of {} failed: {:?}", server, e);
            SyncError::Dns
        })?;
    let address = addresses.first().copied().ok_or(SyncError::Dns)?;

    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0u8; 128];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_buffer = [0u8; 128];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(0).map_err(|_| SyncError::NotConnected)?;

    debug!("SNTP request to {}", address);
    socket
        .send_to(&sntp::request(), IpEndpoint::new(address, sntp::NTP_PORT))
        .await
        .map_err(|_| SyncError::NotConnected)?;

    let mut reply = [0u8; sntp::PACKET_LEN];
    let (len, _) = with_timeout(REPLY_TIMEOUT, socket.recv_from(&mut reply))
        .await
        .map_err(|_| SyncError::Timeout)?
        .map_err(|_| SyncError::BadReply("receive failed"))?;
    sntp::parse_reply(&reply[..len])
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
