#![no_std]
#![no_main]

use esp_hal::clock::CpuClock;
use esp_hal::gpio::Level;
use esp_hal::rmt::{Rmt, TxChannelConfig, TxChannelCreator};
use esp_hal::rng::Rng;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_println::println;

// Standard library imports
extern crate alloc;

// Embassy-net imports
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{Config, StackResources};
use esp_hal_embassy::Executor;
use esp_wifi::wifi::WifiDevice;
use static_cell::StaticCell;

use presence_board::mdns::MAX_MDNS_PACKET_SIZE;
use presence_board::{Board, DeviceConfig, run_cycle};

mod http;
mod led_control;
mod mdns;
mod power;
mod wifi;

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

/// Settings document embedded by build.rs
static SETTINGS: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/setting.json"));

type ConcreteChannel = esp_hal::rmt::Channel<esp_hal::Blocking, 0>;

type FirmwareBoard = Board<
    wifi::EspWifiLink,
    mdns::UdpDiscovery,
    http::ReqwlessClient,
    led_control::RmtStrip<ConcreteChannel>,
    embassy_time::Delay,
>;

// Static cells for embassy components
static WIFI_INIT_CELL: StaticCell<esp_wifi::EspWifiController<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static TCP_STATE: StaticCell<http::TcpState> = StaticCell::new();
static HTTP_RX_BUFFER: StaticCell<[u8; http::MAX_RESPONSE_SIZE]> = StaticCell::new();
static UDP_RX_META: StaticCell<[PacketMetadata; 8]> = StaticCell::new();
static UDP_TX_META: StaticCell<[PacketMetadata; 8]> = StaticCell::new();
static UDP_RX_BUFFER: StaticCell<[u8; MAX_MDNS_PACKET_SIZE]> = StaticCell::new();
static UDP_TX_BUFFER: StaticCell<[u8; MAX_MDNS_PACKET_SIZE]> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[PANIC] {}", info);
    esp_hal::system::software_reset()
}

// Embassy task to run the network stack
#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// One wake cycle, then sleep or restart
#[embassy_executor::task]
async fn cycle_task(config: DeviceConfig, mut board: FirmwareBoard, mut power: power::EspPower<'static>) -> ! {
    let report = run_cycle(&config, &mut board).await;
    if let Some(failure) = report.failure {
        log::warn!("[MAIN] Cycle failed: {}", failure);
    }
    report.terminal.apply(&mut power)
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Initialize heap allocator for WiFi (72KB)
    esp_alloc::heap_allocator!(size: 72 * 1024);

    println!("[MAIN] presence-board {}", presence_board::VERSION);
    let device_config = DeviceConfig::load(Some(SETTINGS));
    let power = power::EspPower::new(Rtc::new(peripherals.LPWR));

    // LED strip on RMT channel 0, 10MHz for WS2812 timing
    println!("[LED] Setting up GPIO pin {} for LED data...", presence_board::config::LED_DATA_PIN);
    let rmt = Rmt::new(peripherals.RMT, Rate::from_mhz(10)).expect("RMT initialization failed");
    let tx_config = TxChannelConfig::default()
        .with_clk_divider(1)
        .with_idle_output_level(Level::Low)
        .with_idle_output(false)
        .with_carrier_modulation(false);
    let rmt_channel = rmt
        .channel0
        .configure(peripherals.GPIO4, tx_config)
        .expect("RMT channel configuration failed");

    // Initialize embassy time system
    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    // Initialize WiFi driver
    let timer_group1 = TimerGroup::new(peripherals.TIMG1);
    let mut rng = Rng::new(peripherals.RNG);
    let wifi_init = WIFI_INIT_CELL.init(
        esp_wifi::init(timer_group1.timer0, rng.clone(), peripherals.RADIO_CLK)
            .expect("WiFi driver initialization failed"),
    );
    let (wifi_controller, wifi_interfaces) =
        esp_wifi::wifi::new(wifi_init, peripherals.WIFI).expect("WiFi controller creation failed");
    let wifi_device = wifi_interfaces.sta;
    let mac = wifi_device.mac_address();

    // DHCP stack: one TCP connection for InfluxDB, one UDP socket for mDNS, DNS for host names
    let seed = u64::from(rng.random()) << 32 | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        wifi_device,
        Config::dhcpv4(Default::default()),
        STACK_RESOURCES.init(StackResources::new()),
        seed,
    );

    let udp_socket = UdpSocket::new(
        stack,
        UDP_RX_META.init([PacketMetadata::EMPTY; 8]),
        UDP_RX_BUFFER.init([0; MAX_MDNS_PACKET_SIZE]),
        UDP_TX_META.init([PacketMetadata::EMPTY; 8]),
        UDP_TX_BUFFER.init([0; MAX_MDNS_PACKET_SIZE]),
    );

    let board = Board::new(
        wifi::EspWifiLink::new(wifi_controller, stack, mac),
        mdns::UdpDiscovery::new(stack, udp_socket),
        http::ReqwlessClient::new(
            stack,
            TCP_STATE.init(http::TcpState::new()),
            HTTP_RX_BUFFER.init([0; http::MAX_RESPONSE_SIZE]),
        ),
        led_control::RmtStrip::new(rmt_channel),
        embassy_time::Delay,
    );

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(net_task(runner)).ok();
        spawner.spawn(cycle_task(device_config, board, power)).ok();
    })
}
