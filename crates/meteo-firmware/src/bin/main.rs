#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::time::Duration;

use embassy_executor::Spawner;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::RtcPinWithResistors;
use esp_hal::peripherals::GPIO27;
use esp_hal::rng::Rng;
use esp_hal::rtc_cntl::sleep::{Ext0WakeupSource, TimerWakeupSource, WakeupLevel};
use esp_hal::rtc_cntl::{Rtc, wakeup_cause};
use esp_hal::system::SleepSource;
use esp_hal::timer::timg::TimerGroup;
use log::info;
use meteo_core::config::LoggerConfig;
use meteo_core::retained::RetainedSlot;
use meteo_core::wake::{Logger, WakeCause};
use meteo_firmware::board::{self, BATCH_LEN, BoardPeripherals};
use rtt_target::rprintln;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Shortest timer the chip is put to sleep with.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Logger state, kept in RTC fast memory across deep sleep.
#[esp_hal::ram(unstable(rtc_fast))]
static mut RETAINED: RetainedSlot<BATCH_LEN> = RetainedSlot::vacant();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let cause = match wakeup_cause() {
        SleepSource::Ext0 => WakeCause::Button,
        SleepSource::Timer => WakeCause::Timer,
        _ => WakeCause::ColdBoot,
    };

    // SAFETY: `RETAINED` is only ever accessed here, once per boot, before
    // any task that could observe it is spawned.
    let slot = unsafe { &mut *(&raw mut RETAINED) };
    let (cause, state) = slot.resume(cause);

    let seed = u64::from(Rng::new().random());
    let devices = board::bring_up(
        BoardPeripherals {
            rtc: Rtc::new(peripherals.LPWR),
            dht: [
                peripherals.GPIO16.into(),
                peripherals.GPIO17.into(),
                peripherals.GPIO33.into(),
                peripherals.GPIO26.into(),
            ],
            i2c: peripherals.I2C0,
            sda: peripherals.GPIO21,
            scl: peripherals.GPIO22,
            spi: peripherals.SPI2,
            sck: peripherals.GPIO18,
            mosi: peripherals.GPIO23,
            miso: peripherals.GPIO19,
            sd_cs: peripherals.GPIO5,
            led: peripherals.GPIO2,
            wifi: peripherals.WIFI,
        },
        spawner,
        seed,
        state.error_latched,
    );

    let mut logger = Logger::new(LoggerConfig::DEFAULT, devices);
    let outcome = logger.wake(cause, state).await;
    info!(
        "{:?} wake done, error latched: {}",
        outcome.cause, outcome.error_latched
    );

    let mut rtc = logger.into_devices().clock.into_rtc();
    enter_deep_sleep(&mut rtc, peripherals.GPIO27, outcome.sleep_for)
}

/// Sleep until `sleep_for` has passed or the screen button is pressed.
fn enter_deep_sleep(rtc: &mut Rtc<'_>, button: GPIO27<'static>, sleep_for: Duration) -> ! {
    let sleep_for = sleep_for.max(MIN_SLEEP);
    info!("Sleeping for {} ms", sleep_for.as_millis());

    let timer = TimerWakeupSource::new(sleep_for);

    // The button pulls the line high; keep it from floating meanwhile.
    button.rtcio_pullup(false);
    button.rtcio_pulldown(true);
    let ext0 = Ext0WakeupSource::new(button, WakeupLevel::High);

    rtc.sleep_deep(&[&timer, &ext0])
}
