//! Terminal power actions

use core::time::Duration;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;
use presence_board::state_machine::PowerControl;

pub struct EspPower<'d> {
    rtc: Rtc<'d>,
}

impl<'d> EspPower<'d> {
    pub fn new(rtc: Rtc<'d>) -> Self {
        Self { rtc }
    }
}

impl PowerControl for EspPower<'_> {
    fn deep_sleep(&mut self, wake_after: Duration) -> ! {
        let timer = TimerWakeupSource::new(wake_after);
        self.rtc.sleep_deep(&[&timer])
    }

    fn restart(&mut self) -> ! {
        esp_hal::system::software_reset()
    }
}
