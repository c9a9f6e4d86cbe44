//! WS2812 strip driven straight from the RMT peripheral

use esp_hal::gpio::Level;
use esp_hal::rmt::{PulseCode, TxChannel};
use heapless::Vec;
use presence_board::config::LED_COUNT;
use presence_board::led_control::{LedStrip, grb_bytes};
use smart_leds::RGB8;

/// 24 bit pulses per pixel plus the reset pulse
const MAX_PULSES: usize = LED_COUNT * 24 + 1;

#[derive(Debug)]
pub enum StripError {
    /// Channel lost by an earlier failed transmit
    NoChannel,
    TooManyPixels,
    Transmit(esp_hal::rmt::Error),
}

/// LED strip on one RMT TX channel, clocked at 10MHz
pub struct RmtStrip<TX>
where
    TX: TxChannel,
{
    channel: Option<TX>,
}

impl<TX> RmtStrip<TX>
where
    TX: TxChannel,
{
    pub fn new(channel: TX) -> Self {
        Self {
            channel: Some(channel),
        }
    }
}

impl<TX> LedStrip for RmtStrip<TX>
where
    TX: TxChannel,
{
    type Error = StripError;

    fn write(&mut self, pixels: &[RGB8]) -> Result<(), StripError> {
        let mut pulses: Vec<u32, MAX_PULSES> = Vec::new();
        for byte in grb_bytes(pixels) {
            pulses
                .extend_from_slice(&byte_to_pulses(byte))
                .map_err(|_| StripError::TooManyPixels)?;
        }

        // Reset: hold low for 50us
        pulses
            .push(PulseCode::new(Level::Low, 500, Level::Low, 0))
            .map_err(|_| StripError::TooManyPixels)?;

        let channel = self.channel.take().ok_or(StripError::NoChannel)?;
        match channel.transmit(&pulses) {
            Ok(transaction) => match transaction.wait() {
                Ok(channel) => {
                    self.channel = Some(channel);
                    Ok(())
                }
                Err((e, channel)) => {
                    self.channel = Some(channel);
                    Err(StripError::Transmit(e))
                }
            },
            Err(e) => Err(StripError::Transmit(e)),
        }
    }
}

/// Convert a single byte to RMT pulses, MSB first
/// WS2812 timing at 10MHz: 1-bit = 8 high + 4 low cycles, 0-bit = 4 high + 8 low cycles
fn byte_to_pulses(byte: u8) -> [u32; 8] {
    let mut pulses = [0u32; 8];

    for (i, pulse) in pulses.iter_mut().enumerate() {
        let bit = (byte >> (7 - i)) & 1;
        *pulse = if bit == 1 {
            PulseCode::new(Level::High, 8, Level::Low, 4)
        } else {
            PulseCode::new(Level::High, 4, Level::Low, 8)
        };
    }

    pulses
}
