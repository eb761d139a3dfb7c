//! Raspberry Pi backend: GPIO direction lines and an MCP3008 position ADC.
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;

use hand_traits::{AnalogInput, BoxError, LinePair};

use crate::error::{HwError, Result};

/// One actuator's pair of direction outputs.
pub struct RpiLinePair {
    upper: OutputPin,
    lower: OutputPin,
}

impl RpiLinePair {
    /// Claim both pins as outputs, driven low.
    pub fn new(upper_pin: u8, lower_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let upper = gpio
            .get(upper_pin)
            .map_err(|e| HwError::Gpio(format!("open pin {upper_pin}: {e}")))?
            .into_output_low();
        let lower = gpio
            .get(lower_pin)
            .map_err(|e| HwError::Gpio(format!("open pin {lower_pin}: {e}")))?
            .into_output_low();
        Ok(Self { upper, lower })
    }
}

impl LinePair for RpiLinePair {
    fn set_levels(&mut self, upper: bool, lower: bool) -> std::result::Result<(), BoxError> {
        if upper && lower {
            return Err(Box::new(HwError::Gpio(
                "refusing to raise both direction lines".into(),
            )));
        }
        // Lower first so the pair never passes through both-high.
        if !upper {
            self.upper.set_low();
        }
        if !lower {
            self.lower.set_low();
        }
        if upper {
            self.upper.set_high();
        }
        if lower {
            self.lower.set_high();
        }
        Ok(())
    }

    fn levels(&self) -> std::result::Result<(bool, bool), BoxError> {
        Ok((self.upper.is_set_high(), self.lower.is_set_high()))
    }
}

impl Drop for RpiLinePair {
    fn drop(&mut self) {
        self.upper.set_low();
        self.lower.set_low();
    }
}

/// MCP3008 10-bit ADC on SPI0.
pub struct Mcp3008 {
    spi: Spi,
}

impl Mcp3008 {
    pub fn new(slave: u8, clock_hz: u32) -> Result<Self> {
        let ss = match slave {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            other => return Err(HwError::Spi(format!("unsupported chip select {other}"))),
        };
        let spi = Spi::new(Bus::Spi0, ss, clock_hz, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi })
    }
}

impl AnalogInput for Mcp3008 {
    fn read_raw(&mut self, channel: u8) -> std::result::Result<u16, BoxError> {
        if channel > 7 {
            return Err(Box::new(HwError::Channel(channel)));
        }
        // Start bit, single-ended + channel, then clock out 10 bits.
        let tx = [0x01, (0x08 | channel) << 4, 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        let raw = (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]);
        trace!(channel, raw, "mcp3008 sample");
        Ok(raw)
    }
}
