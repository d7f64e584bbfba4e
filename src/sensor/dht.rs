//! DHT11/DHT12/DHT22 single-wire protocol.
//!
//! A transmission is 40 bits: two humidity bytes, two temperature bytes and
//! a checksum byte. Frame decoding is pure; the GPIO driver that captures the
//! bits is only compiled with the `gpio` feature.

use super::{Measurement, SensorKind};
use crate::error::SensorError;

/// Number of bytes in one sensor transmission.
pub const FRAME_LEN: usize = 5;

/// Decodes a raw transmission into a measurement.
pub fn decode_frame(kind: SensorKind, frame: [u8; FRAME_LEN]) -> Result<Measurement, SensorError> {
    let expected = frame[..4]
        .iter()
        .fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    if expected != frame[4] {
        return Err(SensorError::Checksum {
            expected,
            actual: frame[4],
        });
    }

    // An all-zero frame passes the checksum but means the line never toggled
    if frame == [0; FRAME_LEN] {
        return Err(SensorError::Timeout("data bits (empty frame)"));
    }

    let (humidity, temperature) = match kind {
        SensorKind::Dht11 => (
            frame[0] as f32 + frame[1] as f32 / 10.0,
            frame[2] as f32 + frame[3] as f32 / 10.0,
        ),
        SensorKind::Dht12 => {
            let humidity = frame[0] as f32 + frame[1] as f32 / 10.0;
            let temperature = frame[2] as f32 + (frame[3] & 0x7F) as f32 / 10.0;
            let sign = if frame[3] & 0x80 != 0 { -1.0 } else { 1.0 };
            (humidity, sign * temperature)
        }
        SensorKind::Dht22 => {
            let humidity = u16::from_be_bytes([frame[0], frame[1]]) as f32 / 10.0;
            let temperature = u16::from_be_bytes([frame[2] & 0x7F, frame[3]]) as f32 / 10.0;
            let sign = if frame[2] & 0x80 != 0 { -1.0 } else { 1.0 };
            (humidity, sign * temperature)
        }
    };

    if !(0.0..=100.0).contains(&humidity) || !(-40.0..=125.0).contains(&temperature) {
        return Err(SensorError::OutOfRange {
            temperature,
            humidity,
        });
    }

    Ok(Measurement {
        temperature,
        humidity,
    })
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use crate::sensor::Sensor;
    use rppal::gpio::{Gpio, IoPin, Mode};
    use std::thread;
    use std::time::{Duration, Instant};

    /// Upper bound for any single line phase of the protocol.
    const PHASE_TIMEOUT: Duration = Duration::from_micros(120);
    /// High pulses longer than this encode a 1 bit (0 is ~27µs, 1 is ~70µs).
    const ONE_BIT_THRESHOLD: Duration = Duration::from_micros(45);

    /// Bit-banged DHT driver on a Raspberry Pi GPIO line.
    pub struct DhtSensor {
        kind: SensorKind,
        pin: IoPin,
    }

    impl DhtSensor {
        /// Claims the BCM `pin` for the sensor.
        pub fn open(kind: SensorKind, pin: u8) -> Result<Self, SensorError> {
            let gpio = Gpio::new()
                .map_err(|e| SensorError::Gpio(format!("Failed to initialize GPIO: {}", e)))?;
            let pin = gpio
                .get(pin)
                .map_err(|e| SensorError::Gpio(format!("Failed to access pin {}: {}", pin, e)))?
                .into_io(Mode::Input);
            Ok(Self { kind, pin })
        }

        /// Busy-waits while the line stays at `high` and returns how long it did.
        fn wait_while(&self, high: bool, phase: &'static str) -> Result<Duration, SensorError> {
            let start = Instant::now();
            while self.pin.is_high() == high {
                if start.elapsed() > PHASE_TIMEOUT {
                    return Err(SensorError::Timeout(phase));
                }
            }
            Ok(start.elapsed())
        }

        fn read_frame(&mut self) -> Result<[u8; FRAME_LEN], SensorError> {
            // Start signal: hold low, release, then listen
            self.pin.set_mode(Mode::Output);
            self.pin.set_low();
            thread::sleep(self.kind.start_signal());
            self.pin.set_high();
            self.pin.set_mode(Mode::Input);

            self.wait_while(true, "sensor response")?;
            self.wait_while(false, "response low phase")?;
            self.wait_while(true, "response high phase")?;

            let mut frame = [0u8; FRAME_LEN];
            for bit in 0..FRAME_LEN * 8 {
                self.wait_while(false, "bit start")?;
                let high = self.wait_while(true, "bit value")?;
                frame[bit / 8] <<= 1;
                if high > ONE_BIT_THRESHOLD {
                    frame[bit / 8] |= 1;
                }
            }
            Ok(frame)
        }
    }

    impl Sensor for DhtSensor {
        fn kind(&self) -> SensorKind {
            self.kind
        }

        fn read(&mut self) -> Result<Measurement, SensorError> {
            let frame = self.read_frame()?;
            decode_frame(self.kind, frame)
        }
    }
}

#[cfg(not(feature = "gpio"))]
mod unsupported {
    use super::*;
    use crate::sensor::Sensor;

    /// Placeholder used when the crate is built without GPIO support.
    pub struct DhtSensor {
        kind: SensorKind,
    }

    impl DhtSensor {
        pub fn open(kind: SensorKind, _pin: u8) -> Result<Self, SensorError> {
            Err(SensorError::Unavailable(format!(
                "{} over GPIO requires building with the `gpio` feature",
                kind
            )))
        }
    }

    impl Sensor for DhtSensor {
        fn kind(&self) -> SensorKind {
            self.kind
        }

        fn read(&mut self) -> Result<Measurement, SensorError> {
            Err(SensorError::Unavailable("GPIO support not compiled in".into()))
        }
    }
}

#[cfg(feature = "gpio")]
pub use raspberry_pi::DhtSensor;
#[cfg(not(feature = "gpio"))]
pub use unsupported::DhtSensor;
