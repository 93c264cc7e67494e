use std::fmt::Debug;

/// Byte-addressed register access to a single peripheral.
///
/// Implementations own the bus address; callers only name registers.
pub trait RegisterBus {
    type Error: Debug;

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error>;

    /// Write the register address with a repeated start, then read one byte.
    fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error>;

    /// Read `buf.len()` consecutive bytes starting at `reg`.
    fn read_burst(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    type Error = B::Error;

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
        (**self).write_register(reg, value)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error> {
        (**self).read_register(reg)
    }

    fn read_burst(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_burst(reg, buf)
    }
}

/// Blocking pause primitive.
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

/// Returns immediately; for offline runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn delay_ms(&mut self, _ms: u32) {}
}

#[cfg(feature = "embedded-hal")]
pub use hal::{HalBus, HalDelay};

#[cfg(feature = "embedded-hal")]
mod hal {
    use super::{Delay, RegisterBus};
    use embedded_hal::{delay::DelayNs, i2c::I2c};

    /// [`RegisterBus`] over an `embedded-hal` I2C bus at a fixed 7-bit address.
    pub struct HalBus<I> {
        i2c: I,
        address: u8,
    }

    impl<I: I2c> HalBus<I> {
        pub fn new(i2c: I, address: u8) -> Self {
            Self { i2c, address }
        }

        pub fn release(self) -> I {
            self.i2c
        }
    }

    impl<I: I2c> RegisterBus for HalBus<I> {
        type Error = I::Error;

        fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
            self.i2c.write(self.address, &[reg, value])
        }

        fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error> {
            let mut val = [0u8];
            self.i2c.write_read(self.address, &[reg], &mut val)?;
            Ok(val[0])
        }

        fn read_burst(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
            self.i2c.write_read(self.address, &[reg], buf)
        }
    }

    /// [`Delay`] over an `embedded-hal` delay provider.
    pub struct HalDelay<D>(pub D);

    impl<D: DelayNs> Delay for HalDelay<D> {
        fn delay_ms(&mut self, ms: u32) {
            self.0.delay_ms(ms)
        }
    }
}

/// Bus double that records every transaction and answers reads from a script.
#[cfg(test)]
pub(crate) mod scripted {
    use super::{Delay, RegisterBus};
    use std::collections::VecDeque;

    /// Delay double that records requested pauses instead of sleeping.
    #[derive(Debug, Default)]
    pub struct RecordingDelay {
        pub calls: Vec<u32>,
    }

    impl Delay for RecordingDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.calls.push(ms);
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Op {
        Write(u8, u8),
        Read(u8),
        Burst(u8, usize),
    }

    #[derive(Debug, Default)]
    pub struct ScriptedBus {
        pub ops: Vec<Op>,
        reads: VecDeque<u8>,
        bursts: VecDeque<Vec<u8>>,
    }

    impl ScriptedBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn queue_read(&mut self, value: u8) -> &mut Self {
            self.reads.push_back(value);
            self
        }

        pub fn queue_burst(&mut self, bytes: &[u8]) -> &mut Self {
            self.bursts.push_back(bytes.to_vec());
            self
        }

        pub fn writes(&self) -> Vec<(u8, u8)> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Write(reg, val) => Some((*reg, *val)),
                    _ => None,
                })
                .collect()
        }
    }

    impl RegisterBus for ScriptedBus {
        type Error = std::convert::Infallible;

        fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
            self.ops.push(Op::Write(reg, value));
            Ok(())
        }

        fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error> {
            self.ops.push(Op::Read(reg));
            Ok(self.reads.pop_front().unwrap_or(0))
        }

        fn read_burst(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
            self.ops.push(Op::Burst(reg, buf.len()));
            let bytes = self.bursts.pop_front().unwrap_or_default();
            for (dst, src) in buf.iter_mut().zip(bytes) {
                *dst = src;
            }
            Ok(())
        }
    }
}
