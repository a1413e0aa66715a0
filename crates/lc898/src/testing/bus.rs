extern crate std;

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, Operation};

/// One recorded I2C operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BusOp {
    Write(Vec<u8>),
    Read(usize),
}

/// I2C bus that records every transaction and answers reads from a queue.
#[derive(Default, Debug)]
pub(crate) struct MockI2c {
    transactions: Vec<(u8, Vec<BusOp>)>,
    read_data: VecDeque<u8>,
    fail: bool,
}

impl MockI2c {
    pub(crate) fn with_read_data(mut self, bytes: &[u8]) -> Self {
        self.read_data.extend(bytes.iter().copied());
        self
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn transactions(&self) -> &[(u8, Vec<BusOp>)] {
        &self.transactions
    }
}

impl ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl I2c for MockI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail {
            return Err(ErrorKind::Bus);
        }
        let mut recorded = Vec::new();
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => recorded.push(BusOp::Write(bytes.to_vec())),
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = self.read_data.pop_front().unwrap_or(0);
                    }
                    recorded.push(BusOp::Read(buffer.len()));
                }
            }
        }
        self.transactions.push((address, recorded));
        Ok(())
    }
}
