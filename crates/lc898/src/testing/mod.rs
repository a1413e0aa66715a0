//! Testing infrastructure (device simulator, recording bus, delays).

pub(crate) mod bus;
pub(crate) mod mock;

pub(crate) use bus::{BusOp, MockI2c};
pub(crate) use mock::{MockDelay, MockInterface};
