//! Hardware links to the bulbs.
//!
//! A [`Connector`] opens one [`Link`] per device address. The orchestrator
//! never talks to the BLE stack directly; it only writes characteristic
//! values through a link and drops the link when anything goes wrong.
//! `BleConnector` (feature `ble`) is the hardware implementation.

use uuid::Uuid;

use crate::errors::Error;
use crate::runtime::BoxFuture;

type Result<T> = std::result::Result<T, Error>;

/// An open connection to one device.
pub trait Link: Send {
    /// Write `value` to the GATT characteristic `characteristic`.
    fn write<'a>(&'a mut self, characteristic: Uuid, value: &'a [u8]) -> BoxFuture<'a, Result<()>>;

    /// Close the connection.
    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Opens links to devices by hardware address.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<Box<dyn Link>>>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory connector recording every write.

    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::runtime;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Connect(String),
        Write(String, Uuid, Vec<u8>),
        Disconnect(String),
    }

    #[derive(Default)]
    struct State {
        events: Vec<Event>,
        unreachable: HashSet<String>,
        failing_writes: usize,
        write_delay: Duration,
    }

    #[derive(Clone, Default)]
    pub struct MockConnector {
        state: Arc<Mutex<State>>,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<Event> {
            self.state.lock().unwrap().events.clone()
        }

        pub fn writes_to(&self, address: &str) -> Vec<Vec<u8>> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Write(a, _, value) if a == address => Some(value),
                    _ => None,
                })
                .collect()
        }

        pub fn set_unreachable(&self, address: &str, unreachable: bool) {
            let mut state = self.state.lock().unwrap();
            if unreachable {
                state.unreachable.insert(address.to_string());
            } else {
                state.unreachable.remove(address);
            }
        }

        /// Make the next `count` writes fail, whatever the device.
        pub fn fail_next_writes(&self, count: usize) {
            self.state.lock().unwrap().failing_writes = count;
        }

        /// Make every write take `delay` before it lands.
        pub fn set_write_delay(&self, delay: Duration) {
            self.state.lock().unwrap().write_delay = delay;
        }
    }

    struct MockLink {
        address: String,
        state: Arc<Mutex<State>>,
    }

    impl Connector for MockConnector {
        fn connect<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<Box<dyn Link>>> {
            Box::pin(async move {
                let mut state = self.state.lock().unwrap();
                if state.unreachable.contains(address) {
                    return Err(Error::connection(address, "out of range"));
                }
                state.events.push(Event::Connect(address.to_string()));
                Ok(Box::new(MockLink {
                    address: address.to_string(),
                    state: Arc::clone(&self.state),
                }) as Box<dyn Link>)
            })
        }
    }

    impl Link for MockLink {
        fn write<'a>(
            &'a mut self,
            characteristic: Uuid,
            value: &'a [u8],
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                let delay = self.state.lock().unwrap().write_delay;
                if !delay.is_zero() {
                    runtime::sleep(delay).await;
                }
                let mut state = self.state.lock().unwrap();
                if state.failing_writes > 0 {
                    state.failing_writes -= 1;
                    return Err(Error::connection(&self.address, "write rejected"));
                }
                state.events.push(Event::Write(
                    self.address.clone(),
                    characteristic,
                    value.to_vec(),
                ));
                Ok(())
            })
        }

        fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                self.state
                    .lock()
                    .unwrap()
                    .events
                    .push(Event::Disconnect(self.address.clone()));
                Ok(())
            })
        }
    }
}
