//! Modbus value source (TCP or RTU/serial).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_modbus::client::{Client, Context, Reader};
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

use crate::catalog::RegisterDescriptor;
use crate::config::{ConnectionConfig, DeviceConfig};
use crate::source::{
    ConnectionError, RegistrationError, SourceListener, TransportError, ValueSource,
};

/// Largest number of holding registers a single Modbus read may request.
pub const MAX_READ_WORDS: u16 = 125;

#[derive(Debug, Clone)]
struct Scheduled {
    wire_address: u16,
    register: Arc<RegisterDescriptor>,
}

impl Scheduled {
    fn end(&self) -> u32 {
        u32::from(self.wire_address) + u32::from(self.register.length)
    }
}

/// Polls holding registers from a single Modbus device.
pub struct ModbusSource {
    device: DeviceConfig,
    registers: Vec<Scheduled>,
    interval: Duration,
    context: Option<Context>,
    task: Option<JoinHandle<()>>,
}

impl ModbusSource {
    /// Create a source for a device. Nothing is opened until [`ValueSource::connect`].
    pub fn new(device: DeviceConfig) -> Self {
        let interval = device.poll_interval();
        Self {
            device,
            registers: Vec::new(),
            interval,
            context: None,
            task: None,
        }
    }

    /// Address on the wire for a configured register address.
    fn wire_address(&self, register: &RegisterDescriptor) -> Result<u16, RegistrationError> {
        if self.device.zero_based {
            return Ok(register.address);
        }
        register
            .address
            .checked_sub(1)
            .ok_or_else(|| RegistrationError::InvalidAddress {
                name: register.name.clone(),
                address: register.address,
            })
    }
}

impl ValueSource for ModbusSource {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        let ctx = connect(&self.device).await?;
        info!(
            device = %describe(&self.device.connection),
            unit_id = self.device.unit_id,
            "Connected to Modbus device"
        );
        self.context = Some(ctx);
        Ok(())
    }

    fn register_poll(
        &mut self,
        register: Arc<RegisterDescriptor>,
    ) -> Result<(), RegistrationError> {
        if register.length > MAX_READ_WORDS {
            return Err(RegistrationError::TooLong {
                name: register.name.clone(),
                length: register.length,
                max: MAX_READ_WORDS,
            });
        }

        let scheduled = Scheduled {
            wire_address: self.wire_address(&register)?,
            register,
        };

        if scheduled.register.length == 0 || scheduled.end() > 0x1_0000 {
            return Err(RegistrationError::OutOfRange {
                name: scheduled.register.name.clone(),
                address: scheduled.register.address,
                length: scheduled.register.length,
            });
        }

        if let Some(other) = self.registers.iter().find(|s| {
            u32::from(scheduled.wire_address) < s.end()
                && u32::from(s.wire_address) < scheduled.end()
        }) {
            return Err(RegistrationError::Overlap {
                name: scheduled.register.name.clone(),
                other: other.register.name.clone(),
            });
        }

        self.registers.push(scheduled);
        Ok(())
    }

    fn set_poll_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    fn start(&mut self, listener: Arc<dyn SourceListener>) {
        if self.task.is_some() {
            warn!("Modbus polling already started");
            return;
        }

        info!(
            registers = self.registers.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Starting Modbus polling"
        );

        self.task = Some(tokio::spawn(poll_loop(
            self.context.take(),
            self.device.clone(),
            self.registers.clone(),
            self.interval,
            listener,
        )));
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // The task owns the connection; it is dropped with the task.
            let _ = task.await;
            info!("Modbus polling stopped");
        }

        if let Some(mut ctx) = self.context.take() {
            if let Err(e) = ctx.disconnect().await {
                debug!("Error disconnecting from Modbus device: {}", e);
            }
        }
    }
}

fn describe(connection: &ConnectionConfig) -> String {
    match connection {
        ConnectionConfig::Tcp { host, port } => format!("tcp://{}:{}", host, port),
        ConnectionConfig::Rtu {
            port, baud_rate, ..
        } => format!("rtu://{}@{}", port, baud_rate),
    }
}

/// Open a Modbus connection to the device.
async fn connect(device: &DeviceConfig) -> Result<Context, ConnectionError> {
    let slave = Slave(device.unit_id);
    let target = describe(&device.connection);

    match &device.connection {
        ConnectionConfig::Tcp { host, port } => {
            let addr = tokio::net::lookup_host((host.as_str(), *port))
                .await
                .map_err(|e| ConnectionError::Address(format!("{}: {}", target, e)))?
                .next()
                .ok_or_else(|| ConnectionError::Address(format!("{}: no address", target)))?;

            tokio::time::timeout(device.timeout(), tcp::connect_slave(addr, slave))
                .await
                .map_err(|_| ConnectionError::Timeout {
                    target: target.clone(),
                })?
                .map_err(|e| ConnectionError::Failed {
                    target,
                    message: e.to_string(),
                })
        }
        ConnectionConfig::Rtu {
            port,
            baud_rate,
            data_bits,
            parity,
            stop_bits,
        } => {
            let parity = match parity.to_lowercase().as_str() {
                "even" => tokio_serial::Parity::Even,
                "odd" => tokio_serial::Parity::Odd,
                _ => tokio_serial::Parity::None,
            };

            let stop_bits = match stop_bits {
                2 => tokio_serial::StopBits::Two,
                _ => tokio_serial::StopBits::One,
            };

            let data_bits = match data_bits {
                5 => tokio_serial::DataBits::Five,
                6 => tokio_serial::DataBits::Six,
                7 => tokio_serial::DataBits::Seven,
                _ => tokio_serial::DataBits::Eight,
            };

            let builder = tokio_serial::new(port, *baud_rate)
                .parity(parity)
                .stop_bits(stop_bits)
                .data_bits(data_bits)
                .timeout(device.timeout());

            let serial =
                tokio_serial::SerialStream::open(&builder).map_err(|e| ConnectionError::Failed {
                    target,
                    message: e.to_string(),
                })?;

            Ok(rtu::attach_slave(serial, slave))
        }
    }
}

/// Poll every register once per interval until aborted.
async fn poll_loop(
    mut ctx: Option<Context>,
    device: DeviceConfig,
    registers: Vec<Scheduled>,
    interval: Duration,
    listener: Arc<dyn SourceListener>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if ctx.is_none() {
            match connect(&device).await {
                Ok(new_ctx) => {
                    info!("Reconnected to Modbus device");
                    ctx = Some(new_ctx);
                }
                Err(e) => {
                    listener.on_error(&TransportError::Reconnect(e));
                    continue;
                }
            }
        }
        let Some(context) = ctx.as_mut() else {
            continue;
        };

        let mut lost = false;
        for scheduled in &registers {
            match read(context, scheduled, &device).await {
                Ok(words) => listener.on_value(&scheduled.register, &words_to_bytes(&words)),
                Err(e) => {
                    lost = e.is_connection_lost();
                    listener.on_error(&e);
                    if lost {
                        break;
                    }
                }
            }
        }

        if lost {
            warn!("Dropping Modbus connection, will reconnect next cycle");
            ctx = None;
        }
    }
}

/// Read one register, retrying timed out requests.
async fn read(
    ctx: &mut Context,
    scheduled: &Scheduled,
    device: &DeviceConfig,
) -> Result<Vec<u16>, TransportError> {
    let register = &scheduled.register;
    let attempts = device.retries + 1;

    for attempt in 1..=attempts {
        let request = ctx.read_holding_registers(scheduled.wire_address, register.length);
        match tokio::time::timeout(device.timeout(), request).await {
            Err(_) => {
                debug!(register = %register.name, attempt, "Read timed out");
            }
            Ok(Err(e)) => {
                return Err(TransportError::Read {
                    register: register.name.clone(),
                    message: e.to_string(),
                });
            }
            Ok(Ok(Err(exception))) => {
                return Err(TransportError::Exception {
                    register: register.name.clone(),
                    exception: format!("{:?}", exception),
                });
            }
            Ok(Ok(Ok(words))) => return Ok(words),
        }
    }

    Err(TransportError::Timeout {
        register: register.name.clone(),
        attempts,
    })
}

/// Flatten 16-bit words into wire-order bytes.
pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}
