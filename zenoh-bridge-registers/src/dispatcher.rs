//! Turns raw poll results into published values.

use std::sync::Arc;

use regbridge_common::data_topic;
use regbridge_framework::Sink;
use tracing::{error, trace, warn};

use crate::catalog::RegisterDescriptor;
use crate::source::{SourceListener, TransportError};

/// Decodes, transforms and publishes every value the source reports.
///
/// Failures are logged and the value is dropped; nothing here ever stops
/// polling.
pub struct Dispatcher<S: Sink> {
    sink: Arc<S>,
    data_prefix: String,
}

impl<S: Sink> Dispatcher<S> {
    pub fn new(sink: Arc<S>, data_prefix: impl Into<String>) -> Self {
        Self {
            sink,
            data_prefix: data_prefix.into(),
        }
    }

    /// Decode and transform a poll, returning the payload to publish.
    pub fn render(&self, register: &RegisterDescriptor, raw: &[u8]) -> Option<String> {
        let value = match register.decode(raw) {
            Ok(v) => v,
            Err(e) => {
                error!(register = %register.name, "Failed to decode value: {}", e);
                return None;
            }
        };

        match register.transform.evaluate(value) {
            Ok(v) => Some(register.format_value(v)),
            Err(e) => {
                error!(register = %register.name, "{}", e);
                None
            }
        }
    }
}

impl<S: Sink> SourceListener for Dispatcher<S> {
    fn on_value(&self, register: &RegisterDescriptor, raw: &[u8]) {
        let Some(payload) = self.render(register, raw) else {
            return;
        };

        let topic = data_topic(&self.data_prefix, &register.name);
        trace!(%topic, %payload, "Publishing");
        self.sink.publish(&topic, payload);
    }

    fn on_error(&self, error: &TransportError) {
        warn!("Poll failed: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RegisterDefinition, ValueType, WordOrder};
    use regbridge_framework::MemorySink;

    fn register(name: &str, value_type: ValueType, length: u16, transform: &str) -> RegisterDescriptor {
        RegisterDescriptor::from_definition(&RegisterDefinition {
            name: name.to_string(),
            address: 0,
            length,
            value_type,
            transform: transform.to_string(),
            word_order: WordOrder::Big,
            signed: true,
        })
        .unwrap()
    }

    fn dispatcher() -> (Arc<MemorySink>, Dispatcher<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Dispatcher::new(sink.clone(), "plant/line1");
        (sink, dispatcher)
    }

    #[test]
    fn test_float_is_transformed() {
        let (sink, dispatcher) = dispatcher();
        let temperature = register("temperature", ValueType::Float, 2, "_ * 2");

        dispatcher.on_value(&temperature, &[0x41, 0x48, 0x00, 0x00]);

        assert_eq!(
            sink.published(),
            vec![("plant/line1/temperature".to_string(), "25.0".to_string())]
        );
    }

    #[test]
    fn test_integer_identity() {
        let (sink, dispatcher) = dispatcher();
        let status = register("status", ValueType::Integer, 1, "_");

        dispatcher.on_value(&status, &[0x00, 0x01]);

        assert_eq!(sink.published_to("plant/line1/status"), vec!["1"]);
    }

    #[test]
    fn test_decode_failure_does_not_stop_later_values() {
        let (sink, dispatcher) = dispatcher();
        let pressure = register("pressure", ValueType::Float, 2, "_");

        dispatcher.on_value(&pressure, &[0x41, 0x48]);
        assert!(sink.published().is_empty());

        dispatcher.on_value(&pressure, &12.5f32.to_be_bytes());
        assert_eq!(sink.published_to("plant/line1/pressure"), vec!["12.5"]);
    }

    #[test]
    fn test_non_finite_result_is_dropped() {
        let (sink, dispatcher) = dispatcher();
        let ratio = register("ratio", ValueType::Integer, 1, "1 / _");

        dispatcher.on_value(&ratio, &[0x00, 0x00]);
        assert!(sink.published().is_empty());

        dispatcher.on_value(&ratio, &[0x00, 0x04]);
        assert_eq!(sink.published_to("plant/line1/ratio"), vec!["0.25"]);
    }

    #[test]
    fn test_transport_error_publishes_nothing() {
        let (sink, dispatcher) = dispatcher();
        dispatcher.on_error(&TransportError::Timeout {
            register: "status".to_string(),
            attempts: 3,
        });
        assert!(sink.published().is_empty());
    }
}
