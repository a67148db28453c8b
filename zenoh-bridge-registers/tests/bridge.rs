//! End-to-end tests for the register bridge over an in-memory sink and a
//! scripted value source.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use regbridge_framework::{MemorySink, ServiceState};
use zenoh_bridge_registers::Bridge;
use zenoh_bridge_registers::catalog::RegisterDescriptor;
use zenoh_bridge_registers::config::RegisterBridgeConfig;
use zenoh_bridge_registers::source::{
    ConnectionError, RegistrationError, SourceListener, TransportError, ValueSource,
};

const CONFIG: &str = r#"{
    bus: {
        command_topic: "plant/cmd",
        data_prefix: "plant/line1",
    },
    device: {
        connection: { type: "tcp", host: "127.0.0.1" },
        poll_interval_ms: 250,
    },
    registers: [
        { name: "temperature", address: 0, length: 2, type: "float", transform: "_ * 2" },
        { name: "status", address: 2, length: 1, type: "int", transform: "_" },
    ],
}"#;

#[derive(Default)]
struct MockState {
    listener: Mutex<Option<Arc<dyn SourceListener>>>,
    registered: Mutex<Vec<Arc<RegisterDescriptor>>>,
    interval: Mutex<Option<Duration>>,
    connects: AtomicUsize,
    stops: AtomicUsize,
    fail_connect: AtomicBool,
}

impl MockState {
    fn registered(&self) -> Vec<String> {
        self.registered
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    /// Report a poll of `name` as the real source would.
    fn emit(&self, name: &str, raw: &[u8]) {
        let register = self
            .registered
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .expect("register not scheduled");
        let listener = self.listener.lock().unwrap().clone().expect("not started");
        listener.on_value(&register, raw);
    }

    fn fail(&self, error: TransportError) {
        let listener = self.listener.lock().unwrap().clone().expect("not started");
        listener.on_error(&error);
    }
}

struct MockSource {
    state: Arc<MockState>,
}

impl ValueSource for MockSource {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectionError::Failed {
                target: "tcp://127.0.0.1:502".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn register_poll(&mut self, register: Arc<RegisterDescriptor>) -> Result<(), RegistrationError> {
        self.state.registered.lock().unwrap().push(register);
        Ok(())
    }

    fn set_poll_interval(&mut self, interval: Duration) {
        *self.state.interval.lock().unwrap() = Some(interval);
    }

    fn start(&mut self, listener: Arc<dyn SourceListener>) {
        *self.state.listener.lock().unwrap() = Some(listener);
    }

    async fn stop(&mut self) {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        self.state.listener.lock().unwrap().take();
    }
}

fn bridge(config: &str) -> (Bridge<MockSource, MemorySink>, Arc<MockState>, Arc<MemorySink>) {
    let config = RegisterBridgeConfig::parse(config).unwrap();
    let state = Arc::new(MockState::default());
    let sink = Arc::new(MemorySink::new());
    let source = MockSource {
        state: state.clone(),
    };
    (Bridge::new(config, source, sink.clone()), state, sink)
}

#[tokio::test]
async fn test_quit_stops_running_bridge() {
    let (mut bridge, state, sink) = bridge(CONFIG);
    let lifecycle = bridge.lifecycle().clone();

    let handle = tokio::spawn(async move {
        let result = bridge.run().await;
        (bridge, result)
    });
    tokio::time::timeout(Duration::from_secs(2), lifecycle.running())
        .await
        .expect("bridge did not start");

    assert_eq!(state.connects.load(Ordering::SeqCst), 1);
    assert_eq!(state.registered(), vec!["temperature", "status"]);
    assert_eq!(
        *state.interval.lock().unwrap(),
        Some(Duration::from_millis(250))
    );

    state.emit("temperature", &[0x41, 0x48, 0x00, 0x00]);
    state.emit("status", &[0x00, 0x01]);
    assert_eq!(sink.published_to("plant/line1/temperature"), vec!["25.0"]);
    assert_eq!(sink.published_to("plant/line1/status"), vec!["1"]);

    assert_eq!(sink.deliver("plant/cmd", "quit"), 1);

    let (mut bridge, result) = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("bridge did not stop")
        .unwrap();
    tokio_test::assert_ok!(result);

    assert_eq!(lifecycle.state(), ServiceState::Stopped);
    assert_eq!(sink.close_count(), 1);
    assert_eq!(state.stops.load(Ordering::SeqCst), 1);

    // A second quit, or a second wait, changes nothing.
    assert_eq!(sink.deliver("plant/cmd", "quit"), 0);
    assert!(!lifecycle.request_stop());
    bridge.wait_until_stopped().await;
    assert_eq!(sink.close_count(), 1);
    assert_eq!(state.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_status_published_on_start_and_stop() {
    let (mut bridge, _state, sink) = bridge(CONFIG);

    bridge.start().await.unwrap();
    bridge.lifecycle().request_stop();
    bridge.wait_until_stopped().await;

    let statuses: Vec<serde_json::Value> = sink
        .published_to("plant/line1/@/status")
        .iter()
        .map(|s| serde_json::from_str(s).unwrap())
        .collect();

    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0]["status"], "running");
    assert_eq!(statuses[0]["bridge"], "registers");
    assert_eq!(
        statuses[0]["registers"],
        serde_json::json!(["temperature", "status"])
    );
    assert_eq!(statuses[1]["status"], "offline");
}

#[tokio::test]
async fn test_unknown_command_keeps_running() {
    let (mut bridge, _state, sink) = bridge(CONFIG);
    bridge.start().await.unwrap();

    assert_eq!(sink.deliver("plant/cmd", "reset"), 1);
    assert_eq!(sink.deliver("plant/cmd", "QUIT"), 1);
    assert_eq!(bridge.lifecycle().state(), ServiceState::Running);
    assert_eq!(sink.close_count(), 0);
}

#[tokio::test]
async fn test_invalid_transform_fails_startup() {
    let config = CONFIG.replace("_ * 2", "(_ * 2");
    let (mut bridge, state, sink) = bridge(&config);

    let err = bridge.start().await.unwrap_err();

    assert_eq!(err.category(), "configuration");
    assert!(err.to_string().starts_with("Configuration error:"));
    assert!(err.to_string().contains("temperature"));
    assert!(state.registered().is_empty());
    assert_eq!(bridge.lifecycle().state(), ServiceState::Stopped);
    assert_eq!(sink.close_count(), 1);

    let statuses = sink.published_to("plant/line1/@/status");
    assert_eq!(statuses.len(), 1);
    let status: serde_json::Value = serde_json::from_str(&statuses[0]).unwrap();
    assert_eq!(status["status"], "error");
    assert!(status["error"].as_str().unwrap().starts_with("Configuration error:"));
}

#[tokio::test]
async fn test_connection_failure_fails_startup() {
    let (mut bridge, state, sink) = bridge(CONFIG);
    state.fail_connect.store(true, Ordering::SeqCst);

    let err = bridge.run().await.unwrap_err();

    assert_eq!(err.category(), "connection");
    assert!(err.to_string().starts_with("Connection error:"));
    assert!(state.registered().is_empty());
    assert_eq!(bridge.lifecycle().state(), ServiceState::Stopped);
    assert_eq!(sink.close_count(), 1);
    assert_eq!(state.stops.load(Ordering::SeqCst), 1);

    let statuses = sink.published_to("plant/line1/@/status");
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].contains("\"status\":\"error\""));
    assert!(statuses[0].contains("Connection error:"));
}

#[tokio::test]
async fn test_quit_before_running_is_ignored() {
    let (bridge, _state, sink) = bridge(CONFIG);

    // Nothing is subscribed before start.
    assert_eq!(sink.deliver("plant/cmd", "quit"), 0);
    assert_eq!(bridge.lifecycle().state(), ServiceState::Stopped);
}

#[tokio::test]
async fn test_bad_poll_does_not_stop_later_polls() {
    let (mut bridge, state, sink) = bridge(CONFIG);
    bridge.start().await.unwrap();

    state.emit("temperature", &[0x41, 0x48]);
    state.fail(TransportError::Timeout {
        register: "temperature".to_string(),
        attempts: 3,
    });
    assert!(sink.published_to("plant/line1/temperature").is_empty());

    state.emit("temperature", &[0x41, 0x48, 0x00, 0x00]);
    assert_eq!(sink.published_to("plant/line1/temperature"), vec!["25.0"]);
    assert_eq!(bridge.lifecycle().state(), ServiceState::Running);
}

#[tokio::test]
async fn test_start_twice_rejected() {
    let (mut bridge, state, _sink) = bridge(CONFIG);
    bridge.start().await.unwrap();

    let err = bridge.start().await.unwrap_err();
    assert_eq!(err.category(), "configuration");
    assert_eq!(state.connects.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.lifecycle().state(), ServiceState::Running);
}
