use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jsrt::{
	BridgeConfig, Buffer, DebugBridge, DebugFlags, DebuggerConnection, Error, RemoteConnection, RuntimeBuilder,
	RuntimeSignature, ScriptEngine, ScriptRuntime, make_debug_runtime_with,
};
use jsrt_runtime::Session;
use serde_json::{Value, json};
use tokio::sync::mpsc;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct FakeDebugger {
	remote: Mutex<Option<Box<dyn RemoteConnection>>>,
	received: Mutex<Vec<String>>,
	connects: AtomicUsize,
	disconnects: AtomicUsize,
}

impl FakeDebugger {
	fn attached(&self) -> bool {
		self.remote.lock().unwrap().is_some()
	}

	/// Emits a message as the native debugger would.
	fn emit(&self, message: &str) {
		if let Some(remote) = self.remote.lock().unwrap().as_ref() {
			remote.on_message(message.to_string());
		}
	}

	fn received(&self) -> Vec<String> {
		self.received.lock().unwrap().clone()
	}
}

impl DebuggerConnection for FakeDebugger {
	fn connect(&self, remote: Box<dyn RemoteConnection>) -> bool {
		self.connects.fetch_add(1, Ordering::SeqCst);
		*self.remote.lock().unwrap() = Some(remote);
		true
	}

	fn disconnect(&self) {
		self.disconnects.fetch_add(1, Ordering::SeqCst);
		let remote = self.remote.lock().unwrap().take();
		if let Some(remote) = remote {
			remote.on_disconnect();
		}
	}

	fn send_message(&self, message: String) {
		self.received.lock().unwrap().push(message);
	}
}

#[derive(Default)]
struct FakeEngine {
	debugger: Arc<FakeDebugger>,
	paused_on_load: AtomicBool,
	pause_calls: AtomicUsize,
	evaluated: Mutex<Vec<Vec<u8>>>,
	debug_evaluated: Mutex<Vec<(String, String)>>,
}

impl ScriptRuntime for FakeEngine {
	type Value = String;
	type Error = String;

	fn evaluate_javascript(&self, source: Buffer, _url: &str) -> Result<String, String> {
		self.evaluated.lock().unwrap().push(source.to_vec());
		Ok("evaluated".into())
	}
}

impl ScriptEngine for FakeEngine {
	fn runtime_signature(&self) -> RuntimeSignature {
		RuntimeSignature::new("fake", 1)
	}

	fn is_bytecode(&self, bytes: &[u8]) -> bool {
		bytes.starts_with(b"BC\0")
	}

	fn undefined(&self) -> String {
		"undefined".into()
	}

	fn debug_evaluate(&self, source: &str, url: &str, _flags: DebugFlags) -> Result<(), String> {
		self.debug_evaluated
			.lock()
			.unwrap()
			.push((source.to_string(), url.to_string()));
		Ok(())
	}

	fn set_pause_on_load(&self, pause: bool) {
		self.pause_calls.fetch_add(1, Ordering::SeqCst);
		self.paused_on_load.store(pause, Ordering::SeqCst);
	}

	fn connect_debugger(&self) -> Arc<dyn DebuggerConnection> {
		self.debugger.clone()
	}
}

fn any_port() -> BridgeConfig {
	BridgeConfig {
		port: 0,
		shutdown_timeout_ms: 500,
		..Default::default()
	}
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
	let deadline = tokio::time::Instant::now() + TIMEOUT;
	while !condition() {
		assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

async fn client(addr: SocketAddr) -> (Arc<Session>, mpsc::UnboundedReceiver<String>) {
	let (tx, rx) = mpsc::unbounded_channel();
	let session = jsrt_runtime::connect(&format!("ws://{addr}/"), |session| {
		session.set_on_read(move |text| {
			let _ = tx.send(text);
		});
	})
	.await
	.unwrap();
	(session, rx)
}

async fn next_json(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
	let text = tokio::time::timeout(TIMEOUT, rx.recv())
		.await
		.expect("timed out waiting for reply")
		.expect("session ended");
	serde_json::from_str(&text).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn script_source_round_trip() {
	let engine = Arc::new(FakeEngine::default());
	let bridge = Arc::new(DebugBridge::start(&*engine, &any_port()).unwrap());
	let runtime = RuntimeBuilder::from_arc(engine.clone())
		.with(bridge.clone())
		.build();
	assert!(engine.paused_on_load.load(Ordering::SeqCst));

	let value = runtime
		.evaluate_javascript(Buffer::from(&b"print(1)"[..]), "a.js")
		.unwrap();
	assert_eq!(value, "undefined");
	assert_eq!(
		*engine.debug_evaluated.lock().unwrap(),
		vec![("print(1)".to_string(), "a.js".to_string())]
	);
	assert!(engine.evaluated.lock().unwrap().is_empty());

	let (session, mut replies) = client(bridge.local_addr()).await;
	let debugger = engine.debugger.clone();
	wait_until("native attach", || debugger.attached()).await;

	let parsed = r#"{"method":"Debugger.scriptParsed","params":{"scriptId":"7","url":"a.js"}}"#;
	engine.debugger.emit(parsed);
	let relayed = tokio::time::timeout(TIMEOUT, replies.recv()).await.unwrap();
	assert_eq!(relayed.as_deref(), Some(parsed));

	session.write(r#"{"method":"Debugger.getScriptSource","id":1,"params":{"scriptId":"7"}}"#);
	assert_eq!(
		next_json(&mut replies).await,
		json!({"id": 1, "result": {"scriptSource": "print(1)"}})
	);
	assert!(engine.debugger.received().is_empty());
	assert_eq!(bridge.registry().url_for(jsrt_protocol::ScriptId(7)).as_deref(), Some("a.js"));

	session.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_script_id_gets_sentinel() {
	let engine = FakeEngine::default();
	let bridge = DebugBridge::start(&engine, &any_port()).unwrap();

	let (session, mut replies) = client(bridge.local_addr()).await;
	session.write(r#"{"method":"Debugger.getScriptSource","id":2,"params":{"scriptId":"404"}}"#);
	assert_eq!(
		next_json(&mut replies).await,
		json!({"id": 2, "result": {"scriptSource": jsrt_protocol::SOURCE_UNAVAILABLE}})
	);

	session.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn unrecognized_methods_reach_the_native_debugger_unchanged() {
	let engine = FakeEngine::default();
	let bridge = DebugBridge::start(&engine, &any_port()).unwrap();

	let (session, mut replies) = client(bridge.local_addr()).await;
	let frame = r#"{"id":3, "method":"Debugger.pause",  "params":{}}"#;
	session.write("not json at all");
	session.write(frame);

	let debugger = engine.debugger.clone();
	wait_until("forwarded frame", || !debugger.received().is_empty()).await;
	assert_eq!(engine.debugger.received(), vec![frame.to_string()]);

	// The malformed frame produced no reply: the first reply is for this request.
	session.write(r#"{"method":"Debugger.getScriptSource","id":4,"params":{"scriptId":"1"}}"#);
	assert_eq!(next_json(&mut replies).await["id"], json!(4));

	session.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn new_client_replaces_the_current_one() {
	let engine = FakeEngine::default();
	let bridge = DebugBridge::start(&engine, &any_port()).unwrap();
	let debugger = engine.debugger.clone();

	let (first, _first_replies) = client(bridge.local_addr()).await;
	wait_until("first attach", || debugger.connects.load(Ordering::SeqCst) == 1).await;

	let (second, mut second_replies) = client(bridge.local_addr()).await;
	wait_until("second attach", || debugger.connects.load(Ordering::SeqCst) == 2).await;
	tokio::time::timeout(TIMEOUT, first.closed()).await.unwrap();

	engine.debugger.emit(r#"{"method":"Debugger.resumed","params":{}}"#);
	assert_eq!(next_json(&mut second_replies).await["method"], json!("Debugger.resumed"));
	assert!(bridge.has_client());

	second.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn client_disconnect_detaches_and_allows_reconnect() {
	let engine = FakeEngine::default();
	let bridge = DebugBridge::start(&engine, &any_port()).unwrap();
	let debugger = engine.debugger.clone();

	let (session, _replies) = client(bridge.local_addr()).await;
	wait_until("attach", || debugger.attached()).await;

	session.close();
	wait_until("detach", || !debugger.attached() && !bridge.has_client()).await;
	assert!(debugger.disconnects.load(Ordering::SeqCst) >= 1);

	let (session, mut replies) = client(bridge.local_addr()).await;
	wait_until("reattach", || debugger.attached()).await;
	session.write(r#"{"method":"Debugger.getScriptSource","id":9,"params":{"scriptId":"1"}}"#);
	assert_eq!(next_json(&mut replies).await["id"], json!(9));

	session.close();
}

#[test]
fn bind_conflict_is_reported_without_touching_the_engine() {
	let taken = TcpListener::bind("127.0.0.1:0").unwrap();
	let config = BridgeConfig {
		port: taken.local_addr().unwrap().port(),
		..Default::default()
	};

	let engine = FakeEngine::default();
	let err = DebugBridge::start(&engine, &config).unwrap_err();
	assert!(matches!(err, Error::Transport(jsrt_runtime::Error::Bind { .. })));
	assert_eq!(engine.pause_calls.load(Ordering::SeqCst), 0);
	assert_eq!(engine.debugger.connects.load(Ordering::SeqCst), 0);
}

#[test]
fn dropping_the_runtime_releases_the_port() {
	let engine = FakeEngine::default();
	let bridge = DebugBridge::start(&engine, &any_port()).unwrap();
	let addr = bridge.local_addr();

	bridge.shutdown();
	bridge.shutdown();
	drop(bridge);

	TcpListener::bind(addr).unwrap();
}

#[test]
fn bytecode_bypasses_debug_evaluation() {
	let runtime = make_debug_runtime_with(FakeEngine::default(), &any_port()).unwrap();

	let value = runtime
		.evaluate_javascript(Buffer::from(&b"BC\0compiled"[..]), "b.js")
		.unwrap();
	assert_eq!(value, "evaluated");
	assert!(runtime.engine().debug_evaluated.lock().unwrap().is_empty());
}

#[test]
fn pause_on_load_follows_config() {
	let engine = FakeEngine::default();
	let config = BridgeConfig {
		pause_on_load: false,
		..any_port()
	};
	let _bridge = DebugBridge::start(&engine, &config).unwrap();
	assert_eq!(engine.pause_calls.load(Ordering::SeqCst), 1);
	assert!(!engine.paused_on_load.load(Ordering::SeqCst));
}
