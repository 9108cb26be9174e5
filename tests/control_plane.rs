use std::sync::{Arc, Mutex};
use std::time::Duration;

use play_lights::client::{self, StreamSession};
use play_lights::protocol;
use play_lights::runtime::{AsyncTcpListener, AsyncTcpStream, BoxFuture, TcpStream};
use play_lights::{
    BatchRequest, Connector, Device, Error, LightServer, Link, Orchestrator, Profile, Settings,
    ShellTvControl, StreamTarget,
};
use uuid::Uuid;

type Writes = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

#[derive(Clone, Default)]
struct RecordingConnector {
    writes: Writes,
}

struct RecordingLink {
    address: String,
    writes: Writes,
}

impl Connector for RecordingConnector {
    fn connect<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<Box<dyn Link>, Error>> {
        Box::pin(async move {
            Ok(Box::new(RecordingLink {
                address: address.to_string(),
                writes: Arc::clone(&self.writes),
            }) as Box<dyn Link>)
        })
    }
}

impl Link for RecordingLink {
    fn write<'a>(&'a mut self, _: Uuid, value: &'a [u8]) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            self.writes
                .lock()
                .unwrap()
                .push((self.address.clone(), value.to_vec()));
            Ok(())
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async { Ok(()) })
    }
}

async fn start_server() -> (String, RecordingConnector) {
    let connector = RecordingConnector::default();
    let shared: Arc<dyn Connector> = Arc::new(connector.clone());
    let devices = vec![
        Device::new(
            0,
            "AA",
            "Desk",
            "salon",
            Some("luminaire"),
            Profile::Playbulb {
                default_intensity: "ff000000".to_string(),
            },
            Arc::clone(&shared),
        ),
        Device::new(
            1,
            "BB",
            "Ceiling",
            "passage",
            None,
            Profile::Milight { id1: 10, id2: 20 },
            Arc::clone(&shared),
        ),
    ];
    let settings = Settings {
        threaded: false,
        quiet_hours: None,
    };
    let orchestrator = Arc::new(Orchestrator::new(devices, settings));
    let server = LightServer::new(orchestrator, Arc::new(ShellTvControl::default()))
        .with_timeouts(Duration::from_secs(2), Duration::from_secs(60));

    let listener = server.bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move { server.serve(listener).await });
    (addr, connector)
}

async fn wait_for_state(addr: &str, expected: &[&str]) {
    for _ in 0..50 {
        if client::query_state(addr).await.unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "state never became {:?}, last {:?}",
        expected,
        client::query_state(addr).await.unwrap()
    );
}

#[tokio::test]
async fn test_batch_requests_and_state() {
    let (addr, connector) = start_server().await;
    assert_eq!(client::query_state(&addr).await.unwrap(), vec!["00000000", "0"]);

    client::send_request(&addr, &BatchRequest::colors(["1", "1"]))
        .await
        .unwrap();
    wait_for_state(&addr, &["ff000000", "1"]).await;

    let salon_off = BatchRequest::from_json(r#"{"off": true, "group": "salon"}"#).unwrap();
    client::send_request(&addr, &salon_off).await.unwrap();
    wait_for_state(&addr, &["00000000", "1"]).await;

    let writes = connector.writes.lock().unwrap().clone();
    assert_eq!(writes.iter().filter(|(a, _)| a == "AA").count(), 2);
    // on + dim-on, never touched by the salon request
    assert_eq!(writes.iter().filter(|(a, _)| a == "BB").count(), 2);
}

#[tokio::test]
async fn test_rejected_requests_change_nothing() {
    let (addr, connector) = start_server().await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    protocol::write_frame(&mut stream, "{not json").await.unwrap();
    stream.shutdown().await.unwrap();

    // Wrong number of values.
    client::send_request(&addr, &BatchRequest::colors(["1"]))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client::query_state(&addr).await.unwrap(), vec!["00000000", "0"]);
    assert!(connector.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_streaming_session() {
    let (addr, _connector) = start_server().await;

    let mut session = StreamSession::open(&addr, StreamTarget::Device(0)).await.unwrap();
    session.send("00ff0000").await.unwrap();
    session.send("0000ff00").await.unwrap();
    session.close().await.unwrap();
    wait_for_state(&addr, &["0000ff00", "0"]).await;

    let mut group = StreamSession::open(&addr, StreamTarget::Group("passage".into()))
        .await
        .unwrap();
    group.send("120").await.unwrap();
    group.close().await.unwrap();
    wait_for_state(&addr, &["0000ff00", "120"]).await;
}
