//! Client coordinator tests against a scripted server
//!
//! The fake server records every frame it receives and answers from a fixed
//! catalog. One category can be gated so its response is held back until the
//! test releases it, and `Unpause` can be answered with a failure.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pokequery_core::{
    Category, ChannelError, ClientConfig, ClientFrame, DecodeError, FrameReader, FrameWriter,
    PokequeryError, PokequeryResult, RecordCodec, ResourceError, ServerFrame,
};
use pokequery_runtime::{
    MemorySink, PersistEvent, QueryClient, QueryEvent, RecordSink, ShutdownMode,
};
use tokio::io::DuplexStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

const CHARMANDER: &str = "4,Charmander,Fire,,309,39,52,43,60,50,65,1,False";
const CHARIZARD: &str = "6,Charizard,Fire,Flying,534,78,84,78,109,85,100,1,False";
const SQUIRTLE: &str = "7,Squirtle,Water,,314,44,48,65,50,64,43,1,False";
const BULBASAUR: &str = "1,Bulbasaur,Grass,Poison,318,45,49,49,65,65,45,1,False";
const CATERPIE_BAD_FLAG: &str = "10,Caterpie,Bug,,195,45,30,35,20,20,45,1,Maybe";

// ----------------------------------------------------------------------------
// Scripted Server
// ----------------------------------------------------------------------------

struct FakeServer {
    received: Arc<Mutex<Vec<ClientFrame>>>,
    gate: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl FakeServer {
    fn received(&self) -> Vec<ClientFrame> {
        self.received.lock().unwrap().clone()
    }

    fn release(&self) {
        self.gate.notify_one();
    }

    async fn finish(self) -> Vec<ClientFrame> {
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .unwrap()
            .unwrap();
        self.received.lock().unwrap().clone()
    }
}

fn catalog() -> HashMap<Category, Vec<&'static str>> {
    HashMap::from([
        (Category::Fire, vec![CHARMANDER, CHARIZARD]),
        (Category::Water, vec![SQUIRTLE]),
        (Category::Grass, vec![BULBASAUR]),
        (Category::Bug, vec![CATERPIE_BAD_FLAG]),
    ])
}

/// How the scripted server deviates from plain answers
#[derive(Debug, Clone, Copy, Default)]
struct Script {
    gated: Option<Category>,
    reject_unpause: bool,
}

fn spawn_server(stream: DuplexStream, script: Script) -> FakeServer {
    let received = Arc::new(Mutex::new(Vec::new()));
    let gate = Arc::new(Notify::new());
    let handle = {
        let received = Arc::clone(&received);
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            let catalog = catalog();
            let codec = RecordCodec::default();
            let (read_half, write_half) = tokio::io::split(stream);
            let mut reader = FrameReader::new(read_half, 1 << 16);
            let mut writer = FrameWriter::new(write_half, 1 << 16);

            while let Ok(Some(frame)) = reader.read_frame::<ClientFrame>().await {
                received.lock().unwrap().push(frame.clone());
                let replies = match frame {
                    ClientFrame::CategoryRequest { category } => {
                        if script.gated == Some(category) {
                            gate.notified().await;
                        }
                        let lines = catalog.get(&category).cloned().unwrap_or_default();
                        let payload = codec.join_payload(&lines);
                        vec![
                            ServerFrame::SizeHeader {
                                bytes: payload.len() as u64,
                            },
                            ServerFrame::Payload { records: payload },
                            ServerFrame::CountHeader {
                                count: lines.len() as u64,
                            },
                        ]
                    }
                    ClientFrame::Pause => vec![ServerFrame::PauseAck { applied: false }],
                    ClientFrame::Unpause if script.reject_unpause => vec![ServerFrame::Failure {
                        reason: "unpause rejected".to_string(),
                    }],
                    ClientFrame::Unpause => vec![ServerFrame::UnpauseAck { resumed: false }],
                    ClientFrame::Stop => break,
                };
                for reply in replies {
                    if writer.write_frame(&reply).await.is_err() {
                        return;
                    }
                }
            }
        })
    };
    FakeServer {
        received,
        gate,
        handle,
    }
}

fn connect(
    gated: Option<Category>,
) -> (
    QueryClient<DuplexStream>,
    pokequery_runtime::ClientEvents,
    FakeServer,
    Arc<MemorySink>,
) {
    let sink = Arc::new(MemorySink::new());
    let script = Script {
        gated,
        ..Script::default()
    };
    let (client, events, server) = connect_with(script, Arc::clone(&sink) as Arc<dyn RecordSink>);
    (client, events, server, sink)
}

fn connect_with(
    script: Script,
    sink: Arc<dyn RecordSink>,
) -> (
    QueryClient<DuplexStream>,
    pokequery_runtime::ClientEvents,
    FakeServer,
) {
    let (client_stream, server_stream) = tokio::io::duplex(1 << 16);
    let server = spawn_server(server_stream, script);
    let (client, events) = QueryClient::from_stream(client_stream, &ClientConfig::default(), sink);
    (client, events, server)
}

/// Sink whose every write fails
struct BrokenSink;

#[async_trait]
impl RecordSink for BrokenSink {
    async fn append_lines(&self, destination: &str, _lines: &[String]) -> PokequeryResult<()> {
        Err(ResourceError::Write {
            path: destination.into(),
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        }
        .into())
    }
}

fn request(category: Category) -> ClientFrame {
    ClientFrame::CategoryRequest { category }
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_invalid_category_sends_nothing() {
    let (mut client, _events, server, _sink) = connect(None);

    let err = client.submit_category("Metal").await.unwrap_err();
    assert!(matches!(err, PokequeryError::InvalidCategory { .. }));
    assert!(err.is_rejection());

    let report = client.shutdown(ShutdownMode::Drain).await.unwrap();
    assert_eq!(report.successful_queries, 0);
    assert_eq!(server.finish().await, vec![ClientFrame::Stop]);
}

#[tokio::test]
async fn test_query_appends_records_and_reports_event() {
    let (mut client, mut events, server, _sink) = connect(None);

    client.submit_category("Fire").await.unwrap();
    client.wait_queries().await.unwrap();

    match events.queries.recv().await.unwrap() {
        QueryEvent::Completed { category, records } => {
            assert_eq!(category, Category::Fire);
            assert_eq!(records, 2);
        }
        other => panic!("unexpected event {other:?}"),
    }
    let stats = client.stats();
    assert_eq!(stats.successful_queries, 1);
    assert_eq!(stats.records_captured, 2);

    client.shutdown(ShutdownMode::Drain).await.unwrap();
    assert_eq!(
        server.finish().await,
        vec![request(Category::Fire), ClientFrame::Stop]
    );
}

#[tokio::test]
async fn test_persist_rejections_send_nothing() {
    let (mut client, _events, server, sink) = connect(None);

    let err = client.persist_to("out.csv").await.unwrap_err();
    assert!(matches!(err, PokequeryError::NoData));

    client.submit_category("Water").await.unwrap();
    client.wait_queries().await.unwrap();

    for name in ["", ".", " leading"] {
        let err = client.persist_to(name).await.unwrap_err();
        assert!(
            matches!(
                err,
                PokequeryError::Resource(ResourceError::InvalidDestination { .. })
            ),
            "{name:?}"
        );
    }
    assert!(sink.contents("out.csv").is_empty());

    client.shutdown(ShutdownMode::Drain).await.unwrap();
    assert_eq!(
        server.finish().await,
        vec![request(Category::Water), ClientFrame::Stop]
    );
}

#[tokio::test]
async fn test_persist_writes_full_snapshot_each_time() {
    let (mut client, _events, server, sink) = connect(None);

    client.submit_category("Fire").await.unwrap();
    client.wait_queries().await.unwrap();
    client.persist_now("a.csv").await.unwrap();

    client.submit_category("Water").await.unwrap();
    client.wait_queries().await.unwrap();
    let report = client.persist_now("b.csv").await.unwrap();
    assert_eq!(report.records_written, 3);

    assert_eq!(sink.contents("a.csv"), [CHARMANDER, CHARIZARD]);
    assert_eq!(sink.contents("b.csv"), [CHARMANDER, CHARIZARD, SQUIRTLE]);

    let report = client.shutdown(ShutdownMode::Drain).await.unwrap();
    assert_eq!(report.successful_queries, 2);
    assert_eq!(report.records_captured, 3);
    assert_eq!(report.destinations, ["a.csv", "b.csv"]);

    assert_eq!(
        server.finish().await,
        vec![
            request(Category::Fire),
            ClientFrame::Pause,
            ClientFrame::Unpause,
            request(Category::Water),
            ClientFrame::Pause,
            ClientFrame::Unpause,
            ClientFrame::Stop,
        ]
    );
}

#[tokio::test]
async fn test_repeated_destination_is_reported_once() {
    let (mut client, _events, server, sink) = connect(None);

    client.submit_category("Grass").await.unwrap();
    client.wait_queries().await.unwrap();

    let first = client.persist_now("grass.csv").await.unwrap();
    let second = client.persist_now("grass.csv").await.unwrap();
    assert!(first.newly_registered);
    assert!(!second.newly_registered);
    assert_eq!(sink.contents("grass.csv"), [BULBASAUR, BULBASAUR]);
    assert_eq!(client.stats().destinations_written, 1);

    let report = client.shutdown(ShutdownMode::Drain).await.unwrap();
    assert_eq!(report.destinations, ["grass.csv"]);
    server.finish().await;
}

#[tokio::test]
async fn test_query_waits_while_session_paused() {
    let (mut client, _events, server, _sink) = connect(None);
    let session = Arc::clone(client.session());

    let guard = session.hold_pause();
    client.submit_category("Fire").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.received().is_empty(), "request sent while paused");
    assert!(!session.is_query_active());

    drop(guard);
    client.wait_queries().await.unwrap();
    assert_eq!(client.stats().successful_queries, 1);

    client.shutdown(ShutdownMode::Drain).await.unwrap();
    assert_eq!(
        server.finish().await,
        vec![request(Category::Fire), ClientFrame::Stop]
    );
}

#[tokio::test]
async fn test_persist_waits_for_in_flight_query() {
    let (mut client, mut events, server, sink) = connect(Some(Category::Fire));
    let session = Arc::clone(client.session());

    client.submit_category("Water").await.unwrap();
    client.wait_queries().await.unwrap();

    // Fire is answered only once released, so the query holds the session lock
    client.submit_category("Fire").await.unwrap();
    wait_until(|| server.received().contains(&request(Category::Fire))).await;

    client.persist_to("snapshot.csv").await.unwrap();
    wait_until(|| session.is_paused()).await;

    // Queued behind the pause; must not reach the snapshot
    client.submit_category("Grass").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!server.received().contains(&ClientFrame::Pause));

    server.release();
    let report = client.shutdown(ShutdownMode::Drain).await.unwrap();

    assert_eq!(sink.contents("snapshot.csv"), [SQUIRTLE, CHARMANDER, CHARIZARD]);
    assert_eq!(report.successful_queries, 3);
    assert_eq!(report.destinations, ["snapshot.csv"]);

    match events.persists.recv().await.unwrap() {
        PersistEvent::Completed(report) => assert_eq!(report.records_written, 3),
        other => panic!("unexpected event {other:?}"),
    }

    assert_eq!(
        server.finish().await,
        vec![
            request(Category::Water),
            request(Category::Fire),
            ClientFrame::Pause,
            ClientFrame::Unpause,
            request(Category::Grass),
            ClientFrame::Stop,
        ]
    );
}

#[tokio::test]
async fn test_cancel_abandons_in_flight_query() {
    let (mut client, mut events, server, _sink) = connect(Some(Category::Fire));

    client.submit_category("Fire").await.unwrap();
    client.submit_category("Water").await.unwrap();
    wait_until(|| server.received().contains(&request(Category::Fire))).await;

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        client.shutdown(ShutdownMode::Cancel),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(report.successful_queries, 0);

    match events.queries.recv().await.unwrap() {
        QueryEvent::Failed { category, error } => {
            assert_eq!(category, Category::Fire);
            assert!(matches!(error, PokequeryError::Cancelled));
        }
        other => panic!("unexpected event {other:?}"),
    }
    // Water was dropped from the queue, never requested
    assert!(events.queries.try_recv().is_err());

    server.release();
    let received = server.finish().await;
    assert!(!received.contains(&request(Category::Water)));
}

#[tokio::test]
async fn test_rejected_unpause_fails_persist() {
    let sink = Arc::new(MemorySink::new());
    let script = Script {
        reject_unpause: true,
        ..Script::default()
    };
    let (mut client, _events, server) =
        connect_with(script, Arc::clone(&sink) as Arc<dyn RecordSink>);

    client.submit_category("Water").await.unwrap();
    client.wait_queries().await.unwrap();

    match client.persist_now("out.csv").await {
        Err(PokequeryError::Channel(ChannelError::Remote { reason })) => {
            assert_eq!(reason, "unpause rejected");
        }
        other => panic!("expected remote failure, got {other:?}"),
    }
    assert!(!client.session().is_paused());
    assert_eq!(client.stats().destinations_written, 0);

    let report = client.shutdown(ShutdownMode::Drain).await.unwrap();
    assert!(report.destinations.is_empty());
    assert_eq!(
        server.finish().await,
        vec![
            request(Category::Water),
            ClientFrame::Pause,
            ClientFrame::Unpause,
            ClientFrame::Stop,
        ]
    );
}

#[tokio::test]
async fn test_failed_write_leaves_session_usable() {
    let (mut client, mut events, server) =
        connect_with(Script::default(), Arc::new(BrokenSink) as Arc<dyn RecordSink>);

    client.submit_category("Water").await.unwrap();
    client.wait_queries().await.unwrap();

    client.persist_to("out.csv").await.unwrap();
    match events.persists.recv().await.unwrap() {
        PersistEvent::Failed { destination, error } => {
            assert_eq!(destination, "out.csv");
            assert!(matches!(
                error,
                PokequeryError::Resource(ResourceError::Write { .. })
            ));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(!client.session().is_paused());

    client.submit_category("Grass").await.unwrap();
    client.wait_queries().await.unwrap();
    let stats = client.stats();
    assert_eq!(stats.successful_queries, 2);
    assert_eq!(stats.records_captured, 2);
    assert_eq!(stats.destinations_written, 0);

    client.shutdown(ShutdownMode::Drain).await.unwrap();
    // The server is resumed even though the write failed
    assert_eq!(
        server.finish().await,
        vec![
            request(Category::Water),
            ClientFrame::Pause,
            ClientFrame::Unpause,
            request(Category::Grass),
            ClientFrame::Stop,
        ]
    );
}

#[tokio::test]
async fn test_malformed_response_appends_nothing() {
    let (mut client, mut events, server, sink) = connect(None);

    client.submit_category("Bug").await.unwrap();
    client.submit_category("Fire").await.unwrap();
    client.wait_queries().await.unwrap();

    match events.queries.recv().await.unwrap() {
        QueryEvent::Failed { category, error } => {
            assert_eq!(category, Category::Bug);
            assert!(matches!(
                error,
                PokequeryError::Decode(DecodeError::InvalidFlag { .. })
            ));
        }
        other => panic!("unexpected event {other:?}"),
    }
    match events.queries.recv().await.unwrap() {
        QueryEvent::Completed { category, records } => {
            assert_eq!(category, Category::Fire);
            assert_eq!(records, 2);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let stats = client.stats();
    assert_eq!(stats.successful_queries, 1);
    assert_eq!(stats.records_captured, 2);

    client.persist_now("fire.csv").await.unwrap();
    assert_eq!(sink.contents("fire.csv"), [CHARMANDER, CHARIZARD]);

    client.shutdown(ShutdownMode::Drain).await.unwrap();
    server.finish().await;
}
