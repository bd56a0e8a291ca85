// crates/omm-server/tests/provider_session.rs
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use omm_codec::{decode_field_dictionary, decode_msg, encode_frame, split_frame};
use omm_core::{
    domain, real_hint, Data, DataDictionary, FieldList, Msg, MsgKey, PostMsg, PostUserInfo, Real,
    RequestMsg, StreamState, UpdateMsg,
};
use omm_server::config::Config;
use omm_server::server;

const BID: i16 = 22;

struct TestClient {
    stream: TcpStream,
    buffer: BytesMut,
    dictionary: DataDictionary,
}

impl TestClient {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        TestClient {
            stream: TcpStream::connect(addr).await.unwrap(),
            buffer: BytesMut::new(),
            dictionary: DataDictionary::embedded().unwrap(),
        }
    }

    async fn send(&mut self, msg: impl Into<Msg>) {
        let mut out = BytesMut::new();
        encode_frame(&msg.into(), &mut out).unwrap();
        self.stream.write_all(&out).await.unwrap();
    }

    async fn recv(&mut self) -> Msg {
        timeout(Duration::from_secs(5), async {
            loop {
                if let Some(frame) = split_frame(&mut self.buffer).unwrap() {
                    return decode_msg(&frame, Some(&self.dictionary)).unwrap();
                }
                let n = self.stream.read_buf(&mut self.buffer).await.unwrap();
                assert!(n > 0, "server closed the connection");
            }
        })
        .await
        .expect("timed out waiting for a message")
    }

    async fn login(&mut self, user: &str) {
        self.send(RequestMsg {
            stream_id: 1,
            domain_type: domain::LOGIN,
            key: MsgKey::named(user),
            streaming: true,
            ..Default::default()
        })
        .await;
        let reply = self.recv().await;
        assert!(matches!(reply, Msg::Refresh(_)), "{:?}", reply);
    }

    async fn request(&mut self, stream_id: i32, name: &str, streaming: bool) -> Msg {
        self.send(RequestMsg {
            stream_id,
            domain_type: domain::MARKET_PRICE,
            key: MsgKey::named(name).with_service_id(1),
            streaming,
            ..Default::default()
        })
        .await;
        self.recv().await
    }
}

async fn start_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = Config {
        bind_addr: "127.0.0.1".to_string(),
        port: addr.port(),
        ..Config::default()
    };
    tokio::spawn(async move {
        let _ = server::serve(listener, config).await;
    });
    addr
}

fn post_bid(name: &str, bid: Real, post_id: u32) -> PostMsg {
    PostMsg {
        stream_id: 1,
        domain_type: domain::MARKET_PRICE,
        post_user_info: PostUserInfo {
            address: 0x7F00_0001,
            user_id: 7,
        },
        key: Some(MsgKey::named(name).with_service_id(1)),
        post_id: Some(post_id),
        complete: true,
        ack: true,
        payload: Data::Msg(Box::new(
            UpdateMsg {
                domain_type: domain::MARKET_PRICE,
                payload: FieldList::new().add(BID, bid).into(),
                ..Default::default()
            }
            .into(),
        )),
        ..Default::default()
    }
}

#[tokio::test]
async fn post_reaches_other_subscribers() {
    let addr = start_server().await;

    let mut watcher = TestClient::connect(addr).await;
    watcher.login("watcher").await;
    match watcher.request(5, "TRI.N", true).await {
        Msg::Refresh(r) => {
            assert_eq!(r.state.stream_state, StreamState::Open);
            let image = r.payload.as_field_list().unwrap();
            assert_eq!(image.get(3), Some(&Data::Rmtes("TRI.N".into())));
        }
        other => panic!("expected refresh, got {:?}", other),
    }

    let mut poster = TestClient::connect(addr).await;
    poster.login("poster").await;
    let bid = Real::new(39_925, real_hint::EXPONENT_2);
    poster.send(post_bid("TRI.N", bid, 11)).await;

    match poster.recv().await {
        Msg::Ack(ack) => {
            assert_eq!(ack.ack_id, 11);
            assert_eq!(ack.nak_code, None);
        }
        other => panic!("expected ack, got {:?}", other),
    }

    match watcher.recv().await {
        Msg::Update(update) => {
            assert_eq!(update.stream_id, 5);
            let fields = update.payload.as_field_list().unwrap();
            assert_eq!(fields.get(BID), Some(&Data::Real(bid)));
        }
        other => panic!("expected update, got {:?}", other),
    }

    // A snapshot afterwards carries the posted value.
    match poster.request(2, "TRI.N", false).await {
        Msg::Refresh(r) => {
            assert_eq!(r.state.stream_state, StreamState::NonStreaming);
            assert_eq!(r.payload.as_field_list().unwrap().get(BID), Some(&Data::Real(bid)));
        }
        other => panic!("expected refresh, got {:?}", other),
    }
}

#[tokio::test]
async fn unknown_items_and_dictionary_download() {
    let addr = start_server().await;
    let mut client = TestClient::connect(addr).await;
    client.login("user").await;

    match client.request(3, "NOT.THERE", true).await {
        Msg::Status(s) => {
            assert_eq!(s.state.unwrap().stream_state, StreamState::ClosedRecover);
        }
        other => panic!("expected status, got {:?}", other),
    }

    client
        .send(RequestMsg {
            stream_id: 4,
            domain_type: domain::DICTIONARY,
            key: MsgKey::named("RWFFld").with_service_id(1).with_filter(7),
            ..Default::default()
        })
        .await;
    let reply = client.recv().await;
    let series = match reply.payload() {
        Data::Series(series) => series.clone(),
        other => panic!("expected series, got {:?}", other),
    };
    let mut downloaded = DataDictionary::new();
    decode_field_dictionary(&series, &mut downloaded).unwrap();
    assert_eq!(
        downloaded.entry(BID).map(|e| e.acronym.as_str()),
        Some("BID")
    );
    assert_eq!(
        downloaded.number_of_entries(),
        client.dictionary.number_of_entries()
    );
}

#[tokio::test]
async fn undecodable_frame_drops_the_client() {
    let addr = start_server().await;
    let mut client = TestClient::connect(addr).await;

    client
        .stream
        .write_all(&[0, 0, 0, 3, 0xFF, 0xFF, 0xFF])
        .await
        .unwrap();

    let mut buf = [0u8; 16];
    let n = timeout(Duration::from_secs(5), client.stream.read(&mut buf))
        .await
        .expect("server kept the connection open")
        .unwrap_or(0);
    assert_eq!(n, 0);
}
