//! Integration tests for the WebSocket transport.
//!
//! Each test binds to port 0, asks the listener for the assigned address
//! and connects a real tokio-tungstenite client to it.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use keyrace_transport::{
        Connection, FrameReader, FrameWriter, Incoming, Transport, TransportError,
        WebSocketConnection, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connected_pair() -> (WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let server = tokio::spawn(async move {
            let incoming = transport.accept().await.expect("should accept");
            incoming.upgrade().await.expect("should upgrade")
        });

        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("accept task should complete");
        (conn, client)
    }

    #[tokio::test]
    async fn test_websocket_send_and_receive_binary() {
        let (conn, mut client) = connected_pair().await;
        assert!(conn.id().into_inner() > 0);
        let (mut reader, mut writer) = conn.split();

        writer.send(&[0x03]).await.expect("send should succeed");
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[0x03]);

        client
            .send(Message::Binary(vec![0x01, 0, 0, 0, 2].into()))
            .await
            .unwrap();
        let frame = reader.recv().await.expect("recv should succeed");
        assert_eq!(frame, Some(vec![0x01, 0, 0, 0, 2]));
    }

    #[tokio::test]
    async fn test_websocket_normal_close_is_clean() {
        let (conn, mut client) = connected_pair().await;
        let (mut reader, _writer) = conn.split();

        client
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "done".into(),
            }))
            .await
            .unwrap();

        let frame = reader.recv().await.expect("normal close is not an error");
        assert_eq!(frame, None);
    }

    #[tokio::test]
    async fn test_websocket_error_close_is_abnormal() {
        let (conn, mut client) = connected_pair().await;
        let (mut reader, _writer) = conn.split();

        client
            .close(Some(CloseFrame {
                code: CloseCode::Error,
                reason: "boom".into(),
            }))
            .await
            .unwrap();

        let err = reader.recv().await.unwrap_err();
        assert!(matches!(err, TransportError::AbnormalClose(1011)));
        assert!(!err.is_graceful());
    }

    #[tokio::test]
    async fn test_websocket_writer_close_reaches_client() {
        let (conn, mut client) = connected_pair().await;
        let (_reader, mut writer) = conn.split();

        writer.close().await.expect("close should succeed");

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_close());
    }

    #[tokio::test]
    async fn test_websocket_client_drop_is_not_fatal() {
        let (conn, client) = connected_pair().await;
        let (mut reader, _writer) = conn.split();
        drop(client);

        match reader.recv().await {
            Ok(None) => {}
            Err(e) => assert!(e.is_graceful(), "unexpected error: {e}"),
            Ok(Some(frame)) => panic!("unexpected frame {frame:?}"),
        }
    }

    #[tokio::test]
    async fn test_accept_does_not_wait_for_upgrade() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        // A peer that opens TCP and never sends the upgrade request.
        let _silent = tokio::net::TcpStream::connect(addr)
            .await
            .expect("tcp connect");
        let stalled = tokio::time::timeout(Duration::from_secs(1), transport.accept())
            .await
            .expect("accept should return before the upgrade")
            .expect("should accept");

        let client = tokio::spawn(async move {
            tokio_tungstenite::connect_async(format!("ws://{addr}"))
                .await
                .expect("client should connect")
        });
        let incoming = tokio::time::timeout(Duration::from_secs(1), transport.accept())
            .await
            .expect("second accept should not be blocked")
            .expect("should accept");
        let conn = incoming.upgrade().await.expect("should upgrade");
        assert!(conn.id().into_inner() > 0);
        client.await.expect("client task");

        let upgrade = tokio::time::timeout(Duration::from_millis(100), stalled.upgrade()).await;
        assert!(upgrade.is_err(), "silent peer never completes the upgrade");
    }
}
