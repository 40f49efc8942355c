//! Keeps a framed TCP connection alive across server restarts.
//!
//! Run with: cargo run --example tcp_reconnect -p persistent-connection
//!
//! A local echo server hangs up on every client after three messages. The
//! persistent connection notices each hang-up and reconnects; the loop below
//! simply asks for the current connection before every send.

use persistent_connection::{
    ConnectionConfig, ConnectionEvent, PersistentConnection, RetryDelay, StaticAddress,
    TcpOptions,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

async fn echo_server(listener: TcpListener) {
    loop {
        let Ok((mut stream, peer)) = listener.accept().await else {
            return;
        };
        tokio::spawn(async move {
            println!("  [server] accepted {peer}");
            for _ in 0..3 {
                let Ok(len) = stream.read_u32().await else { return };
                let mut buf = vec![0; len as usize];
                if stream.read_exact(&mut buf).await.is_err() {
                    return;
                }
                if len > 0 {
                    let _ = stream.write_u32(len).await;
                    let _ = stream.write_all(&buf).await;
                }
            }
            println!("  [server] hanging up on {peer}");
        });
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Persistent TCP connection example\n");

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(echo_server(listener));

    let config = ConnectionConfig::<SocketAddr>::builder("echo")
        .retry_delay(RetryDelay::new(Duration::from_millis(200)))
        .on_event(|event| match event {
            ConnectionEvent::ObtainedAddress { address, .. } => {
                println!("event: obtained address {address}")
            }
            ConnectionEvent::FailedToConnect { cause, .. } => {
                println!("event: failed to connect ({cause})")
            }
            ConnectionEvent::AttemptingToConnect { .. } => println!("event: attempting to connect"),
            ConnectionEvent::Connected { .. } => println!("event: connected"),
            ConnectionEvent::Disconnected { .. } => println!("event: disconnected"),
        })
        .build();

    let conn = PersistentConnection::tcp(
        config,
        StaticAddress::new(address),
        TcpOptions::default().handshake_timeout(Duration::from_secs(2)),
    );

    for i in 0..7 {
        let live = conn.connected().await;
        let message = format!("message {i}");
        if live.send(message.as_bytes()).await.is_err() {
            println!("send failed, will retry on the next connection");
            continue;
        }
        match live.recv().await {
            Some(reply) => println!("echo: {}", String::from_utf8_lossy(&reply)),
            None => println!("connection dropped before the reply"),
        }
    }

    conn.close().await;
    println!("\nstate after close: {}", conn.state());
    Ok(())
}
