//! In-process stand-ins for the ring server and the inference task servers.

use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Serves the ring line protocol, handing out the same stereo buffer on
/// every `dump`.
pub async fn spawn_ring_server(sample_rate: u32, left: Vec<f32>, right: Vec<f32>) -> SocketAddr {
    assert_eq!(left.len(), right.len());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(handle_ring_client(
                stream,
                sample_rate,
                left.clone(),
                right.clone(),
            ));
        }
    });
    addr
}

async fn handle_ring_client(stream: TcpStream, sample_rate: u32, left: Vec<f32>, right: Vec<f32>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let nframes = left.len();
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let reply = match line.trim() {
            "nframes" => format!("{nframes}\n"),
            "len" => "1\n".to_string(),
            "rate" => format!("{sample_rate}\n"),
            "seconds" => "2\n".to_string(),
            "dump" => {
                let mut payload = Vec::with_capacity(nframes * 8);
                for (l, r) in left.iter().zip(&right) {
                    payload.extend_from_slice(&l.to_le_bytes());
                    payload.extend_from_slice(&r.to_le_bytes());
                }
                if write_half.write_all(&payload).await.is_err() {
                    break;
                }
                continue;
            }
            _ => break,
        };
        if write_half.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
}

/// Task server replying with a fixed score string; every received payload is
/// forwarded through the returned channel.
pub async fn spawn_task_server(
    reply: &'static str,
) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut header = [0u8; 128];
                let Ok(n) = stream.read(&mut header).await else {
                    return;
                };
                let header = String::from_utf8_lossy(&header[..n]).into_owned();
                let mut parts = header.trim().split(',');
                let _sample_rate: u64 = parts.next().unwrap().parse().unwrap();
                let byte_len: usize = parts.next().unwrap().parse().unwrap();
                let _elem_size: usize = parts.next().unwrap().parse().unwrap();

                stream.write_all(b"ACK").await.unwrap();
                let mut payload = vec![0u8; byte_len];
                stream.read_exact(&mut payload).await.unwrap();
                let _ = tx.send(payload);
                stream.write_all(reply.as_bytes()).await.unwrap();
                // dropping the stream closes it, signalling EOF to the client
            });
        }
    });
    (addr, rx)
}
