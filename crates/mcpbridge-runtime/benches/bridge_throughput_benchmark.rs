use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mcpbridge_core::framing;
use mcpbridge_runtime::{BridgeServer, RequestProcessor};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;

struct Echo;

#[async_trait::async_trait]
impl RequestProcessor for Echo {
    async fn process(&self, _endpoint: SocketAddr, request: &str) -> Option<String> {
        Some(request.to_string())
    }
}

async fn read_one_frame(stream: &mut TcpStream) -> String {
    use mcpbridge_core::framing::{self as wire, HeaderParseResult};
    let mut buf = Vec::new();
    let mut scratch = [0u8; 4096];
    loop {
        let n = stream.read(&mut scratch).await.unwrap();
        buf.extend_from_slice(&scratch[..n]);
        if let Ok(HeaderParseResult::Complete {
            content_len,
            header_len,
        }) = wire::try_parse_header(&buf, buf.len())
        {
            if wire::is_complete(buf.len(), content_len, header_len) {
                return wire::extract_body(&buf, content_len, header_len).unwrap();
            }
        }
    }
}

fn round_trip_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("bridge_round_trip");

    for size in [16usize, 256, 4096].iter() {
        let payload = "x".repeat(*size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.to_async(&rt).iter(|| async {
                let server = Arc::new(BridgeServer::new(Arc::new(Echo), None, None));
                server.start(0).await.unwrap();
                let port = server.bound_port().unwrap();

                let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
                let request = format!(r#"{{"jsonrpc":"2.0","id":1,"payload":"{payload}"}}"#);
                stream.write_all(&framing::encode(&request)).await.unwrap();
                let response = read_one_frame(&mut stream).await;
                black_box(response);

                server.stop().await;
            });
        });
    }

    group.finish();
}

fn pipelined_requests_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("bridge_pipelined");

    for count in [10usize, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.to_async(&rt).iter(|| async move {
                let server = Arc::new(BridgeServer::new(Arc::new(Echo), None, None));
                server.start(0).await.unwrap();
                let port = server.bound_port().unwrap();

                let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
                let mut bytes = Vec::new();
                for i in 0..count {
                    bytes.extend(framing::encode(&format!(
                        r#"{{"jsonrpc":"2.0","id":{i}}}"#
                    )));
                }
                stream.write_all(&bytes).await.unwrap();

                for _ in 0..count {
                    black_box(read_one_frame(&mut stream).await);
                }

                server.stop().await;
            });
        });
    }

    group.finish();
}

criterion_group!(benches, round_trip_benchmark, pipelined_requests_benchmark);
criterion_main!(benches);
