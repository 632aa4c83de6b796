//! Opens a channel against a dataset already published as `.mref`, reads
//! its first megabyte, and prints how many bytes came back. Exercises the
//! public surface end to end; not a dataset CLI.

use std::sync::Arc;

use anyhow::Context;
use mafc_client::{DatasetHandle, FetchPolicy, ReqwestRangeClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let remote_url = args.next().context("usage: basic_usage <url> <mref_path> <cache_path>")?;
    let mref_path = args.next().context("missing mref_path")?;
    let cache_path = args.next().context("missing cache_path")?;

    let client = Arc::new(ReqwestRangeClient::new(reqwest::Client::new()));
    let handle = DatasetHandle::new(remote_url, cache_path, mref_path).with_policy(FetchPolicy::default());

    let channel = handle.open(client).await.context("opening channel")?;
    let mut buf = vec![0u8; 1 << 20];
    let n = channel.read(0, &mut buf).await.context("reading first megabyte")?;
    println!("read {n} bytes of {} total", channel.size());

    channel.close().await.context("closing channel")?;
    Ok(())
}
