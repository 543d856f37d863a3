#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ingest_server::run().await
}
