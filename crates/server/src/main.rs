use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    devisio_server::run().await
}
