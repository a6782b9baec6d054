#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wordquiz_client::run().await
}
