#[tokio::main]
async fn main() -> anyhow::Result<()> {
    radar_server::run().await
}
