#[tokio::main]
async fn main() -> anyhow::Result<()> {
    awardgrid_server::run().await
}
