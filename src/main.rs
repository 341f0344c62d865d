#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sinapsis_desk::run().await
}
