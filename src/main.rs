#[tokio::main]
async fn main() -> anyhow::Result<()> {
    k5viewer_lib::run().await
}
