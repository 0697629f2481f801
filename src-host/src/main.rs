#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ember_lib::run().await
}
