#[tokio::main]
async fn main() -> anyhow::Result<()> {
    brightclass_rust::run().await
}
