use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    teller::run().await
}
