use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    reasonscan_cli::main_entry().await
}
