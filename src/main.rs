#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examiner_rust::run().await {
        eprintln!("examiner-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
