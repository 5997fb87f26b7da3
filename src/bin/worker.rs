#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examiner_rust::run_worker().await {
        eprintln!("examiner-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
