#[tokio::main]
async fn main() -> lint_staged::Result<()> {
    color_eyre::install()?;
    lint_staged::cli::run().await
}
