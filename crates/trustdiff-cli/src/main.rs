//! trustdiff - compare root program catalogs against a reference root store.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    trustdiff_cli::run().await
}
