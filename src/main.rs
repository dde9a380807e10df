#![allow(missing_docs)]

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fragrance_stock_lib::run().await
}
