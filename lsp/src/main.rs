#[tokio::main]
async fn main() {
    qls_lsp::server::run().await;
}
