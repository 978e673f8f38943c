#[tokio::main]
async fn main() {
    std::process::exit(outflow::app::startup::startup().await);
}
