use adasa_watch::cli::{print_error, Cli};

#[tokio::main]
async fn main() {
    if let Err(e) = Cli::run().await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
