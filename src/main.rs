//! Flow Manager command-line entry point

#[tokio::main]
async fn main() {
    if let Err(e) = flow_manager_lib::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
