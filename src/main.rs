#[tokio::main]
async fn main() {
    if let Err(err) = lumi_reader_lib::run().await {
        match serde_json::to_string(&err) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("{err}"),
        }
        std::process::exit(1);
    }
}
