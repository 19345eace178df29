use clap::Parser;

fn main() {
    let cli = eracrawlctl::Cli::parse();
    if let Err(err) = eracrawlctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
