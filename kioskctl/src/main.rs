use clap::Parser;

fn main() {
    let cli = kioskctl::Cli::parse();
    if let Err(err) = kioskctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
