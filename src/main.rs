fn main() {
    if let Err(err) = samvad::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
