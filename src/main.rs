fn main() {
    if let Err(err) = callbox::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
