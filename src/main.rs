fn main() {
    if let Err(err) = email_normalize::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
