fn main() {
    if let Err(err) = silsilah_layout::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
