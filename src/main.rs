fn main() {
    if let Err(err) = run_eav::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
