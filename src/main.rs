fn main() {
    if let Err(err) = deptree_layout::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
