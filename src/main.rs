fn main() {
    match infracheck::cli::run() {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            infracheck::ui::eprintln_error(&err);
            std::process::exit(infracheck::exit::exit_code(&err));
        }
    }
}
