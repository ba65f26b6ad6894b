use oxsh::Repl;

fn main() {
    // Logging stays quiet unless RUST_LOG raises it, so diagnostics never
    // interleave with the prompt.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    if let Err(err) = Repl::new().run() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
