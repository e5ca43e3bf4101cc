pub mod mock;

#[cfg(test)]
mod syncer;

/// Enables logs of the relayer in tests, `RUST_LOG` controls the level.
pub fn init_logger() {
    let _ = pretty_env_logger::formatted_builder()
        .is_test(true)
        .parse_default_env()
        .try_init();
}
