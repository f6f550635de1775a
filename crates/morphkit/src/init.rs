//! Logging initialization.

/// Installs the `env_logger` backend, honouring `RUST_LOG`.
///
/// Safe to call more than once; only the first call installs a logger. Library
/// crates never install one themselves, so applications that bring their own
/// `log` backend can skip this entirely.
///
/// # Example
///
/// ```
/// morphkit::init();
/// ```
pub fn init() {
    let _ = env_logger::try_init();
    log::info!("morphkit {} initialized", env!("CARGO_PKG_VERSION"));
}
