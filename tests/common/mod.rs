#[cfg(test)]
mod fixture;
pub use fixture::Fixture;

#[cfg(test)]
mod dataset;
pub use dataset::*;

/// Parse command line arguments the way `triogen-rs` does.
#[macro_export]
macro_rules! cli {
    ($($arg:expr),* $(,)?) => {
        <parser::Cli as clap::Parser>::try_parse_from(["triogen-rs", $($arg),*])
            .expect("Failed to parse command line arguments")
    };
}
