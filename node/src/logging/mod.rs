//! Logging is done through the `log` facade, the binary installs `pretty_env_logger`.
//!
//! `RUST_LOG` selects the directives, for example `RUST_LOG=pichain=debug` shows rounds, commits
//! and role changes. Setting `PICHAIN_LOG_JSON` makes [`pretty_json`] render values as indented
//! JSON instead of their `Debug` form.
use lazy_static::lazy_static;
use serde::Serialize;

lazy_static! {
    pub static ref PICHAIN_LOG_JSON: bool = std::env::var("PICHAIN_LOG_JSON").is_ok();
}

pub fn init() {
    if let Ok(directives) = ::std::env::var("RUST_LOG") {
        println!("Logging enabled with directives: {directives}",);
        init_with_directives(&directives);
    } else {
        println!("Logging disabled");
    }
}

pub fn init_with_directives(directives: &str) {
    let result = pretty_env_logger::formatted_timed_builder()
        .parse_filters(directives)
        .format_timestamp_millis()
        .try_init();
    if let Err(err) = result {
        eprintln!("Logger already initialized: {err}");
    }
}

pub fn pretty_json<T: Serialize + std::fmt::Debug>(value: &T) -> String {
    if *PICHAIN_LOG_JSON {
        let json = serde_json::json!(&value);
        match serde_json::to_string_pretty(&json) {
            Ok(s) => s,
            _ => json.to_string(),
        }
    } else {
        format!("{value:?}",)
    }
}
