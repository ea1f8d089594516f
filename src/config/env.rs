pub fn addr() -> String {
    std::env::var("addr").unwrap_or_else(|_| "0.0.0.0:8000".to_string())
}

pub fn database_url() -> String {
    get_key("DATABASE_URL")
}

pub fn redis_url() -> String {
    get_key("REDIS_URL")
}

pub fn sql_dir() -> String {
    get_key("SQL_DIR")
}

/// `DEBUG=1` or `DEBUG=true` exposes internal error details in responses.
pub fn debug_mode() -> bool {
    matches!(
        std::env::var("DEBUG").map(|s| s.to_ascii_lowercase()).as_deref(),
        Ok("1") | Ok("true")
    )
}

pub fn get_key(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("NO SUCH KEY {} in env", key))
}
