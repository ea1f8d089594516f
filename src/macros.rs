/// Builds a `serde_json::Map` from `key => value` pairs; values go through
/// `serde_json::json!`, so anything `Serialize` works.
#[macro_export]
macro_rules! json_map {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut mp = serde_json::Map::new();
        $(mp.insert($key.into(), serde_json::json!($value));)*
        mp
    }};
}
