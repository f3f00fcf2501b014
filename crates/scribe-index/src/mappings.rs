//! Index mapping schema applied at bootstrap.

/// Mapping body written verbatim when the index is created.
///
/// The producer bookkeeping maps inside `block_header_state` are unbounded
/// key sets and must not be dynamically mapped.
pub const INDEX_MAPPINGS: &str = r#"
{
    "mappings": {
        "block_states": {
            "properties": {
                "block_header_state": {
                    "properties": {
                        "producer_to_last_produced": {
                            "enabled": false
                        },
                        "producer_to_last_implied_irb": {
                            "enabled": false
                        }
                    }
                }
            }
        }
    }
}
"#;
