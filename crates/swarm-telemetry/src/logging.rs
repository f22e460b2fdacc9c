//! Structured logging helpers.
//!
//! Peer log lines share a fixed set of fields so log queries can join on
//! them:
//! - `component`: emitting component (supervisor, registry, authorizer)
//! - `connection`: transport connection id
//! - `resource`: encoded discovery key

/// Log a peer-related event with standard fields.
///
/// ```rust,ignore
/// log_peer_event!(info, "supervisor", "authorized peer", conn_id, resource, key = %peer.key);
/// ```
#[macro_export]
macro_rules! log_peer_event {
    ($level:ident, $component:expr, $msg:expr, $connection:expr, $resource:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            connection = %$connection,
            resource = %$resource,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macro_expands_without_subscriber() {
        let connection = "conn1";
        let resource = "ab".repeat(32);
        crate::log_peer_event!(info, "test", "peer joined", connection, resource);
        crate::log_peer_event!(debug, "test", "peer left", connection, resource, members = 0);
    }
}
