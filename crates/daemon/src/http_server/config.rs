use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    // Listen address
    pub listen_addr: SocketAddr,
    // log level for http tracing
    pub log_level: tracing::Level,
    // request body limit
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn new(
        listen_addr: SocketAddr,
        log_level: tracing::Level,
        max_upload_bytes: usize,
    ) -> Self {
        tracing::debug!(
            "Creating HTTP server Config: listen_addr={}, max_upload_bytes={}",
            listen_addr,
            max_upload_bytes
        );
        Self {
            listen_addr,
            log_level,
            max_upload_bytes,
        }
    }
}
