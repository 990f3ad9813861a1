use super::RequestsLoggingLevel;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_url: String,
    pub issuer: String,
    pub requests_logging_level: RequestsLoggingLevel,
}
