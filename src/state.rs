#[derive(Clone, Debug)]
pub struct Config {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id_prefix: String,
    pub command_topic: String,
    pub page_topic: String,
    pub datatable_topic: String,
    pub infotable_topic: String,
    pub worldmap_topic: String,
    pub pool_size: usize,
    pub data_dir: String,
    pub page_path: String,
    pub sqlite_path: String,
    /// Address views bind and announce. Unset means autodetect the
    /// routable interface address.
    pub host_ip: Option<String>,
    pub ready_timeout_secs: u64,
    pub ready_poll_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            broker_host: std::env::var("MQTT_HOST").unwrap_or_else(|_| "localhost".to_string()),
            broker_port: std::env::var("MQTT_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(1883),
            client_id_prefix: std::env::var("MQTT_CLIENT_ID").unwrap_or_else(|_| "planktovis".to_string()),
            command_topic: std::env::var("COMMAND_TOPIC").unwrap_or_else(|_| "visualization/commands".to_string()),
            page_topic: std::env::var("PAGE_TOPIC").unwrap_or_else(|_| "visualization/chartPage".to_string()),
            datatable_topic: std::env::var("DATATABLE_TOPIC").unwrap_or_else(|_| "visualization/datatable".to_string()),
            infotable_topic: std::env::var("INFOTABLE_TOPIC").unwrap_or_else(|_| "visualization/infotable".to_string()),
            worldmap_topic: std::env::var("WORLDMAP_TOPIC").unwrap_or_else(|_| "visualization/worldmap".to_string()),
            pool_size: std::env::var("POOL_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(20),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            page_path: std::env::var("PAGE_PATH")
                .unwrap_or_else(|_| "./visualization_page/charts_page.html".to_string()),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or_else(|_| "./planktovis.sqlite".to_string()),
            host_ip: std::env::var("HOST_IP").ok(),
            ready_timeout_secs: std::env::var("READY_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(15),
            ready_poll_ms: std::env::var("READY_POLL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let cfg = Config::from_env();
        assert_eq!(cfg.broker_port, 1883);
        assert_eq!(cfg.command_topic, "visualization/commands");
        assert_eq!(cfg.pool_size, 20);
        assert!(cfg.ready_timeout_secs > 0);
    }
}
