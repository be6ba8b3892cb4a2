use once_cell::sync::Lazy;
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::config::Config;

static CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified())
        }
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified()),
    }
}

/// "City, Region, Country" from whichever field names the provider uses.
pub fn location_label(body: &Value) -> Option<String> {
    let pick = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| body.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let parts: Vec<&str> = [
        pick(&["city"]),
        pick(&["regionName", "region", "region_name"]),
        pick(&["country", "country_name", "countryName"]),
    ]
    .into_iter()
    .flatten()
    .collect();

    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Best-effort; any failure is logged and yields `None`.
pub async fn lookup(config: &Config, ip: &str) -> Option<String> {
    let template = config.geo_lookup_url.as_deref()?;
    // forwarded headers sometimes carry the port
    let addr: IpAddr = ip
        .parse()
        .ok()
        .or_else(|| ip.parse::<SocketAddr>().ok().map(|s| s.ip()))?;
    if !is_public(&addr) {
        return None;
    }

    let url = template.replace("{ip}", &addr.to_string());
    let response = CLIENT
        .get(&url)
        .timeout(Duration::from_millis(config.geo_lookup_timeout_ms))
        .send()
        .await
        .and_then(|r| r.error_for_status());

    let body: Value = match response {
        Ok(r) => match r.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Geo lookup returned unreadable body");
                return None;
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Geo lookup failed");
            return None;
        }
    };

    location_label(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn label_from_either_provider_shape() {
        let ip_api = json!({"city": "Leeds", "regionName": "England", "country": "United Kingdom"});
        assert_eq!(
            location_label(&ip_api).as_deref(),
            Some("Leeds, England, United Kingdom")
        );

        let ipapi_co = json!({"city": "", "region": "Wales", "country_name": "United Kingdom"});
        assert_eq!(location_label(&ipapi_co).as_deref(), Some("Wales, United Kingdom"));

        assert_eq!(location_label(&json!({"status": "fail"})), None);
    }

    #[actix_web::test]
    async fn private_addresses_are_not_looked_up() {
        let mut config = Config::for_tests();
        config.geo_lookup_url = Some("http://127.0.0.1:9/{ip}".to_string());
        assert_eq!(lookup(&config, "192.168.1.20").await, None);
        assert_eq!(lookup(&config, "not an ip").await, None);
    }
}
