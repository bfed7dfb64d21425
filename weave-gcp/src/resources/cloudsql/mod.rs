//! Cloud SQL resources and shared helpers

pub mod database;
pub mod database_instance;
pub mod user;

pub use database::{Database, DatabaseConfig, DatabaseOutputs};
pub use database_instance::{DatabaseInstance, DatabaseInstanceConfig, DatabaseInstanceOutputs};
pub use user::{SqlUser, SqlUserConfig, SqlUserOutputs};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;

/// Connection scheme and port for a database version family.
pub(crate) fn connection_info(database_version: &str) -> (&'static str, u16) {
    match database_version.split('_').next().unwrap_or_default() {
        "MYSQL" => ("mysql", 3306),
        "SQLSERVER" => ("sqlserver", 1433),
        _ => ("postgresql", 5432),
    }
}

/// Extract (public, private) IPs from an instance body.
pub(crate) fn extract_ips(instance: &Value) -> (Option<String>, Option<String>) {
    let mut public_ip = None;
    let mut private_ip = None;

    if let Some(addresses) = instance.get("ipAddresses").and_then(Value::as_array) {
        for address in addresses {
            let ip = address
                .get("ipAddress")
                .and_then(Value::as_str)
                .map(str::to_string);

            match address.get("type").and_then(Value::as_str) {
                Some("PRIMARY") => public_ip = ip,
                Some("PRIVATE") => private_ip = ip,
                _ => {}
            }
        }
    }

    (public_ip, private_ip)
}

/// Generate a random alphanumeric password.
pub(crate) fn generate_password(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connection_info_by_family() {
        assert_eq!(connection_info("POSTGRES_15"), ("postgresql", 5432));
        assert_eq!(connection_info("MYSQL_8_0"), ("mysql", 3306));
        assert_eq!(connection_info("SQLSERVER_2019_STANDARD"), ("sqlserver", 1433));
    }

    #[test]
    fn extract_ips_picks_primary_and_private() {
        let instance = json!({
            "ipAddresses": [
                {"type": "PRIMARY", "ipAddress": "34.1.2.3"},
                {"type": "PRIVATE", "ipAddress": "10.0.0.5"},
                {"type": "OUTGOING", "ipAddress": "34.9.9.9"}
            ]
        });

        let (public_ip, private_ip) = extract_ips(&instance);
        assert_eq!(public_ip.as_deref(), Some("34.1.2.3"));
        assert_eq!(private_ip.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn generated_passwords_are_alphanumeric() {
        let password = generate_password(24);
        assert_eq!(password.len(), 24);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
