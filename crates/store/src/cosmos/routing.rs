//! Region endpoint selection from account metadata.

use serde::Deserialize;
use tracing::warn;
use url::Url;

/// Subset of the database account resource returned by `GET /`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProperties {
    #[serde(default)]
    pub writable_locations: Vec<AccountLocation>,
    #[serde(default)]
    pub readable_locations: Vec<AccountLocation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLocation {
    pub name: String,
    pub database_account_endpoint: String,
}

/// Endpoint chosen for one direction of traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub endpoint: Url,
    /// Region name, `None` when falling back to the account endpoint.
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    pub read: Route,
    pub write: Route,
}

/// Pick read and write endpoints.
///
/// The first preferred region present in the relevant location list wins;
/// otherwise the first listed location; otherwise the account endpoint.
pub fn resolve_routes(account: &AccountProperties, preferred: &[String], fallback: &Url) -> Routes {
    Routes {
        read: pick(&account.readable_locations, preferred, fallback),
        write: pick(&account.writable_locations, preferred, fallback),
    }
}

fn pick(locations: &[AccountLocation], preferred: &[String], fallback: &Url) -> Route {
    let usable: Vec<(&AccountLocation, Url)> = locations
        .iter()
        .filter_map(|loc| match Url::parse(&loc.database_account_endpoint) {
            Ok(url) => Some((loc, url)),
            Err(e) => {
                warn!(region = %loc.name, error = %e, "Skipping location with bad endpoint");
                None
            }
        })
        .collect();

    let chosen = preferred
        .iter()
        .find_map(|want| {
            usable
                .iter()
                .find(|(loc, _)| same_region(&loc.name, want))
        })
        .or_else(|| usable.first());

    match chosen {
        Some((loc, url)) => Route {
            endpoint: url.clone(),
            region: Some(loc.name.clone()),
        },
        None => Route {
            endpoint: fallback.clone(),
            region: None,
        },
    }
}

/// "West US", "westus" and "west us" name the same region.
fn same_region(a: &str, b: &str) -> bool {
    let norm = |s: &str| {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect::<String>()
    };
    norm(a) == norm(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(name: &str, endpoint: &str) -> AccountLocation {
        AccountLocation {
            name: name.to_string(),
            database_account_endpoint: endpoint.to_string(),
        }
    }

    fn account() -> AccountProperties {
        AccountProperties {
            writable_locations: vec![loc("West US", "https://acct-westus.documents.azure.com:443/")],
            readable_locations: vec![
                loc("West US", "https://acct-westus.documents.azure.com:443/"),
                loc("North Europe", "https://acct-northeurope.documents.azure.com:443/"),
            ],
        }
    }

    fn fallback() -> Url {
        Url::parse("https://acct.documents.azure.com:443/").unwrap()
    }

    #[test]
    fn preferred_region_used_for_reads() {
        let routes = resolve_routes(&account(), &["northeurope".to_string()], &fallback());
        assert_eq!(routes.read.region.as_deref(), Some("North Europe"));
        assert_eq!(routes.write.region.as_deref(), Some("West US"));
    }

    #[test]
    fn preference_order_respected() {
        let preferred = vec!["East US".to_string(), "West US".to_string(), "North Europe".to_string()];
        let routes = resolve_routes(&account(), &preferred, &fallback());
        assert_eq!(routes.read.region.as_deref(), Some("West US"));
    }

    #[test]
    fn first_location_when_no_preference_matches() {
        let routes = resolve_routes(&account(), &["Mars Central".to_string()], &fallback());
        assert_eq!(routes.read.region.as_deref(), Some("West US"));
    }

    #[test]
    fn fallback_when_account_lists_nothing() {
        let routes = resolve_routes(&AccountProperties::default(), &[], &fallback());
        assert_eq!(routes.read.endpoint, fallback());
        assert!(routes.read.region.is_none());
        assert_eq!(routes.write.endpoint, fallback());
    }

    #[test]
    fn bad_location_endpoint_skipped() {
        let account = AccountProperties {
            writable_locations: vec![],
            readable_locations: vec![
                loc("West US", "not a url"),
                loc("North Europe", "https://acct-northeurope.documents.azure.com:443/"),
            ],
        };
        let routes = resolve_routes(&account, &["West US".to_string()], &fallback());
        assert_eq!(routes.read.region.as_deref(), Some("North Europe"));
    }

    #[test]
    fn parses_account_json() {
        let json = r#"{
            "id": "acct",
            "writableLocations": [{"name": "West US", "databaseAccountEndpoint": "https://acct-westus.documents.azure.com:443/"}],
            "readableLocations": [{"name": "West US", "databaseAccountEndpoint": "https://acct-westus.documents.azure.com:443/"}]
        }"#;
        let parsed: AccountProperties = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.readable_locations.len(), 1);
        assert_eq!(parsed.writable_locations[0].name, "West US");
    }
}
