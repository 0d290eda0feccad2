use crate::config::ConfigError;
use rand::Rng;
use std::fmt;

/// One server of the cluster, parsed from a `"weight host:port"` or
/// `"host:port"` address string. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    pub host: String,
    pub port: u16,
    /// Load-balancing weight in `0..=100`; entries without a weight prefix
    /// get the default weight 100.
    pub weight: u8,
}

impl ServerEntry {
    /// Parse a single address string.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        let (weight, addr) = match raw.split_once(char::is_whitespace) {
            Some((prefix, rest)) => {
                let weight: u8 = prefix.parse().map_err(|_| ConfigError::InvalidAddress {
                    address: raw.to_string(),
                    reason: format!("weight prefix '{prefix}' is not an integer in 0..=100"),
                })?;
                if weight > 100 {
                    return Err(ConfigError::InvalidAddress {
                        address: raw.to_string(),
                        reason: format!("weight {weight} exceeds 100"),
                    });
                }
                (weight, rest.trim())
            }
            None => (100, raw),
        };

        let (host, port) = addr.rsplit_once(':').ok_or_else(|| ConfigError::InvalidAddress {
            address: raw.to_string(),
            reason: "expected host:port".to_string(),
        })?;
        if host.is_empty() {
            return Err(ConfigError::InvalidAddress {
                address: raw.to_string(),
                reason: "empty host".to_string(),
            });
        }
        let port: u16 = port.parse().map_err(|_| ConfigError::InvalidAddress {
            address: raw.to_string(),
            reason: format!("port '{port}' is not a valid u16"),
        })?;

        Ok(Self {
            host: host.to_string(),
            port,
            weight,
        })
    }

    /// `host:port` form, used as status notification detail.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The parsed cluster definition, in insertion order.
#[derive(Debug, Clone)]
pub struct AddressTable {
    entries: Vec<ServerEntry>,
}

impl AddressTable {
    /// Parse a full server list. Fails on the first malformed entry; a
    /// malformed cluster definition is a configuration error, never retried.
    pub fn parse<S: AsRef<str>>(servers: &[S]) -> Result<Self, ConfigError> {
        if servers.is_empty() {
            return Err(ConfigError::EmptyServerList);
        }
        let entries = servers
            .iter()
            .map(|s| ServerEntry::parse(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Picks a server for each connection attempt, with probability proportional
/// to weight. Selection is memoryless: every entry is eligible on every call,
/// including the one just disconnected from.
#[derive(Debug, Clone)]
pub struct ServerSelector {
    table: AddressTable,
}

impl ServerSelector {
    pub fn new(table: AddressTable) -> Self {
        Self { table }
    }

    /// Select a server using the thread-local RNG.
    pub fn select(&self) -> &ServerEntry {
        self.select_with(&mut rand::thread_rng())
    }

    /// Select a server using the given RNG.
    ///
    /// Weight-0 entries have probability 0 while any positive weight exists;
    /// if every weight is 0 the selection falls back to uniform random.
    pub fn select_with<R: Rng>(&self, rng: &mut R) -> &ServerEntry {
        let entries = self.table.entries();
        let total: u32 = entries.iter().map(|e| e.weight as u32).sum();
        if total == 0 {
            return &entries[rng.gen_range(0..entries.len())];
        }
        let mut pick = rng.gen_range(0..total);
        for entry in entries {
            let w = entry.weight as u32;
            if pick < w {
                return entry;
            }
            pick -= w;
        }
        // Unreachable: pick < total and the cumulative walk covers total.
        &entries[entries.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn test_parse_unweighted_defaults_to_100() {
        let entry = ServerEntry::parse("p1.example.com:8800").unwrap();
        assert_eq!(entry.host, "p1.example.com");
        assert_eq!(entry.port, 8800);
        assert_eq!(entry.weight, 100);
    }

    #[test]
    fn test_parse_weight_prefix() {
        let entry = ServerEntry::parse("50 p2.example.com:80").unwrap();
        assert_eq!(entry.weight, 50);
        assert_eq!(entry.address(), "p2.example.com:80");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ServerEntry::parse("no-port").is_err());
        assert!(ServerEntry::parse(":80").is_err());
        assert!(ServerEntry::parse("host:notaport").is_err());
        assert!(ServerEntry::parse("101 host:80").is_err());
        assert!(ServerEntry::parse("-1 host:80").is_err());
    }

    #[test]
    fn test_table_fails_on_any_bad_entry() {
        let result = AddressTable::parse(&["a.example.com:80", "bogus"]);
        assert!(result.is_err());
        assert!(AddressTable::parse::<&str>(&[]).is_err());
    }

    #[test]
    fn test_selection_converges_to_weight_proportions() {
        let table =
            AddressTable::parse(&["100 a:1", "50 b:1", "0 c:1"]).unwrap();
        let selector = ServerSelector::new(table);
        let mut rng = StdRng::seed_from_u64(7);

        let mut counts: HashMap<String, u32> = HashMap::new();
        const N: u32 = 30_000;
        for _ in 0..N {
            let entry = selector.select_with(&mut rng);
            *counts.entry(entry.host.clone()).or_default() += 1;
        }

        // Expected proportions 100/150 and 50/150, within 2% absolute.
        let a = counts["a"] as f64 / N as f64;
        let b = counts["b"] as f64 / N as f64;
        assert!((a - 2.0 / 3.0).abs() < 0.02, "a fraction {a}");
        assert!((b - 1.0 / 3.0).abs() < 0.02, "b fraction {b}");
        assert!(!counts.contains_key("c"), "weight-0 entry was selected");
    }

    #[test]
    fn test_all_zero_weights_fall_back_to_uniform() {
        let table = AddressTable::parse(&["0 a:1", "0 b:1"]).unwrap();
        let selector = ServerSelector::new(table);
        let mut rng = StdRng::seed_from_u64(11);

        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..10_000 {
            *counts
                .entry(selector.select_with(&mut rng).host.clone())
                .or_default() += 1;
        }
        assert!(counts["a"] > 4_000);
        assert!(counts["b"] > 4_000);
    }

    #[test]
    fn test_no_entry_excluded_after_selection() {
        // Memoryless selection: a single-entry table returns the same entry
        // on every call, it is never excluded as "just used".
        let table = AddressTable::parse(&["only.example.com:80"]).unwrap();
        let selector = ServerSelector::new(table);
        for _ in 0..10 {
            assert_eq!(selector.select().host, "only.example.com");
        }
    }
}
