use glob::{MatchOptions, Pattern};
use tracing::{debug, info};

use crate::error::{CollectError, Result};
use crate::inventory::{EntityKind, InventoryClient, InventoryScope, ObjectReference};

/// Inclusion filter over object names (`*`, `?`, `[...]`).
#[derive(Debug, Clone)]
pub struct NamePattern {
    pattern: Pattern,
}

impl NamePattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let pattern = Pattern::new(raw)
            .map_err(|e| CollectError::Config(format!("bad name pattern '{}': {}", raw, e)))?;
        Ok(NamePattern { pattern })
    }

    pub fn match_all() -> Self {
        NamePattern {
            pattern: Pattern::new("*").expect("'*' is a valid glob"),
        }
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn is_match_all(&self) -> bool {
        self.as_str() == "*"
    }

    // Inventory names may contain '/', which glob would otherwise treat as a separator.
    pub fn matches(&self, name: &str) -> bool {
        self.pattern.matches_with(
            name,
            MatchOptions {
                case_sensitive: true,
                require_literal_separator: false,
                require_literal_leading_dot: false,
            },
        )
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        NamePattern::match_all()
    }
}

/// List every object of `kind` in the scope whose name matches `pattern`.
///
/// An empty inventory is an empty list, not an error.
pub fn enumerate<C: InventoryClient + ?Sized>(
    client: &C,
    scope: &InventoryScope,
    kind: EntityKind,
    pattern: &NamePattern,
) -> Result<Vec<ObjectReference>> {
    debug!(datacenter = %scope.name, %kind, pattern = pattern.as_str(), "enumerating objects");

    let refs = client.list_objects(scope, kind, pattern)?;

    info!(datacenter = %scope.name, %kind, count = refs.len(), "enumerated objects");
    Ok(refs)
}
