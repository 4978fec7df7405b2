use std::time::Instant;

/// Metadata key carrying the routing parameters of a call.
pub const REQUEST_PARAMS_HEADER: &str = "x-goog-request-params";

/// Per-attempt call settings handed to a stub.
///
/// A fresh context is built for every attempt; policies contribute to it
/// through their `setup` hooks.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    metadata: Vec<(String, String)>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Tightens the deadline; a later deadline never replaces an earlier one.
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.push((key.into(), value.into()));
    }

    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Routing metadata for calls scoped to a table.
pub(crate) fn routing_params(table_name: &str, app_profile_id: &str) -> String {
    if app_profile_id.is_empty() {
        format!("table_name={}", table_name)
    } else {
        format!("table_name={}&app_profile_id={}", table_name, app_profile_id)
    }
}
