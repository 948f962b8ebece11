use uuid::Uuid;

/// Builds the routing strings clients open when a notification is tapped.
#[derive(Debug, Clone)]
pub struct DeepLinks {
    scheme: String,
}

impl DeepLinks {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
        }
    }

    /// Opens the comment thread on a record, scrolled to `comment_id`.
    pub fn comment(&self, record_id: Uuid, comment_id: Uuid) -> String {
        format!(
            "{}://comment?recordId={}&commentId={}",
            self.scheme, record_id, comment_id
        )
    }

    /// Opens the record with the milestone banner for `threshold`.
    pub fn boost(&self, record_id: Uuid, threshold: u64) -> String {
        format!("{}://boost?recordId={}&count={}", self.scheme, record_id, threshold)
    }

    pub fn mission(&self) -> String {
        format!("{}://mission", self.scheme)
    }
}

impl Default for DeepLinks {
    fn default() -> Self {
        Self::new("walwal")
    }
}
