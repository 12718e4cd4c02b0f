//! Service-layer configuration.

/// Tunables for the archive services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Capacity of the audit queue. Entries beyond it are dropped.
    pub audit_queue_capacity: usize,
    /// How many freshly drawn references a correspondence create tries
    /// before surfacing the conflict.
    pub max_reference_attempts: u32,
    /// Reference prefix for correspondence records (e.g., `COUR`).
    pub correspondence_domain: String,
    /// Blob-store folder uploaded document payloads go under.
    pub document_folder: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            audit_queue_capacity: 1024,
            max_reference_attempts: 3,
            correspondence_domain: "COUR".into(),
            document_folder: "documents".into(),
        }
    }
}
