//! intake.rs — Candidate identity fields and session start payload.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Candidate basics collected by the intake form. All four fields are
/// required before a session may start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl Candidate {
    /// Reject blank fields and obviously malformed emails with a message
    /// suitable for the form.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (value, label) in [
            (&self.first_name, "First name"),
            (&self.last_name, "Last name"),
            (&self.email, "Email"),
            (&self.phone, "Phone"),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{label} is required");
            }
        }
        if !self.email.contains('@') {
            anyhow::bail!("Email address looks invalid");
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// Variable payload handed to the assistant session. Key spelling is
    /// what the interview prompt template expects.
    pub fn variable_values(&self) -> Value {
        json!({
            "firstName": self.first_name.trim(),
            "lastName": self.last_name.trim(),
            "email": self.email.trim(),
            "phoneNumber": self.phone.trim(),
        })
    }

    /// Short anonymized id for logs. Candidate PII is never logged raw.
    pub fn anon_id(&self) -> String {
        anon_hash(&self.email)
    }
}

/// First 6 bytes of a SHA-256 digest as hex: enough to correlate log
/// lines without exposing the input.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
