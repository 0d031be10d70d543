use std::fmt;

/// Result of checking one target (the agent itself or a product)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UpdateOutcome {
    #[default]
    UpToDate,
    Applied {
        version: String,
    },
    Failed {
        /// Label sent with the Failed status event
        reported_version: String,
        error: String,
        cancelled: bool,
    },
}

impl UpdateOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, UpdateOutcome::Failed { .. })
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::UpToDate => write!(f, "up to date"),
            UpdateOutcome::Applied { version } => write!(f, "applied {}", version),
            UpdateOutcome::Failed {
                reported_version,
                cancelled: true,
                ..
            } => write!(f, "cancelled ({})", reported_version),
            UpdateOutcome::Failed {
                reported_version,
                error,
                ..
            } => write!(f, "failed ({}): {}", reported_version, error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReport {
    pub product: String,
    pub outcome: UpdateOutcome,
}

/// Everything one orchestrator cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub agent: UpdateOutcome,
    pub products: Vec<ProductReport>,
    /// Set when the monitored product list could not be fetched
    pub listing_error: Option<String>,
}

impl CycleReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::Applied { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(UpdateOutcome::is_failed)
    }

    fn count(&self, pred: impl Fn(&UpdateOutcome) -> bool) -> usize {
        self.products.iter().filter(|p| pred(&p.outcome)).count()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent {}", self.agent)?;
        if let Some(error) = &self.listing_error {
            return write!(f, "; product list unavailable: {}", error);
        }
        write!(
            f,
            "; {} products, {} applied, {} failed",
            self.products.len(),
            self.applied(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, outcome: UpdateOutcome) -> ProductReport {
        ProductReport {
            product: name.to_string(),
            outcome,
        }
    }

    #[test]
    fn summary_counts_product_outcomes() {
        let report = CycleReport {
            agent: UpdateOutcome::UpToDate,
            products: vec![
                product("Editor", UpdateOutcome::Applied { version: "1.3.0".to_string() }),
                product("Viewer", UpdateOutcome::UpToDate),
                product(
                    "Reports",
                    UpdateOutcome::Failed {
                        reported_version: "x.x.x".to_string(),
                        error: "timeout".to_string(),
                        cancelled: false,
                    },
                ),
            ],
            listing_error: None,
        };

        assert_eq!(
            report.to_string(),
            "agent up to date; 3 products, 1 applied, 1 failed"
        );
    }

    #[test]
    fn summary_mentions_listing_error() {
        let report = CycleReport {
            listing_error: Some("connection refused".to_string()),
            ..Default::default()
        };

        assert_eq!(
            report.to_string(),
            "agent up to date; product list unavailable: connection refused"
        );
    }

    #[test]
    fn cancelled_outcome_displays_as_cancelled() {
        let outcome = UpdateOutcome::Failed {
            reported_version: "1.3.0".to_string(),
            error: "Cycle cancelled".to_string(),
            cancelled: true,
        };

        assert_eq!(outcome.to_string(), "cancelled (1.3.0)");
    }
}
