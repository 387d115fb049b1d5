//! Transfer-syntax allow-list for incoming C-STORE/C-GET traffic: an
//! empty list means "accept anything" (no filter configured), matching
//! the default in `DicomConfig::accepted_transfer_syntaxes`.

pub struct TransferSyntaxFilter {
    accepted: Vec<String>,
}

impl TransferSyntaxFilter {
    pub fn new(accepted: Vec<String>) -> Self {
        Self { accepted }
    }

    pub fn allows(&self, transfer_syntax_uid: &str) -> bool {
        self.accepted.is_empty() || self.accepted.iter().any(|uid| uid == transfer_syntax_uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_accepts_everything() {
        let filter = TransferSyntaxFilter::new(Vec::new());
        assert!(filter.allows("1.2.840.10008.1.2.1"));
    }

    #[test]
    fn nonempty_list_rejects_unlisted_syntax() {
        let filter = TransferSyntaxFilter::new(vec!["1.2.840.10008.1.2.1".to_string()]);
        assert!(filter.allows("1.2.840.10008.1.2.1"));
        assert!(!filter.allows("1.2.840.10008.1.2.4.70"));
    }
}
