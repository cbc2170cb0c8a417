//! Guarantee card submission payload

use serde::{Deserialize, Serialize};

/// Card details registered as a guarantee. Field rules are enforced by the form.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuaranteeCard {
    pub holder_name: String,
    pub card_number: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
    pub security_code: String,
}

impl GuaranteeCard {
    /// Last four digits, for logs
    pub fn masked_number(&self) -> String {
        let digits: Vec<char> = self.card_number.chars().filter(|c| c.is_ascii_digit()).collect();
        let tail: String = digits.iter().skip(digits.len().saturating_sub(4)).collect();
        format!("****{}", tail)
    }
}

// Keep card data out of Debug output and therefore out of logs
impl std::fmt::Debug for GuaranteeCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuaranteeCard")
            .field("holder_name", &self.holder_name)
            .field("card_number", &self.masked_number())
            .finish_non_exhaustive()
    }
}
