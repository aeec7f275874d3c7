//! Token ledger vocabulary and the purchasable token packages.

use serde::Serialize;

use crate::error::CoreError;

crate::define_text_enum! {
    /// Kind of ledger entry in `token_transactions`.
    TokenTransactionType {
        Purchase = "purchase",
        Usage = "usage",
        Refund = "refund",
        AdminAdjustment = "admin_adjustment",
        Bonus = "bonus",
    }
}

/// Tokens debited when a generation completes.
pub const VIDEO_GENERATION_TOKEN_COST: i64 = 1;

/// A purchasable bundle of tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenPackage {
    pub id: &'static str,
    pub name: &'static str,
    /// Price in US cents.
    pub price_cents: i64,
    pub tokens: i64,
    pub popular: bool,
}

pub const TOKEN_PACKAGES: &[TokenPackage] = &[
    TokenPackage {
        id: "basic",
        name: "Basic",
        price_cents: 1_000,
        tokens: 160,
        popular: false,
    },
    TokenPackage {
        id: "standard",
        name: "Standard",
        price_cents: 2_500,
        tokens: 425,
        popular: true,
    },
    TokenPackage {
        id: "premium",
        name: "Premium",
        price_cents: 5_000,
        tokens: 900,
        popular: false,
    },
];

/// Look up a package by id.
pub fn find_package(package_id: &str) -> Result<&'static TokenPackage, CoreError> {
    TOKEN_PACKAGES
        .iter()
        .find(|p| p.id == package_id)
        .ok_or_else(|| CoreError::Validation(format!("Invalid package ID: {package_id}")))
}

/// Credits and debits must move a strictly positive number of tokens.
pub fn validate_amount(amount: i64) -> Result<(), CoreError> {
    if amount <= 0 {
        return Err(CoreError::Validation("Token amount must be positive".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn packages_match_price_list() {
        let basic = find_package("basic").unwrap();
        assert_eq!((basic.price_cents, basic.tokens), (1_000, 160));
        let standard = find_package("standard").unwrap();
        assert_eq!((standard.price_cents, standard.tokens), (2_500, 425));
        assert!(standard.popular);
        let premium = find_package("premium").unwrap();
        assert_eq!((premium.price_cents, premium.tokens), (5_000, 900));
    }

    #[test]
    fn unknown_package_is_rejected() {
        assert_matches!(
            find_package("platinum"),
            Err(CoreError::Validation(msg)) if msg == "Invalid package ID: platinum"
        );
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(validate_amount(1).is_ok());
        assert_matches!(validate_amount(0), Err(CoreError::Validation(_)));
        assert_matches!(validate_amount(-5), Err(CoreError::Validation(_)));
    }

    #[test]
    fn transaction_type_strings() {
        assert_eq!(TokenTransactionType::AdminAdjustment.as_str(), "admin_adjustment");
        assert_eq!(
            "usage".parse::<TokenTransactionType>().unwrap(),
            TokenTransactionType::Usage
        );
    }
}
