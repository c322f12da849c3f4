use serde::{Deserialize, Serialize};

/// Reduced price for a second child from the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SiblingDiscount {
    Percent { percent: u8 },
    #[serde(rename_all = "camelCase")]
    FlatPrice { price_cents: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PricingRecord", into = "PricingRecord")]
pub struct Pricing {
    pub price_cents: Option<u32>,
    pub sibling_discount: Option<SiblingDiscount>,
}

impl Pricing {
    /// What a sibling pays, if a discount applies and the base price is known.
    pub fn sibling_price_cents(&self) -> Option<u32> {
        match self.sibling_discount? {
            SiblingDiscount::FlatPrice { price_cents } => Some(price_cents),
            SiblingDiscount::Percent { percent } => {
                let base = self.price_cents? as u64;
                let percent = percent.min(100) as u64;
                Some((base * (100 - percent) / 100) as u32)
            }
        }
    }
}

/// Stored shape of [`Pricing`]. `siblingPrice` is only read, as a flat price,
/// when no `siblingDiscount` is present.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price_cents: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sibling_discount: Option<SiblingDiscount>,
    #[serde(default, skip_serializing)]
    sibling_price: Option<u32>,
}

impl From<PricingRecord> for Pricing {
    fn from(record: PricingRecord) -> Self {
        let sibling_discount = record.sibling_discount.or(record
            .sibling_price
            .map(|price_cents| SiblingDiscount::FlatPrice { price_cents }));

        Pricing {
            price_cents: record.price_cents,
            sibling_discount,
        }
    }
}

impl From<Pricing> for PricingRecord {
    fn from(pricing: Pricing) -> Self {
        PricingRecord {
            price_cents: pricing.price_cents,
            sibling_discount: pricing.sibling_discount,
            sibling_price: None,
        }
    }
}
