//! Industry classification and job-loss probabilities
//!
//! Maps fine-grained census industry codes to the 13 coarse supersector
//! groups used by the BLS Current Employment Statistics series, and turns
//! the per-group percent change in employment into a job-loss probability.
//!
//! Codes outside every range (agriculture, public administration, military)
//! are unclassified and excluded from all downstream survey universes.

use std::collections::HashMap;
use std::fmt;

/// Coarse industry group matching the employment statistics dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndustryGroup {
    MiningLogging,
    Construction,
    Manufacturing,
    WholesaleTrade,
    RetailTrade,
    TransportWarehousing,
    Utilities,
    Information,
    FinancialActivities,
    ProfessionalBusiness,
    EducationHealth,
    LeisureHospitality,
    OtherServices,
}

impl IndustryGroup {
    pub const ALL: [IndustryGroup; 13] = [
        IndustryGroup::MiningLogging,
        IndustryGroup::Construction,
        IndustryGroup::Manufacturing,
        IndustryGroup::WholesaleTrade,
        IndustryGroup::RetailTrade,
        IndustryGroup::TransportWarehousing,
        IndustryGroup::Utilities,
        IndustryGroup::Information,
        IndustryGroup::FinancialActivities,
        IndustryGroup::ProfessionalBusiness,
        IndustryGroup::EducationHealth,
        IndustryGroup::LeisureHospitality,
        IndustryGroup::OtherServices,
    ];

    /// CES supersector series code for this group
    pub fn ces_code(&self) -> u32 {
        match self {
            IndustryGroup::MiningLogging => 10_000_000,
            IndustryGroup::Construction => 20_000_000,
            IndustryGroup::Manufacturing => 30_000_000,
            IndustryGroup::WholesaleTrade => 41_420_000,
            IndustryGroup::RetailTrade => 42_000_000,
            IndustryGroup::TransportWarehousing => 43_000_000,
            IndustryGroup::Utilities => 44_220_000,
            IndustryGroup::Information => 50_000_000,
            IndustryGroup::FinancialActivities => 55_000_000,
            IndustryGroup::ProfessionalBusiness => 60_000_000,
            IndustryGroup::EducationHealth => 65_000_000,
            IndustryGroup::LeisureHospitality => 70_000_000,
            IndustryGroup::OtherServices => 80_000_000,
        }
    }

    /// Reverse lookup from a CES supersector code
    pub fn from_ces_code(code: u32) -> Option<IndustryGroup> {
        IndustryGroup::ALL.iter().copied().find(|g| g.ces_code() == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndustryGroup::MiningLogging => "Mining and logging",
            IndustryGroup::Construction => "Construction",
            IndustryGroup::Manufacturing => "Manufacturing",
            IndustryGroup::WholesaleTrade => "Wholesale trade",
            IndustryGroup::RetailTrade => "Retail trade",
            IndustryGroup::TransportWarehousing => "Transportation and warehousing",
            IndustryGroup::Utilities => "Utilities",
            IndustryGroup::Information => "Information",
            IndustryGroup::FinancialActivities => "Financial activities",
            IndustryGroup::ProfessionalBusiness => "Professional and business services",
            IndustryGroup::EducationHealth => "Education and health services",
            IndustryGroup::LeisureHospitality => "Leisure and hospitality",
            IndustryGroup::OtherServices => "Other services",
        }
    }
}

impl fmt::Display for IndustryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Inclusive census-code ranges per group, first match wins.
/// Gaps: 170-290 agriculture, 9370-9590 public administration,
/// 9670-9870 military.
const CLASSIFICATION_RANGES: [(u16, u16, IndustryGroup); 13] = [
    (370, 490, IndustryGroup::MiningLogging),
    (570, 690, IndustryGroup::Utilities),
    (770, 770, IndustryGroup::Construction),
    (1070, 3990, IndustryGroup::Manufacturing),
    (4070, 4590, IndustryGroup::WholesaleTrade),
    (4670, 5790, IndustryGroup::RetailTrade),
    (6070, 6390, IndustryGroup::TransportWarehousing),
    (6470, 6780, IndustryGroup::Information),
    (6870, 7190, IndustryGroup::FinancialActivities),
    (7270, 7790, IndustryGroup::ProfessionalBusiness),
    (7860, 8470, IndustryGroup::EducationHealth),
    (8560, 8690, IndustryGroup::LeisureHospitality),
    (8770, 9290, IndustryGroup::OtherServices),
];

/// Classify a fine-grained census industry code into its coarse group.
///
/// Returns `None` for codes outside every range; such records are excluded
/// from the analysis universe rather than treated as an error.
pub fn classify(industry_code: u16) -> Option<IndustryGroup> {
    CLASSIFICATION_RANGES
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&industry_code))
        .map(|(_, _, group)| *group)
}

/// Per-group job-loss probabilities derived from employment changes
#[derive(Debug, Clone, Default)]
pub struct LossRates {
    rates: HashMap<IndustryGroup, f64>,
}

impl LossRates {
    pub fn new() -> Self {
        LossRates {
            rates: HashMap::new(),
        }
    }

    /// Record a percent change in employment for a group. Declines become
    /// job-loss probabilities; gains clamp to zero.
    pub fn insert_pct_change(&mut self, group: IndustryGroup, pct_change: f64) {
        let probability = (-pct_change / 100.0).clamp(0.0, 1.0);
        self.rates.insert(group, probability);
    }

    pub fn from_pct_changes<I>(changes: I) -> Self
    where
        I: IntoIterator<Item = (IndustryGroup, f64)>,
    {
        let mut rates = LossRates::new();
        for (group, pct_change) in changes {
            rates.insert_pct_change(group, pct_change);
        }
        rates
    }

    /// Job-loss probability for a group; zero when the group is absent
    pub fn probability(&self, group: IndustryGroup) -> f64 {
        self.rates.get(&group).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_range_classifies_to_expected_group() {
        for (lo, hi, group) in CLASSIFICATION_RANGES {
            for code in [lo, (lo + hi) / 2, hi] {
                assert_eq!(classify(code), Some(group), "code {}", code);
            }
        }
    }

    #[test]
    fn test_gap_codes_unclassified() {
        // Agriculture, public administration, military
        for code in [0, 170, 290, 9370, 9590, 9670, 9870, 9920, u16::MAX] {
            assert_eq!(classify(code), None, "code {}", code);
        }
    }

    #[test]
    fn test_between_range_codes_unclassified() {
        // Codes in the seams between adjacent ranges
        for code in [500, 700, 800, 4000, 4600, 6400, 6800, 7200, 7800, 8500, 8700] {
            assert_eq!(classify(code), None, "code {}", code);
        }
    }

    #[test]
    fn test_manufacturing_ces_code() {
        assert_eq!(classify(2070), Some(IndustryGroup::Manufacturing));
        assert_eq!(IndustryGroup::Manufacturing.ces_code(), 30_000_000);
    }

    #[test]
    fn test_ces_code_round_trip() {
        for group in IndustryGroup::ALL {
            assert_eq!(IndustryGroup::from_ces_code(group.ces_code()), Some(group));
        }
        assert_eq!(IndustryGroup::from_ces_code(99), None);
    }

    #[test]
    fn test_thirteen_groups() {
        assert_eq!(IndustryGroup::ALL.len(), 13);
        assert_eq!(CLASSIFICATION_RANGES.len(), 13);
    }

    #[test]
    fn test_loss_rates_from_declines() {
        let mut rates = LossRates::new();
        rates.insert_pct_change(IndustryGroup::Manufacturing, -10.0);
        rates.insert_pct_change(IndustryGroup::LeisureHospitality, -48.2);

        assert!((rates.probability(IndustryGroup::Manufacturing) - 0.10).abs() < 1e-12);
        assert!((rates.probability(IndustryGroup::LeisureHospitality) - 0.482).abs() < 1e-12);
    }

    #[test]
    fn test_loss_rates_gains_clamp_to_zero() {
        let mut rates = LossRates::new();
        rates.insert_pct_change(IndustryGroup::Utilities, 2.5);
        assert_eq!(rates.probability(IndustryGroup::Utilities), 0.0);
    }

    #[test]
    fn test_loss_rates_missing_group_is_zero() {
        let rates = LossRates::new();
        assert_eq!(rates.probability(IndustryGroup::Information), 0.0);
    }

    #[test]
    fn test_loss_rates_full_decline_clamps_to_one() {
        let mut rates = LossRates::new();
        rates.insert_pct_change(IndustryGroup::OtherServices, -150.0);
        assert_eq!(rates.probability(IndustryGroup::OtherServices), 1.0);
    }
}
